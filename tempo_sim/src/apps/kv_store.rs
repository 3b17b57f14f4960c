//! A simple key-value store application.

use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use tempo_env::{App, AppError, ArgType, Args, ArgsExt, OperationTable, Signature};

/// Key-value store exposed as the `KVStore` application.
pub struct KvStore {
    store: BTreeMap<String, String>,
    ops: OperationTable<KvStore>,
}

impl KvStore {
    pub const NAME: &'static str = "KVStore";

    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                Signature::write("set")
                    .param("key", ArgType::String)
                    .param("value", ArgType::String),
                KvStore::op_set,
            )
            .with(Signature::read("get").param("key", ArgType::String), KvStore::op_get)
            .with(Signature::write("delete").param("key", ArgType::String), KvStore::op_delete)
            .with(Signature::read("get_all"), KvStore::op_get_all);
        Self {
            store: BTreeMap::new(),
            ops,
        }
    }

    /// Populates a key directly, outside of any event.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.store.insert(key.into(), value.into());
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.store.get(key).map(String::as_str)
    }

    fn op_set(&mut self, args: &Args) -> Result<Value, AppError> {
        self.insert(args.str_arg("key")?, args.str_arg("value")?);
        Ok(Value::Null)
    }

    fn op_get(&mut self, args: &Args) -> Result<Value, AppError> {
        let key = args.str_arg("key")?;
        self.value(key)
            .map(Value::from)
            .ok_or_else(|| AppError::not_found(format!("Key {} not found in store", key)))
    }

    fn op_delete(&mut self, args: &Args) -> Result<Value, AppError> {
        let key = args.str_arg("key")?;
        self.store
            .remove(key)
            .map(|_| Value::Null)
            .ok_or_else(|| AppError::not_found(format!("Key {} not found in store", key)))
    }

    fn op_get_all(&mut self, _args: &Args) -> Result<Value, AppError> {
        Ok(serde_json::to_value(&self.store)?)
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl App for KvStore {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn signature(&self, operation: &str) -> Option<&Signature> {
        self.ops.signature(operation)
    }

    fn signatures(&self) -> Vec<&Signature> {
        self.ops.signatures()
    }

    fn call(&mut self, operation: &str, args: &Args) -> Result<Value, AppError> {
        let handler = self
            .ops
            .handler(operation)
            .ok_or_else(|| AppError::not_found(operation))?;
        handler(self, args)
    }

    fn get_state(&self) -> Result<Value, AppError> {
        Ok(json!({ "store": self.store }))
    }

    fn load_state(&mut self, state: &Value) -> Result<(), AppError> {
        self.store = match state.get("store") {
            Some(store) => serde_json::from_value(store.clone())?,
            None => BTreeMap::new(),
        };
        Ok(())
    }

    fn reset(&mut self) {
        self.store.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_env::args;

    #[test]
    fn test_set_get_delete() {
        let mut kv = KvStore::new();
        kv.call("set", &args! { "key" => "name", "value" => "Jane" }).unwrap();
        assert_eq!(kv.call("get", &args! { "key" => "name" }).unwrap(), "Jane");

        kv.call("delete", &args! { "key" => "name" }).unwrap();
        assert!(matches!(
            kv.call("get", &args! { "key" => "name" }),
            Err(AppError::NotFound(_))
        ));
        assert!(kv.call("delete", &args! { "key" => "name" }).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let mut kv = KvStore::new();
        kv.insert("city", "New York");
        let state = kv.get_state().unwrap();
        assert_eq!(state, json!({ "store": { "city": "New York" } }));

        let mut other = KvStore::new();
        other.load_state(&state).unwrap();
        assert_eq!(other.value("city"), Some("New York"));

        other.reset();
        assert_eq!(other.call("get_all", &args! {}).unwrap(), json!({}));
    }
}
