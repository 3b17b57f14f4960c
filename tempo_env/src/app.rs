//! Application contract consumed by the environment.
//!
//! Concrete applications (mail, calendar, key-value store, ...) live outside
//! the engine. The engine only needs:
//! - a static table of operations with declared signatures, used to reject
//!   malformed actions before they reach the application
//! - a generic state capability (`get_state` / `load_state` / `reset`) so the
//!   environment can snapshot and restore without knowing concrete schemas
//!
//! # Operation tables
//!
//! Each application builds its [`OperationTable`] once, at construction:
//!
//! ```ignore
//! let ops = OperationTable::new()
//!     .with(Signature::write("set").param("key", ArgType::String), KvStore::op_set)
//!     .with(Signature::read("get").param("key", ArgType::String), KvStore::op_get);
//! ```

use crate::error::{AppError, ArgumentError};
use crate::types::{Args, OperationName};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Declared type of an operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Accepts any JSON value
    Any,
}

impl ArgType {
    /// Returns true if `value` is acceptable for this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Number => value.is_number(),
            ArgType::Boolean => value.is_boolean(),
            ArgType::Array => value.is_array(),
            ArgType::Object => value.is_object(),
            ArgType::Any => true,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgType::String => "string",
            ArgType::Integer => "integer",
            ArgType::Number => "number",
            ArgType::Boolean => "boolean",
            ArgType::Array => "array",
            ArgType::Object => "object",
            ArgType::Any => "any",
        };
        f.write_str(name)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether an operation only reads or also mutates application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
}

/// A declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: ArgType,
    pub required: bool,
}

/// Declared signature of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: OperationName,
    pub kind: OperationKind,
    pub params: Vec<Param>,
}

impl Signature {
    /// Starts a signature for a read-only operation.
    pub fn read(name: &str) -> Self {
        Self {
            name: OperationName::new(name),
            kind: OperationKind::Read,
            params: Vec::new(),
        }
    }

    /// Starts a signature for a state-mutating operation.
    pub fn write(name: &str) -> Self {
        Self {
            name: OperationName::new(name),
            kind: OperationKind::Write,
            params: Vec::new(),
        }
    }

    /// Adds a required parameter.
    pub fn param(mut self, name: &str, ty: ArgType) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty,
            required: true,
        });
        self
    }

    /// Adds an optional parameter. `null` is accepted for optional parameters.
    pub fn optional(mut self, name: &str, ty: ArgType) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty,
            required: false,
        });
        self
    }

    /// Checks `args` against the declared parameters.
    ///
    /// Rejects unknown keys, missing required keys and values whose JSON type
    /// does not match the declaration.
    pub fn check(&self, args: &Args) -> Result<(), ArgumentError> {
        for key in args.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(ArgumentError::Unexpected(key.clone()));
            }
        }

        for param in &self.params {
            match args.get(&param.name) {
                None if param.required => {
                    return Err(ArgumentError::Missing(param.name.clone()));
                }
                None => {}
                Some(Value::Null) if !param.required => {}
                Some(value) if !param.ty.accepts(value) => {
                    return Err(ArgumentError::TypeMismatch {
                        param: param.name.clone(),
                        expected: param.ty,
                        found: json_kind(value).to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Handler bound to an operation.
pub type Handler<A> = fn(&mut A, &Args) -> Result<Value, AppError>;

/// A registered operation: signature plus handler.
pub struct Operation<A> {
    pub signature: Signature,
    pub handler: Handler<A>,
}

/// Statically declared operation table of an application.
pub struct OperationTable<A> {
    operations: Vec<Operation<A>>,
}

impl<A> OperationTable<A> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Registers an operation. A later registration with the same name replaces the earlier one.
    pub fn with(mut self, signature: Signature, handler: Handler<A>) -> Self {
        self.operations.retain(|op| op.signature.name != signature.name);
        self.operations.push(Operation { signature, handler });
        self
    }

    /// Looks up a signature by operation name.
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.operations
            .iter()
            .find(|op| op.signature.name.as_str() == name)
            .map(|op| &op.signature)
    }

    /// Looks up a handler by operation name.
    pub fn handler(&self, name: &str) -> Option<Handler<A>> {
        self.operations
            .iter()
            .find(|op| op.signature.name.as_str() == name)
            .map(|op| op.handler)
    }

    /// All signatures, in registration order.
    pub fn signatures(&self) -> Vec<&Signature> {
        self.operations.iter().map(|op| &op.signature).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<A> Default for OperationTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stateful application living inside the environment.
///
/// # Contract
///
/// - `call` is only invoked after the environment has checked the arguments
///   against `signature(operation)`
/// - `get_state` must return a value that `load_state` accepts
/// - `reset` returns the application to its empty state
pub trait App: Any + Send {
    /// Registered name of the application (e.g. `"CalendarApp"`).
    fn name(&self) -> &str;

    /// Declared signature of `operation`, if the application exposes it.
    fn signature(&self, operation: &str) -> Option<&Signature>;

    /// All declared signatures.
    fn signatures(&self) -> Vec<&Signature>;

    /// Executes `operation`.
    fn call(&mut self, operation: &str, args: &Args) -> Result<Value, AppError>;

    /// Serializable image of the application state.
    fn get_state(&self) -> Result<Value, AppError>;

    /// Replaces the application state with `state`.
    fn load_state(&mut self, state: &Value) -> Result<(), AppError>;

    /// Clears the application state.
    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed accessors over [`Args`] for operation handlers.
pub trait ArgsExt {
    /// Required string argument.
    fn str_arg(&self, key: &str) -> Result<&str, AppError>;

    /// Optional string argument (`null` counts as absent).
    fn opt_str_arg(&self, key: &str) -> Option<&str>;

    /// Optional list of strings; non-string items are rejected.
    fn str_list_arg(&self, key: &str) -> Result<Vec<String>, AppError>;
}

impl ArgsExt for Args {
    fn str_arg(&self, key: &str) -> Result<&str, AppError> {
        self.get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::invalid(format!("'{}' must be a string", key)))
    }

    fn opt_str_arg(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn str_list_arg(&self, key: &str) -> Result<Vec<String>, AppError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| AppError::invalid(format!("'{}' must contain only strings", key)))
                })
                .collect(),
            Some(_) => Err(AppError::invalid(format!("'{}' must be a list", key))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn signature() -> Signature {
        Signature::write("add")
            .param("title", ArgType::String)
            .param("count", ArgType::Integer)
            .optional("tags", ArgType::Array)
    }

    #[test]
    fn test_signature_accepts_valid_args() {
        let args = args! { "title" => "x", "count" => 3 };
        assert!(signature().check(&args).is_ok());

        let with_null = args! { "title" => "x", "count" => 3, "tags" => Value::Null };
        assert!(signature().check(&with_null).is_ok());
    }

    #[test]
    fn test_signature_rejects_missing_and_unexpected() {
        let missing = args! { "title" => "x" };
        assert_eq!(
            signature().check(&missing),
            Err(ArgumentError::Missing("count".to_string()))
        );

        let unexpected = args! { "title" => "x", "count" => 1, "color" => "red" };
        assert_eq!(
            signature().check(&unexpected),
            Err(ArgumentError::Unexpected("color".to_string()))
        );
    }

    #[test]
    fn test_signature_rejects_type_mismatch() {
        let args = args! { "title" => "x", "count" => "three" };
        match signature().check(&args) {
            Err(ArgumentError::TypeMismatch { param, expected, found }) => {
                assert_eq!(param, "count");
                assert_eq!(expected, ArgType::Integer);
                assert_eq!(found, "string");
            }
            other => panic!("expected type mismatch, got {:?}", other),
        }
    }

    struct Counter {
        value: i64,
    }

    fn op_incr(counter: &mut Counter, _args: &Args) -> Result<Value, AppError> {
        counter.value += 1;
        Ok(Value::from(counter.value))
    }

    #[test]
    fn test_operation_table_lookup() {
        let table = OperationTable::<Counter>::new().with(Signature::write("incr"), op_incr);
        assert_eq!(table.len(), 1);
        assert!(table.signature("decr").is_none());

        let mut counter = Counter { value: 0 };
        let handler = table.handler("incr").unwrap();
        assert_eq!(handler(&mut counter, &Args::new()).unwrap(), Value::from(1));
    }

    #[test]
    fn test_args_ext_string_list() {
        let args = args! { "people" => ["a", "b"], "bad" => [1] };
        assert_eq!(args.str_list_arg("people").unwrap(), vec!["a", "b"]);
        assert!(args.str_list_arg("bad").is_err());
        assert!(args.str_list_arg("absent").unwrap().is_empty());
    }
}
