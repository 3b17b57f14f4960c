//! Environment / Action Dispatcher.
//!
//! Owns the applications, the clock and the event log. It has no business
//! logic of its own: it resolves actions to applications, checks arguments
//! against declared signatures, executes, and records every outcome.

use crate::error::{panic_message, ActionError};
use crate::event::{Action, EventId, EventType};
use crate::log::{EventLog, LogEntry, LogReader, Outcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tempo_env::{App, EnvError, SimClock, SimTime};
use tracing::{debug, warn};

/// Serializable image of every application's state plus the clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateImage {
    pub time: SimTime,
    pub apps: BTreeMap<String, Value>,
}

impl StateImage {
    /// State of one application.
    pub fn app(&self, name: &str) -> Option<&Value> {
        self.apps.get(name)
    }
}

/// Who is dispatching, for the log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchMeta {
    pub event_id: Option<EventId>,
    pub event_type: EventType,
    pub oracle: bool,
}

impl DispatchMeta {
    /// Metadata of a graph event.
    pub fn event(event_id: EventId, event_type: EventType, oracle: bool) -> Self {
        Self {
            event_id: Some(event_id),
            event_type,
            oracle,
        }
    }

    /// Metadata of an action injected by an external agent.
    pub fn agent() -> Self {
        Self {
            event_id: None,
            event_type: EventType::Agent,
            oracle: false,
        }
    }
}

/// The shared world the scheduler drives.
pub struct Environment {
    /// Applications in registration order
    apps: Vec<Box<dyn App>>,

    clock: Arc<dyn SimClock>,

    log: EventLog,
}

impl Environment {
    /// Creates an environment over `apps`. Later apps with a duplicate name shadow nothing:
    /// lookups return the first registered.
    pub fn new(apps: Vec<Box<dyn App>>, clock: Arc<dyn SimClock>) -> Self {
        Self {
            apps,
            clock,
            log: EventLog::new(),
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn SimClock> {
        &self.clock
    }

    /// Reader over the event log.
    pub fn log(&self) -> LogReader {
        self.log.reader()
    }

    /// Replaces the log with an empty one. Existing readers keep the old log.
    pub fn start_new_log(&mut self) {
        self.log = EventLog::new();
    }

    /// Names of registered applications, in registration order.
    pub fn app_names(&self) -> Vec<&str> {
        self.apps.iter().map(|app| app.name()).collect()
    }

    /// Looks up an application by name.
    pub fn get(&self, name: &str) -> Option<&dyn App> {
        self.apps.iter().find(|app| app.name() == name).map(|app| app.as_ref())
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn App>> {
        self.apps.iter_mut().find(|app| app.name() == name)
    }

    /// First application of concrete type `T`.
    pub fn get_typed<T: App>(&self) -> Option<&T> {
        self.apps.iter().find_map(|app| app.as_any().downcast_ref::<T>())
    }

    /// Executes `action` and captures any failure. Does not touch the log.
    pub fn apply(&mut self, action: &Action) -> Outcome {
        match self.try_apply(action) {
            Ok(value) => Outcome::success(value),
            Err(err) => Outcome::failure(&err),
        }
    }

    fn try_apply(&mut self, action: &Action) -> Result<Value, ActionError> {
        let app = self
            .get_mut(action.app.as_str())
            .ok_or_else(|| ActionError::UnknownApplication(action.app.to_string()))?;

        let signature = app
            .signature(action.operation.as_str())
            .ok_or_else(|| ActionError::UnknownOperation {
                app: action.app.to_string(),
                operation: action.operation.to_string(),
            })?;
        signature
            .check(&action.args)
            .map_err(|source| ActionError::InvalidArgument {
                operation: action.operation.to_string(),
                source,
            })?;

        let result = catch_unwind(AssertUnwindSafe(|| {
            app.call(action.operation.as_str(), &action.args)
        }));
        match result {
            Ok(outcome) => outcome.map_err(ActionError::from),
            Err(payload) => Err(ActionError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Executes `action` and appends the outcome to the log at the current time.
    pub fn dispatch(&mut self, meta: DispatchMeta, action: &Action) -> LogEntry {
        let outcome = self.apply(action);
        match &outcome {
            Outcome::Success { .. } => {
                debug!("{} {} dispatched {} at {}", meta.event_type, fmt_id(meta.event_id), action, self.now());
            }
            Outcome::Failure { message, .. } => {
                warn!("{} {} failed {}: {}", meta.event_type, fmt_id(meta.event_id), action, message);
            }
        }
        self.record(meta, Some(action.clone()), outcome)
    }

    /// Appends an entry at the current time without executing anything.
    pub(crate) fn record(&mut self, meta: DispatchMeta, action: Option<Action>, outcome: Outcome) -> LogEntry {
        let entry = LogEntry {
            event_id: meta.event_id,
            event_type: meta.event_type,
            timestamp: self.now(),
            action,
            outcome,
            oracle: meta.oracle,
        };
        self.log.append(entry.clone());
        entry
    }

    /// Captures the clock time and every application's state.
    pub fn snapshot(&self) -> Result<StateImage, EnvError> {
        let mut apps = BTreeMap::new();
        for app in &self.apps {
            let state = app.get_state().map_err(|source| EnvError::AppState {
                app: app.name().to_string(),
                source,
            })?;
            apps.insert(app.name().to_string(), state);
        }
        Ok(StateImage {
            time: self.now(),
            apps,
        })
    }

    /// Restores application states and the clock from `image`.
    ///
    /// Applications missing from the image are reset.
    pub fn restore(&mut self, image: &StateImage) -> Result<(), EnvError> {
        if let Some(unknown) = image.apps.keys().find(|name| self.get(name).is_none()) {
            return Err(EnvError::UnknownApplication(unknown.clone()));
        }

        for app in &mut self.apps {
            match image.apps.get(app.name()) {
                Some(state) => app.load_state(state).map_err(|source| EnvError::AppState {
                    app: app.name().to_string(),
                    source,
                })?,
                None => app.reset(),
            }
        }
        self.clock.set_time(image.time);
        Ok(())
    }

    /// Resets every application to its empty state.
    pub fn reset_apps(&mut self) {
        for app in &mut self.apps {
            app.reset();
        }
    }
}

fn fmt_id(id: Option<EventId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "(injected)".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::any::Any;
    use tempo_env::{args, AppError, ArgType, Args, ArgsExt, OperationTable, Signature, VirtualClock};

    /// Minimal key-value app shared by the core tests.
    pub(crate) struct Store {
        pub(crate) entries: BTreeMap<String, String>,
        ops: OperationTable<Store>,
    }

    impl Store {
        pub(crate) fn new() -> Self {
            let ops = OperationTable::new()
                .with(
                    Signature::write("set")
                        .param("key", ArgType::String)
                        .param("value", ArgType::String),
                    Store::op_set,
                )
                .with(Signature::read("get").param("key", ArgType::String), Store::op_get)
                .with(Signature::write("explode"), Store::op_explode);
            Self {
                entries: BTreeMap::new(),
                ops,
            }
        }

        fn op_set(&mut self, args: &Args) -> Result<Value, AppError> {
            self.entries
                .insert(args.str_arg("key")?.to_string(), args.str_arg("value")?.to_string());
            Ok(Value::Null)
        }

        fn op_get(&mut self, args: &Args) -> Result<Value, AppError> {
            let key = args.str_arg("key")?;
            self.entries
                .get(key)
                .map(|v| Value::from(v.clone()))
                .ok_or_else(|| AppError::not_found(key))
        }

        fn op_explode(&mut self, _args: &Args) -> Result<Value, AppError> {
            panic!("boom");
        }
    }

    impl App for Store {
        fn name(&self) -> &str {
            "Store"
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
            Ok(serde_json::to_value(&self.entries)?)
        }

        fn load_state(&mut self, state: &Value) -> Result<(), AppError> {
            self.entries = serde_json::from_value(state.clone())?;
            Ok(())
        }

        fn reset(&mut self) {
            self.entries.clear();
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    pub(crate) fn store_env() -> Environment {
        Environment::new(vec![Box::new(Store::new())], VirtualClock::shared(0))
    }

    #[test]
    fn test_apply_success_and_typed_lookup() {
        let mut env = store_env();
        let outcome = env.apply(&Action::new("Store", "set", args! { "key" => "a", "value" => "1" }));
        assert!(outcome.is_success());

        let store = env.get_typed::<Store>().unwrap();
        assert_eq!(store.entries.get("a").map(String::as_str), Some("1"));
        assert_eq!(env.app_names(), vec!["Store"]);
    }

    #[test]
    fn test_apply_captures_every_failure_kind() {
        let mut env = store_env();
        let cases = [
            (Action::new("Nope", "set", args! {}), FailureKind::UnknownApplication),
            (Action::new("Store", "drop", args! {}), FailureKind::UnknownOperation),
            (Action::new("Store", "get", args! { "key" => 5 }), FailureKind::InvalidArgument),
            (Action::new("Store", "get", args! { "key" => "missing" }), FailureKind::Application),
            (Action::new("Store", "explode", args! {}), FailureKind::Panic),
        ];
        for (action, kind) in cases {
            assert_eq!(env.apply(&action).failure_kind(), Some(kind), "{}", action);
        }
    }

    #[test]
    fn test_dispatch_appends_success_and_failure() {
        let mut env = store_env();
        env.clock().set_time(SimTime::from_secs(3));
        env.dispatch(
            DispatchMeta::event(EventId(0), EventType::Env, false),
            &Action::new("Store", "get", args! { "key" => "x" }),
        );
        env.dispatch(DispatchMeta::agent(), &Action::new("Store", "set", args! { "key" => "x", "value" => "y" }));

        let log = env.log().snapshot();
        assert_eq!(log.len(), 2);
        assert!(!log[0].outcome.is_success());
        assert_eq!(log[0].timestamp, SimTime::from_secs(3));
        assert_eq!(log[1].event_id, None);
        assert_eq!(log[1].event_type, EventType::Agent);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut env = store_env();
        let initial = env.snapshot().unwrap();

        env.apply(&Action::new("Store", "set", args! { "key" => "a", "value" => "1" }));
        env.clock().set_time(SimTime::from_secs(9));
        assert_ne!(env.snapshot().unwrap(), initial);

        env.restore(&initial).unwrap();
        assert_eq!(env.snapshot().unwrap(), initial);
        assert_eq!(env.now(), SimTime::ZERO);
    }

    #[test]
    fn test_restore_rejects_unknown_app() {
        let mut env = store_env();
        let mut image = env.snapshot().unwrap();
        image.apps.insert("Ghost".to_string(), Value::Null);
        assert!(matches!(env.restore(&image), Err(EnvError::UnknownApplication(_))));
    }
}
