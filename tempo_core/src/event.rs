//! The Event Model - immutable descriptions of schedulable units.
//!
//! An event carries:
//! - identity (`EventId`, optional label) and type (`EventType`)
//! - a dependency set and a timing rule (`Timing`)
//! - a bound action (`Action`), an oracle flag, and for condition events a
//!   polling predicate (`Condition`)
//!
//! Events are frozen into an `EventGraph` by the builder. Lifecycle state
//! (`EventState`) is owned by the scheduler for the duration of a run.

use crate::environment::Environment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tempo_env::{AppName, Args, OperationName, SimTime};

/// Identifier of a registered event. Equal to its registration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u32);

impl EventId {
    /// Registration index of the event.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who or what originates an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Message or request from the simulated user
    User,
    /// Change in the world independent of the agent (incoming email, ...)
    Env,
    /// Action taken by the agent (or expected of it, when oracle)
    Agent,
    /// Polling check over environment state
    Condition,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::User => "USER",
            EventType::Env => "ENV",
            EventType::Agent => "AGENT",
            EventType::Condition => "CONDITION",
        };
        f.write_str(name)
    }
}

/// Lifecycle of an event during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Waiting for dependencies
    Pending,
    /// Trigger time known, queued
    Resolved,
    Executed,
    Skipped,
    Failed,
    TimedOut,
}

impl EventState {
    /// True once the event can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventState::Executed | EventState::Skipped | EventState::Failed | EventState::TimedOut
        )
    }

    /// True if dependents may resolve off this event.
    pub fn releases_dependents(self) -> bool {
        matches!(self, EventState::Executed | EventState::Skipped)
    }
}

/// When an event triggers once its dependencies are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// Delay after the latest dependency completion (or after start for roots).
    /// Must be a whole number of milliseconds.
    After(Duration),
    /// Fixed simulated timestamp
    At(SimTime),
}

impl Default for Timing {
    fn default() -> Self {
        Timing::After(Duration::ZERO)
    }
}

/// Typed identity of an action: which application, which operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionKey {
    pub app: AppName,
    pub operation: OperationName,
}

impl ActionKey {
    pub fn new(app: impl Into<AppName>, operation: impl Into<OperationName>) -> Self {
        Self {
            app: app.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.operation)
    }
}

/// A pure action descriptor: application, operation, ordered arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "application")]
    pub app: AppName,
    pub operation: OperationName,
    #[serde(rename = "arguments")]
    pub args: Args,
}

impl Action {
    pub fn new(app: impl Into<AppName>, operation: impl Into<OperationName>, args: Args) -> Self {
        Self {
            app: app.into(),
            operation: operation.into(),
            args,
        }
    }

    /// Typed identity of this action.
    pub fn key(&self) -> ActionKey {
        ActionKey {
            app: self.app.clone(),
            operation: self.operation.clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.operation)
    }
}

/// Predicate evaluated against the environment by a condition event.
pub type Predicate = Arc<dyn Fn(&Environment) -> bool + Send + Sync>;

/// Polling rule of a condition event.
#[derive(Clone)]
pub struct Condition {
    pub predicate: Predicate,
    /// Time between two checks
    pub interval: Duration,
    /// Time after the first check at which the condition gives up
    pub timeout: Duration,
}

impl Condition {
    pub fn new<F>(predicate: F, interval: Duration, timeout: Duration) -> Self
    where
        F: Fn(&Environment) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            interval,
            timeout,
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Reference to a dependency while building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    /// An already-registered event
    Id(EventId),
    /// An event label, possibly registered later in the same build
    Label(String),
}

/// Declaration of an event, before registration.
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub label: Option<String>,
    pub event_type: EventType,
    pub dependencies: Vec<DependencyRef>,
    pub timing: Timing,
    pub action: Option<Action>,
    pub oracle: bool,
    pub condition: Option<Condition>,
}

impl EventSpec {
    /// A spec of the given type bound to `action`.
    pub fn new(event_type: EventType, action: Action) -> Self {
        Self {
            label: None,
            event_type,
            dependencies: Vec::new(),
            timing: Timing::default(),
            action: Some(action),
            oracle: false,
            condition: None,
        }
    }

    /// A condition event spec without a follow-up action.
    pub fn condition(condition: Condition) -> Self {
        Self {
            label: None,
            event_type: EventType::Condition,
            dependencies: Vec::new(),
            timing: Timing::default(),
            action: None,
            oracle: false,
            condition: Some(condition),
        }
    }

    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn after(mut self, dependency: EventId) -> Self {
        self.dependencies.push(DependencyRef::Id(dependency));
        self
    }

    pub fn after_label(mut self, label: impl Into<String>) -> Self {
        self.dependencies.push(DependencyRef::Label(label.into()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.timing = Timing::After(delay);
        self
    }

    pub fn at(mut self, time: SimTime) -> Self {
        self.timing = Timing::At(time);
        self
    }

    pub fn oracle(mut self) -> Self {
        self.oracle = true;
        self
    }
}

/// A registered, frozen event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub label: Option<String>,
    pub event_type: EventType,
    /// Sorted, deduplicated
    pub dependencies: Vec<EventId>,
    pub timing: Timing,
    pub action: Option<Action>,
    pub oracle: bool,
    pub condition: Option<Condition>,
}

impl Event {
    /// Label if present, otherwise the id. Used in errors and logs.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.id.to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_env::args;

    #[test]
    fn test_action_serializes_with_boundary_names() {
        let action = Action::new("KVStore", "set", args! { "key" => "name", "value" => "Jane" });
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"application":"KVStore","operation":"set","arguments":{"key":"name","value":"Jane"}}"#
        );
    }

    #[test]
    fn test_action_key_identity() {
        let a = Action::new("KVStore", "get", args! { "key" => "a" });
        let b = Action::new("KVStore", "get", args! { "key" => "b" });
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "KVStore.get");
    }

    #[test]
    fn test_event_state_terminality() {
        assert!(!EventState::Pending.is_terminal());
        assert!(!EventState::Resolved.is_terminal());
        assert!(EventState::Failed.is_terminal());
        assert!(EventState::Skipped.releases_dependents());
        assert!(!EventState::TimedOut.releases_dependents());
    }

    #[test]
    fn test_event_spec_builders() {
        let spec = EventSpec::new(EventType::User, Action::new("A", "op", args! {}))
            .with_label("kickoff")
            .after(EventId(0))
            .delay(Duration::from_secs(3))
            .with_type(EventType::Env);

        assert_eq!(spec.event_type, EventType::Env);
        assert_eq!(spec.timing, Timing::After(Duration::from_secs(3)));
        assert_eq!(spec.dependencies, vec![DependencyRef::Id(EventId(0))]);
        assert_eq!(spec.label.as_deref(), Some("kickoff"));
    }
}
