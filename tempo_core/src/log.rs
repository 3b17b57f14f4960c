//! The Event Log - append-only record of every dispatch.
//!
//! There is exactly one writer (`EventLog`, owned by the environment) and
//! any number of readers (`LogReader`). Readers always see a consistent
//! prefix of the log: an entry is either fully visible or not at all.

use crate::error::{ActionError, FailureKind};
use crate::event::{Action, EventId, EventType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tempo_env::{Args, SimTime};

/// Result of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { value: Value },
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn success(value: Value) -> Self {
        Outcome::Success { value }
    }

    /// Captures an action error.
    pub fn failure(error: &ActionError) -> Self {
        Outcome::Failure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Value returned by a successful dispatch.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Success { value } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Graph event that produced the entry; `None` for injected agent actions
    pub event_id: Option<EventId>,
    pub event_type: EventType,
    pub timestamp: SimTime,
    /// `None` for condition events without a follow-up action
    pub action: Option<Action>,
    pub outcome: Outcome,
    pub oracle: bool,
}

impl LogEntry {
    /// Boundary descriptor of the entry's action, if it has one.
    pub fn descriptor(&self) -> Option<ActionDescriptor> {
        self.action.as_ref().map(|action| ActionDescriptor {
            application: action.app.to_string(),
            operation: action.operation.to_string(),
            arguments: action.args.clone(),
            timestamp: self.timestamp,
            oracle: self.oracle,
        })
    }

    pub fn is_agent(&self) -> bool {
        self.event_type == EventType::Agent
    }
}

/// Action descriptor crossing the boundary to trace/replay tooling.
///
/// Field names are part of the external format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub application: String,
    pub operation: String,
    pub arguments: Args,
    pub timestamp: SimTime,
    pub oracle: bool,
}

impl ActionDescriptor {
    /// Rebuilds the pure action.
    pub fn to_action(&self) -> Action {
        Action::new(self.application.as_str(), self.operation.as_str(), self.arguments.clone())
    }
}

type Entries = Arc<RwLock<Vec<LogEntry>>>;

/// Single writer of the event log.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Entries,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its position.
    pub(crate) fn append(&self, entry: LogEntry) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push(entry);
        entries.len() - 1
    }

    /// Creates a reader sharing this log.
    pub fn reader(&self) -> LogReader {
        LogReader {
            entries: Arc::clone(&self.entries),
        }
    }

    pub fn len(&self) -> usize {
        self.reader().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the whole log.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.reader().snapshot()
    }

    /// Entries at positions `from..`.
    pub fn since(&self, from: usize) -> Vec<LogEntry> {
        self.reader().since(from)
    }
}

/// Read-only view of an event log, shareable across threads.
#[derive(Debug, Clone)]
pub struct LogReader {
    entries: Entries,
}

impl LogReader {
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn since(&self, from: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(from..).map(<[LogEntry]>::to_vec).unwrap_or_default()
    }

    /// Deterministic JSON rendering of the log (one array).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_string(&*entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_env::args;

    fn entry(ts: u64) -> LogEntry {
        LogEntry {
            event_id: Some(EventId(0)),
            event_type: EventType::Env,
            timestamp: SimTime::from_secs(ts),
            action: Some(Action::new("KVStore", "set", args! { "key" => "a", "value" => "b" })),
            outcome: Outcome::success(Value::Null),
            oracle: false,
        }
    }

    #[test]
    fn test_reader_sees_appended_prefix() {
        let log = EventLog::new();
        let reader = log.reader();
        assert!(reader.is_empty());

        log.append(entry(1));
        log.append(entry(2));

        assert_eq!(reader.len(), 2);
        assert_eq!(reader.since(1)[0].timestamp, SimTime::from_secs(2));
        assert!(reader.since(5).is_empty());
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let failure = Outcome::failure(&ActionError::UnknownApplication("Nope".to_string()));
        let json = serde_json::to_string(&failure).unwrap();
        assert_eq!(
            json,
            r#"{"status":"failure","kind":"unknown_application","message":"Unknown application: Nope"}"#
        );
    }

    #[test]
    fn test_descriptor_uses_boundary_fields() {
        let descriptor = entry(3).descriptor().unwrap();
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["application"], "KVStore");
        assert_eq!(json["operation"], "set");
        assert_eq!(json["timestamp"], 3.0);
        assert_eq!(json["oracle"], false);
        assert_eq!(descriptor.to_action().key().to_string(), "KVStore.set");
    }

    #[test]
    fn test_log_entry_round_trips() {
        let original = entry(4);
        let json = serde_json::to_string(&original).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
