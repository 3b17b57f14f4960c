//! Validation Engine - grading a finished run.
//!
//! A check is a pure function over the event log and the final application
//! states. Whatever happens inside it, `validate` returns a
//! [`ValidationResult`]: errors and panics become a failed result with the
//! error recorded.
//!
//! Usage:
//! ```ignore
//! let result = validate(&log, &states, &|ctx: &ValidationContext<'_>| {
//!     let kv: BTreeMap<String, String> = ctx.app_state_as("KVStore")?;
//!     Ok(Verdict::from(kv.get("name").map(String::as_str) == Some("Jane")))
//! });
//! ```

use crate::environment::StateImage;
use crate::error::{panic_message, ValidationError};
use crate::event::{Action, ActionKey, EventType};
use crate::graph::EventGraph;
use crate::log::LogEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tempo_env::{Args, SimTime};

// =============================================================================
// RESULTS
// =============================================================================

/// Outcome of validating a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub rationale: Option<String>,
    /// Error raised by the check, if any
    pub error: Option<String>,
}

impl ValidationResult {
    fn errored(error: String) -> Self {
        Self {
            success: false,
            rationale: None,
            error: Some(error),
        }
    }
}

/// What a check concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub rationale: Option<String>,
}

impl Verdict {
    pub fn pass(rationale: impl Into<String>) -> Self {
        Self {
            passed: true,
            rationale: Some(rationale.into()),
        }
    }

    pub fn fail(rationale: impl Into<String>) -> Self {
        Self {
            passed: false,
            rationale: Some(rationale.into()),
        }
    }

    /// Combines two verdicts; both must pass.
    pub fn and(self, other: Verdict) -> Verdict {
        let rationale = match (self.rationale, other.rationale) {
            (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
            (a, b) => a.or(b),
        };
        Verdict {
            passed: self.passed && other.passed,
            rationale,
        }
    }
}

impl From<bool> for Verdict {
    fn from(passed: bool) -> Self {
        Self {
            passed,
            rationale: None,
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Read-only view handed to checks.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    log: &'a [LogEntry],
    states: &'a StateImage,
}

impl<'a> ValidationContext<'a> {
    pub fn new(log: &'a [LogEntry], states: &'a StateImage) -> Self {
        Self { log, states }
    }

    /// The whole log, in execution order.
    pub fn entries(&self) -> &'a [LogEntry] {
        self.log
    }

    /// Entries of one event type.
    pub fn entries_of(&self, event_type: EventType) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.log.iter().filter(move |e| e.event_type == event_type)
    }

    /// Successful agent actions, oracle or injected.
    pub fn agent_actions(&self) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.log
            .iter()
            .filter(|e| e.is_agent() && e.outcome.is_success() && e.action.is_some())
    }

    /// Successful agent actions with the given identity.
    pub fn agent_actions_for(&self, key: &ActionKey) -> Vec<&'a LogEntry> {
        self.agent_actions()
            .filter(|e| e.action.as_ref().map(|a| a.key()).as_ref() == Some(key))
            .collect()
    }

    /// Most recent entry, if any.
    pub fn last(&self) -> Option<&'a LogEntry> {
        self.log.last()
    }

    /// Time of the final state image.
    pub fn final_time(&self) -> SimTime {
        self.states.time
    }

    /// Final state of an application.
    pub fn app_state(&self, app: &str) -> Result<&'a Value, ValidationError> {
        self.states
            .app(app)
            .ok_or_else(|| ValidationError::MissingState(app.to_string()))
    }

    /// Final state of an application, deserialized.
    pub fn app_state_as<T: DeserializeOwned>(&self, app: &str) -> Result<T, ValidationError> {
        Ok(serde_json::from_value(self.app_state(app)?.clone())?)
    }
}

// =============================================================================
// CHECKS
// =============================================================================

/// A validation function over a finished run.
pub trait Check {
    fn check(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError>;
}

impl<F> Check for F
where
    F: Fn(&ValidationContext<'_>) -> Result<Verdict, ValidationError>,
{
    fn check(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        self(ctx)
    }
}

/// Runs `check` over a finished run. Never fails and never panics.
pub fn validate(log: &[LogEntry], states: &StateImage, check: &dyn Check) -> ValidationResult {
    let ctx = ValidationContext::new(log, states);
    match catch_unwind(AssertUnwindSafe(|| check.check(&ctx))) {
        Ok(Ok(verdict)) => ValidationResult {
            success: verdict.passed,
            rationale: verdict.rationale,
            error: None,
        },
        Ok(Err(err)) => ValidationResult::errored(err.to_string()),
        Err(payload) => ValidationResult::errored(format!("check panicked: {}", panic_message(payload.as_ref()))),
    }
}

/// Actions the graph expects the agent to perform.
pub fn oracle_actions(graph: &EventGraph) -> Vec<Action> {
    graph.oracle_events().filter_map(|e| e.action.clone()).collect()
}

/// True if every expected argument is present in `actual` with an equal value.
fn contains_args(actual: &Args, expected: &Args) -> bool {
    expected.iter().all(|(k, v)| actual.get(k) == Some(v))
}

/// Matches each expected action to a distinct successful agent action.
///
/// An agent action matches when it has the same application and operation
/// and its arguments include every expected argument. Expected actions are
/// matched in order, each against the earliest unused candidate.
pub fn match_expected_actions(ctx: &ValidationContext<'_>, expected: &[Action]) -> Result<Verdict, ValidationError> {
    let candidates: Vec<&LogEntry> = ctx.agent_actions().collect();
    let mut used = vec![false; candidates.len()];
    let mut missing = Vec::new();

    for want in expected {
        let key = want.key();
        let found = candidates.iter().enumerate().position(|(i, entry)| {
            !used[i]
                && entry
                    .action
                    .as_ref()
                    .map_or(false, |got| got.key() == key && contains_args(&got.args, &want.args))
        });
        match found {
            Some(i) => used[i] = true,
            None => missing.push(key.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(Verdict::pass(format!("all {} expected agent actions observed", expected.len())))
    } else {
        Ok(Verdict::fail(format!("missing agent actions: {}", missing.join(", "))))
    }
}
