//! Error taxonomy of the engine.
//!
//! - [`BuildError`]: fatal, raised while declaring or freezing the graph
//! - [`ActionError`]: dispatch-time, always captured into a failed outcome
//! - [`ValidationError`]: raised by a check, always caught by `validate`
//! - [`SimulationError`]: setting up a [`Simulation`](crate::Simulation)

use serde::{Deserialize, Serialize};
use tempo_env::{AppError, ArgumentError, EnvError};
use thiserror::Error;

/// Errors raised while building the event graph. Nothing has executed when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Event {event} depends on unknown event {dependency}")]
    UnknownDependency { event: String, dependency: String },

    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("Event {event} is marked oracle but is not an agent event")]
    InvalidOracle { event: String },

    #[error("Event {event} has no action")]
    MissingAction { event: String },

    #[error("Event {event}: condition is required for condition events and forbidden otherwise")]
    ConditionMismatch { event: String },

    #[error("Event {event}: invalid condition ({reason})")]
    InvalidCondition { event: String, reason: String },

    #[error("Event {event}: invalid timing ({reason})")]
    InvalidTiming { event: String, reason: String },

    #[error("Duplicate event label: {0}")]
    DuplicateLabel(String),
}

/// Dispatch-time failures. Recorded in the log, never propagated to the scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("Unknown operation: {app}.{operation}")]
    UnknownOperation { app: String, operation: String },

    #[error("Invalid argument for {operation}: {source}")]
    InvalidArgument {
        operation: String,
        #[source]
        source: ArgumentError,
    },

    #[error("Application error: {0}")]
    Application(#[from] AppError),

    #[error("Operation panicked: {0}")]
    Panicked(String),

    #[error("Condition timed out after {0}ms")]
    Timeout(u64),

    #[error("Condition predicate panicked: {0}")]
    Predicate(String),
}

impl ActionError {
    /// Stable classification used in serialized outcomes.
    pub fn kind(&self) -> FailureKind {
        match self {
            ActionError::UnknownApplication(_) => FailureKind::UnknownApplication,
            ActionError::UnknownOperation { .. } => FailureKind::UnknownOperation,
            ActionError::InvalidArgument { .. } => FailureKind::InvalidArgument,
            ActionError::Application(_) => FailureKind::Application,
            ActionError::Panicked(_) => FailureKind::Panic,
            ActionError::Timeout(_) => FailureKind::Timeout,
            ActionError::Predicate(_) => FailureKind::Predicate,
        }
    }
}

/// Serialized classification of a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownApplication,
    UnknownOperation,
    InvalidArgument,
    Application,
    Panic,
    Timeout,
    Predicate,
}

/// Errors raised by a validation check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("No state recorded for application {0}")]
    MissingState(String),

    #[error("Unexpected state shape: {0}")]
    StateShape(String),

    #[error("Check failed: {0}")]
    Check(String),
}

impl ValidationError {
    /// Creates a generic check error.
    pub fn check(msg: impl Into<String>) -> Self {
        Self::Check(msg.into())
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::StateShape(err.to_string())
    }
}

/// Errors raised while setting up or resetting a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Graph build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Environment error: {0}")]
    Env(#[from] EnvError),
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
