//! Error types for the Tempo environment abstraction.

use crate::app::ArgType;
use thiserror::Error;

/// Errors raised by an application while executing an operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    /// An argument passed the signature check but its value is unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The application state does not allow the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// State (de)serialization failed
    #[error("State error: {0}")]
    State(String),
}

impl AppError {
    /// Creates an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(err.to_string())
    }
}

/// Errors raised when arguments do not match an operation's signature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("missing required argument '{0}'")]
    Missing(String),

    #[error("unexpected argument '{0}'")]
    Unexpected(String),

    #[error("argument '{param}' expects {expected}, got {found}")]
    TypeMismatch {
        param: String,
        expected: ArgType,
        found: String,
    },
}

/// Errors from environment-level operations (snapshot, restore).
#[derive(Debug, Error)]
pub enum EnvError {
    /// The state image names an application that is not registered
    #[error("Unknown application in state image: {0}")]
    UnknownApplication(String),

    /// An application failed to produce or load its state
    #[error("Application '{app}' state error: {source}")]
    AppState {
        app: String,
        #[source]
        source: AppError,
    },
}
