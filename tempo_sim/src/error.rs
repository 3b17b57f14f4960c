//! Error types for the simulation harness.

use tempo_core::{BuildError, SimulationError};
use tempo_env::EnvError;
use thiserror::Error;

/// Errors raised while preparing, running or exporting a scenario.
#[derive(Debug, Error)]
pub enum SimError {
    /// The scenario's event graph is invalid
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Application state could not be captured or restored
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    /// Trace file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Trace file is not valid JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<SimulationError> for SimError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::Build(err) => Self::Build(err),
            SimulationError::Env(err) => Self::Env(err),
        }
    }
}
