//! Tempo Core - timed event-graph execution engine
//!
//! Applications evolve over simulated time according to a graph of timed
//! events so that a decision-making agent can be exercised and graded:
//! 1. **Declaration**: events with dependencies and delays are registered on a
//!    [`GraphBuilder`] and frozen into an acyclic [`EventGraph`]
//! 2. **Execution**: the [`Scheduler`] fires events in `(time, registration)`
//!    order through the [`Environment`], recording every outcome in the event log
//! 3. **Grading**: [`validate`] runs a check over the log and final states

pub mod agent;
pub mod builder;
pub mod config;
pub mod environment;
pub mod error;
pub mod event;
pub mod graph;
pub mod log;
pub mod metrics;
pub mod scheduler;
pub mod simulation;
pub mod validation;

// Re-export key types for convenience
pub use agent::{AgentDecision, AgentDriver, AgentEndpoint, ChannelAgent, Observation};
pub use builder::{EventDraft, EventHandle, GraphBuilder};
pub use config::{RunConfig, RunMode};
pub use environment::{DispatchMeta, Environment, StateImage};
pub use error::{ActionError, BuildError, FailureKind, SimulationError, ValidationError};
pub use event::{Action, ActionKey, Condition, Event, EventId, EventSpec, EventState, EventType, Timing};
pub use graph::EventGraph;
pub use log::{ActionDescriptor, EventLog, LogEntry, LogReader, Outcome};
pub use metrics::RunMetrics;
pub use scheduler::{RunReport, Scheduler, Termination};
pub use simulation::Simulation;
pub use validation::{match_expected_actions, oracle_actions, validate, Check, ValidationContext, ValidationResult, Verdict};
