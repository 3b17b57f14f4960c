//! Tempo scenario harness
//!
//! This crate puts the event-graph engine to work on concrete scenarios:
//! demo applications, built-in scenarios with their validations, agent
//! drivers for live runs, and a runner that grades and exports every run.
//!
//! # Determinism
//!
//! All sources of non-determinism are controlled:
//! - **Time**: the virtual clock only moves when the scheduler asks it to
//! - **Randomness**: agent think times come from streams derived from one 64-bit seed
//! - **Ordering**: ties at the same instant fire in registration order
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                      │
//! │  ┌──────────┐   build    ┌────────────────────────────┐  │
//! │  │ Scenario │──────────► │ SimWorld ─► Simulation     │  │
//! │  └──────────┘            │   (apps, graph, clock)     │  │
//! │        ▲                 └─────────────┬──────────────┘  │
//! │        │ validate                      │ run             │
//! │        │                 ┌─────────────▼──────────────┐  │
//! │        └──────────────── │ event log + final states   │  │
//! │                          └─────────────┬──────────────┘  │
//! │                                        ▼                 │
//! │                                   TraceExport            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tempo_sim::{ScenarioRunner, ScenarioId};
//! use tempo_core::RunMode;
//!
//! let runner = ScenarioRunner::new(42)?.with_mode(RunMode::Live);
//! let result = runner.run(ScenarioId::EmailCalendarSeries);
//! assert!(result.passed);
//! ```

pub mod agent;
pub mod apps;
mod context;
mod error;
pub mod exporter;
pub mod runner;
pub mod scenarios;
mod world;

pub use agent::{ReplayAgent, ScriptedAgent};
pub use context::SimContext;
pub use error::SimError;
pub use exporter::TraceExport;
pub use runner::{AgentChoice, ScenarioResult, ScenarioRunner};
pub use scenarios::{Scenario, ScenarioId};
pub use world::{ClockMode, SimConfig, SimWorld};
