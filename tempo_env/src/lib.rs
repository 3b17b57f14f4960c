//! Tempo Environment Abstraction Layer
//!
//! This crate provides the pieces of the simulation world that the engine
//! consumes but does not own:
//! - Time (`SimTime`, the `SimClock` trait and its virtual / wall-paced clocks)
//! - The application contract (`App`, `Signature`, `OperationTable`)
//! - Argument mappings (`Args`, the `args!` macro)
//!
//! # Example
//!
//! ```ignore
//! use tempo_env::{SimClock, VirtualClock, SimTime};
//!
//! async fn wait_until<C: SimClock>(clock: &C, at: SimTime) {
//!     let now = clock.now();
//!     if at > now {
//!         clock.sleep(at.saturating_since(now)).await;
//!     }
//! }
//! ```

mod app;
mod context;
mod error;
mod tokio_impl;
mod types;
mod virtual_clock;

pub use app::{App, ArgType, ArgsExt, Handler, Operation, OperationKind, OperationTable, Param, Signature};
pub use context::SimClock;
pub use error::{AppError, ArgumentError, EnvError};
pub use tokio_impl::PacedClock;
pub use types::{AppName, Args, OperationName, RunId, SimTime};
pub use virtual_clock::VirtualClock;

#[doc(hidden)]
pub use serde_json as __serde_json;
