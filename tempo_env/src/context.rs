//! Core clock trait for the Tempo scheduler.

use crate::types::SimTime;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The central interface for simulated time.
///
/// This trait abstracts the passage of time so that the same scheduler can
/// run purely simulated (every wait completes instantly) or paced against
/// the wall clock (to give a real agent time to think).
///
/// # Implementations
///
/// - **Simulation**: `VirtualClock` - an atomic virtual clock
/// - **Wall-paced**: `PacedClock` - wraps `tokio::time::sleep`, scaled by a speed factor
///
/// # Determinism
///
/// Both implementations report the same simulated timestamps for the same
/// sequence of `sleep` calls; pacing only changes how long a run takes.
#[async_trait]
pub trait SimClock: Send + Sync + 'static {
    /// Returns the current simulated time.
    fn now(&self) -> SimTime;

    /// Returns the wall-clock time corresponding to `now()`.
    ///
    /// Derived from the current simulated time plus the clock's epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends until `duration` of simulated time has elapsed.
    ///
    /// In simulation: advances the virtual clock immediately.
    /// Wall-paced: sleeps for `duration / speed`, then advances.
    async fn sleep(&self, duration: Duration);

    /// Moves the clock to `time` without waiting (used for start-up and restore).
    fn set_time(&self, time: SimTime);

    /// Returns the clock's seed (for logging/debugging).
    ///
    /// Unseeded clocks return 0.
    fn seed(&self) -> u64;
}
