//! Wall-paced implementation of SimClock using Tokio.

use crate::context::SimClock;
use crate::types::SimTime;
use crate::virtual_clock::VirtualClock;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Clock that paces simulated time against the wall clock.
///
/// Every `sleep` really waits (scaled by `speed`) before advancing the
/// simulated time, which gives an external agent real time to decide while
/// the scenario is running. Simulated timestamps are identical to a
/// [`VirtualClock`] run.
#[derive(Debug, Clone)]
pub struct PacedClock {
    /// Simulated time source
    inner: VirtualClock,

    /// Simulated seconds per wall-clock second (1.0 = real time)
    speed: f64,
}

impl PacedClock {
    /// Creates a paced clock. Non-positive or non-finite speeds fall back to real time.
    pub fn new(speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        Self {
            inner: VirtualClock::new(0),
            speed,
        }
    }

    /// Creates an Arc-wrapped clock for sharing across tasks.
    pub fn shared(speed: f64) -> Arc<Self> {
        Arc::new(Self::new(speed))
    }

    /// Returns the pacing factor.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}

impl Default for PacedClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl SimClock for PacedClock {
    fn now(&self) -> SimTime {
        self.inner.now()
    }

    fn system_time(&self) -> SystemTime {
        self.inner.system_time()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration.div_f64(self.speed)).await;
        self.inner.advance(duration);
    }

    fn set_time(&self, time: SimTime) {
        self.inner.set_time(time);
    }

    fn seed(&self) -> u64 {
        // Wall-paced runs are not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_paced_clock_waits_and_advances() {
        let clock = PacedClock::new(100.0);
        let started = Instant::now();
        clock.sleep(Duration::from_secs(1)).await;

        assert_eq!(clock.now(), SimTime::from_secs(1));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_paced_clock_rejects_bad_speed() {
        assert_eq!(PacedClock::new(0.0).speed(), 1.0);
        assert_eq!(PacedClock::new(f64::NAN).speed(), 1.0);
        assert_eq!(PacedClock::new(4.0).speed(), 4.0);
    }

    #[test]
    fn test_paced_clock_seed() {
        let clock = PacedClock::default();
        assert_eq!(clock.seed(), 0);
    }
}
