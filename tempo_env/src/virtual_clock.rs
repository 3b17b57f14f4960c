//! Virtual clock for purely simulated runs.

use crate::context::SimClock;
use crate::types::SimTime;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulated clock whose time only moves when asked to.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    /// Current virtual time (milliseconds since simulation start)
    now_ms: Arc<AtomicU64>,

    /// Master seed recorded for this clock
    seed: u64,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl VirtualClock {
    /// Creates a clock at time zero.
    pub fn new(seed: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(0)),
            seed,
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped clock for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Sets the wall-clock time that simulated time zero maps to.
    pub fn with_epoch(mut self, epoch: SystemTime) -> Self {
        self.epoch = epoch;
        self
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.now_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(millis)))
            .ok();
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl SimClock for VirtualClock {
    fn now(&self) -> SimTime {
        SimTime::from_millis(self.now_ms.load(Ordering::SeqCst))
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + Duration::from_millis(self.now().as_millis())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn set_time(&self, time: SimTime) {
        self.now_ms.store(time.as_millis(), Ordering::SeqCst);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
