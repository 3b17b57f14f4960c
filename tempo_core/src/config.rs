//! Run configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tempo_env::SimTime;

/// How `Agent` graph events are treated during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Oracle agent events are dispatched automatically
    Oracle,
    /// Agent behavior comes from an external driver
    Live,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Oracle => f.write_str("oracle"),
            RunMode::Live => f.write_str("live"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oracle" => Ok(RunMode::Oracle),
            "live" => Ok(RunMode::Live),
            other => Err(format!("unknown run mode '{}' (expected oracle or live)", other)),
        }
    }
}

/// Configuration for a single run of an event graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Simulated time at which roots are resolved (default: 0)
    pub start_time: SimTime,

    /// Events triggering after `start_time + duration` never fire (default: 30 min)
    pub duration: Duration,

    /// Oracle or live agent handling (default: oracle)
    pub mode: RunMode,

    /// Safety guard on queue pops (default: 100_000)
    pub max_steps: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_time: SimTime::ZERO,
            duration: Duration::from_secs(30 * 60),
            mode: RunMode::Oracle,
            max_steps: 100_000,
        }
    }
}

impl RunConfig {
    pub fn with_start_time(mut self, start_time: SimTime) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Last simulated instant at which an event may still fire.
    pub fn end_time(&self) -> SimTime {
        self.start_time.saturating_add(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.mode, RunMode::Oracle);
        assert_eq!(config.end_time(), SimTime::from_secs(1800));
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("LIVE".parse::<RunMode>(), Ok(RunMode::Live));
        assert!("replay".parse::<RunMode>().is_err());
        assert_eq!(RunMode::Oracle.to_string(), "oracle");
    }
}
