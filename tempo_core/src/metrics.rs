//! Run metrics - counters summarizing a finished run.

use crate::event::EventState;
use crate::log::LogEntry;
use crate::scheduler::RunReport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregate counters of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Events per final state
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Events still pending or resolved (only possible on a step-limit stop)
    pub unfinished: usize,

    /// Log entries with a failed outcome
    pub dispatch_failures: usize,
    /// Agent entries, oracle or injected
    pub agent_actions: usize,
    pub oracle_actions: usize,

    /// Simulated time covered by the run
    pub simulated_span: Duration,
    pub steps: usize,
}

impl RunMetrics {
    pub fn collect(report: &RunReport, log: &[LogEntry]) -> Self {
        let mut metrics = RunMetrics {
            simulated_span: report.end_time.saturating_since(report.start_time),
            steps: report.steps,
            ..Default::default()
        };

        for state in &report.states {
            match state {
                EventState::Executed => metrics.executed += 1,
                EventState::Skipped => metrics.skipped += 1,
                EventState::Failed => metrics.failed += 1,
                EventState::TimedOut => metrics.timed_out += 1,
                EventState::Pending | EventState::Resolved => metrics.unfinished += 1,
            }
        }

        for entry in log {
            if !entry.outcome.is_success() {
                metrics.dispatch_failures += 1;
            }
            if entry.is_agent() {
                metrics.agent_actions += 1;
                if entry.oracle {
                    metrics.oracle_actions += 1;
                }
            }
        }

        metrics
    }

    /// Fraction of log entries that succeeded (1.0 for an empty log).
    pub fn success_rate(&self, log_len: usize) -> f64 {
        if log_len == 0 {
            1.0
        } else {
            (log_len - self.dispatch_failures) as f64 / log_len as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Action, EventType};
    use crate::log::Outcome;
    use crate::scheduler::Termination;
    use serde_json::Value;
    use tempo_env::{args, SimTime};

    #[test]
    fn test_collect_counts_states_and_entries() {
        let report = RunReport {
            termination: Termination::QueueDrained,
            start_time: SimTime::from_secs(2),
            end_time: SimTime::from_secs(12),
            steps: 3,
            states: vec![EventState::Executed, EventState::Skipped, EventState::TimedOut],
            completed_at: vec![None; 3],
        };
        let log = vec![LogEntry {
            event_id: None,
            event_type: EventType::Agent,
            timestamp: SimTime::from_secs(5),
            action: Some(Action::new("KVStore", "get_all", args! {})),
            outcome: Outcome::success(Value::Null),
            oracle: true,
        }];

        let metrics = RunMetrics::collect(&report, &log);
        assert_eq!(metrics.executed, 1);
        assert_eq!(metrics.timed_out, 1);
        assert_eq!(metrics.oracle_actions, 1);
        assert_eq!(metrics.simulated_span, Duration::from_secs(10));
        assert_eq!(metrics.success_rate(log.len()), 1.0);
    }
}
