//! JSON trace exporter.
//!
//! Exports a finished run as JSON for offline inspection, and reads it back
//! so the agent's actions can be replayed against a fresh simulation.

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tempo_core::{ActionDescriptor, LogEntry, RunMode, RunReport};
use tempo_env::RunId;

/// Complete run export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Deterministic id derived from the seed
    pub run_id: RunId,

    pub mode: RunMode,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,

    /// Every log entry, in execution order
    pub entries: Vec<LogEntry>,
}

impl TraceExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, mode: RunMode) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            run_id: RunId::from_seed(seed),
            mode,
            passed: false,
            rationale: None,
            report: None,
            entries: Vec::new(),
        }
    }

    /// Attaches the run's log and report.
    pub fn record(&mut self, entries: Vec<LogEntry>, report: RunReport) {
        self.entries = entries;
        self.report = Some(report);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, rationale: Option<String>) {
        self.passed = passed;
        self.rationale = rationale;
    }

    /// Boundary descriptors of every entry that carries an action.
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.entries.iter().filter_map(LogEntry::descriptor).collect()
    }

    /// Descriptors of the agent's successful actions, oracle or injected.
    pub fn agent_descriptors(&self) -> Vec<ActionDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.is_agent() && e.outcome.is_success())
            .filter_map(LogEntry::descriptor)
            .collect()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads an export written by [`write_to_file`](Self::write_to_file).
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_core::{Action, EventId, EventType, Outcome};
    use tempo_env::{args, SimTime};

    fn entry(event_type: EventType, oracle: bool) -> LogEntry {
        LogEntry {
            event_id: Some(EventId(1)),
            event_type,
            timestamp: SimTime::from_millis(2500),
            action: Some(Action::new("KVStore", "get", args! { "key" => "name" })),
            outcome: Outcome::success(serde_json::Value::from("Jane Doe")),
            oracle,
        }
    }

    #[test]
    fn test_agent_descriptors_filter() {
        let mut export = TraceExport::new("kv_demo", 7, RunMode::Oracle);
        export.entries = vec![entry(EventType::User, false), entry(EventType::Agent, true)];

        assert_eq!(export.descriptors().len(), 2);
        let agent = export.agent_descriptors();
        assert_eq!(agent.len(), 1);
        assert!(agent[0].oracle);
        assert_eq!(agent[0].timestamp, SimTime::from_millis(2500));
    }

    #[test]
    fn test_file_round_trip() {
        let mut export = TraceExport::new("kv_demo", 7, RunMode::Live);
        export.entries = vec![entry(EventType::Agent, false)];
        export.finalize(true, Some("ok".to_string()));

        let path = std::env::temp_dir().join(format!("tempo-trace-{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();
        let back = TraceExport::read_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.run_id, export.run_id);
        assert_eq!(back.mode, RunMode::Live);
        assert_eq!(back.entries, export.entries);
        assert!(back.passed);
    }
}
