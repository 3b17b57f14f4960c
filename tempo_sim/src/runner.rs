//! Scenario runner - builds, runs and grades built-in scenarios.

use crate::agent::ReplayAgent;
use crate::error::SimError;
use crate::exporter::TraceExport;
use crate::scenarios::{Scenario, ScenarioId};
use crate::world::{ClockMode, SimConfig, SimWorld};

use std::time::Duration;
use tempo_core::{
    ActionDescriptor, AgentDriver, RunMetrics, RunMode, RunReport, Simulation, Termination, ValidationContext,
};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario's validation passed
    pub passed: bool,

    pub rationale: Option<String>,

    /// Setup or validation error, if any
    pub error: Option<String>,

    /// Scheduler report; `None` if the simulation could not be built
    pub report: Option<RunReport>,

    /// Counters collected during the run
    pub metrics: RunMetrics,

    /// Full trace of the run
    pub export: TraceExport,
}

impl ScenarioResult {
    fn errored(scenario: ScenarioId, seed: u64, mode: RunMode, error: SimError) -> Self {
        let message = error.to_string();
        let mut export = TraceExport::new(scenario.name(), seed, mode);
        export.finalize(false, None);
        Self {
            scenario,
            seed,
            passed: false,
            rationale: None,
            error: Some(message),
            report: None,
            metrics: RunMetrics::default(),
            export,
        }
    }

    /// Why the run did not pass, if it did not.
    pub fn failure_reason(&self) -> Option<&str> {
        if self.passed {
            None
        } else {
            self.error.as_deref().or(self.rationale.as_deref())
        }
    }
}

/// Which agent drives a live run.
#[derive(Debug, Clone, Default)]
pub enum AgentChoice {
    /// Scripted agent performing the oracle actions with seeded think times
    #[default]
    Scripted,
    /// Replay of recorded agent actions
    Replay(Vec<ActionDescriptor>),
    /// No agent at all; agent events are skipped
    Absent,
}

/// Runs scenarios.
pub struct ScenarioRunner {
    config: SimConfig,
    agent: AgentChoice,
    runtime: Runtime,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Result<Self, SimError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SimError::Runtime(e.to_string()))?;
        Ok(Self {
            config: SimConfig::default().with_seed(seed),
            agent: AgentChoice::default(),
            runtime,
        })
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.config = self.config.with_mode(mode);
        self
    }

    pub fn with_pacing(mut self, pacing: ClockMode) -> Self {
        self.config = self.config.with_pacing(pacing);
        self
    }

    /// Overrides the scenario's time budget.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.config = self.config.with_duration(duration);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.config = self.config.with_max_steps(max_steps);
        self
    }

    pub fn with_think_jitter(mut self, jitter: Duration) -> Self {
        self.config = self.config.with_think_jitter(jitter);
        self
    }

    pub fn with_agent(mut self, agent: AgentChoice) -> Self {
        self.agent = agent;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(
            "Starting scenario: {} (seed={}, mode={})",
            scenario.name(),
            self.config.seed,
            self.config.mode
        );

        let world = SimWorld::new(self.config.clone());
        let definition = scenario.scenario();
        let mut sim = match world.build_simulation(definition.as_ref()) {
            Ok(sim) => sim,
            Err(err) => {
                warn!("Scenario {} could not be built: {}", scenario.name(), err);
                return ScenarioResult::errored(scenario, self.config.seed, self.config.mode, err);
            }
        };

        let report = match (self.config.mode, &self.agent) {
            (RunMode::Oracle, _) | (RunMode::Live, AgentChoice::Absent) => {
                self.runtime.block_on(sim.run(self.config.mode, None))
            }
            (RunMode::Live, AgentChoice::Scripted) => {
                let mut agent = world.scripted_agent(&sim);
                self.runtime.block_on(sim.run(RunMode::Live, Some(&mut agent)))
            }
            (RunMode::Live, AgentChoice::Replay(descriptors)) => {
                let mut agent = ReplayAgent::new(descriptors.clone());
                self.runtime.block_on(sim.run(RunMode::Live, Some(&mut agent)))
            }
        };

        self.grade(scenario, definition.as_ref(), &sim, report)
    }

    /// Runs a scenario in live mode against an external agent driver.
    pub fn run_with_agent(&self, scenario: ScenarioId, agent: &mut dyn AgentDriver) -> ScenarioResult {
        let world = SimWorld::new(self.config.clone().with_mode(RunMode::Live));
        let definition = scenario.scenario();
        let mut sim = match world.build_simulation(definition.as_ref()) {
            Ok(sim) => sim,
            Err(err) => return ScenarioResult::errored(scenario, self.config.seed, RunMode::Live, err),
        };
        let report = self.runtime.block_on(sim.run(RunMode::Live, Some(agent)));
        self.grade(scenario, definition.as_ref(), &sim, report)
    }

    /// Runs the scenario twice on one simulation, resetting in between,
    /// and reports whether both logs are byte-identical.
    pub fn check_determinism(&self, scenario: ScenarioId) -> Result<bool, SimError> {
        let world = SimWorld::new(self.config.clone().with_mode(RunMode::Oracle));
        let mut sim = world.build_simulation(scenario.scenario().as_ref())?;

        self.runtime.block_on(sim.run(RunMode::Oracle, None));
        let first = sim.log().to_json()?;
        sim.reset()?;
        self.runtime.block_on(sim.run(RunMode::Oracle, None));
        let second = sim.log().to_json()?;

        debug!("Determinism check for {}: {} bytes per log", scenario.name(), first.len());
        Ok(first == second)
    }

    fn grade(
        &self,
        scenario: ScenarioId,
        definition: &dyn Scenario,
        sim: &Simulation,
        report: RunReport,
    ) -> ScenarioResult {
        if report.termination == Termination::StepLimit {
            warn!("Scenario {} hit the step limit", scenario.name());
        }

        let validation = sim.validate(&|ctx: &ValidationContext<'_>| definition.validate(ctx));
        let metrics = sim.metrics().unwrap_or_default();
        let entries = sim.log().snapshot();

        let mut export = TraceExport::new(scenario.name(), self.config.seed, sim.config().mode);
        export.record(entries, report.clone());
        export.finalize(validation.success, validation.rationale.clone());

        debug!(
            "Scenario {}: {} executed, {} skipped, {} failed, {} timed out",
            scenario.name(),
            metrics.executed,
            metrics.skipped,
            metrics.failed,
            metrics.timed_out
        );

        ScenarioResult {
            scenario,
            seed: self.config.seed,
            passed: validation.success,
            rationale: validation.rationale,
            error: validation.error,
            report: Some(report),
            metrics,
            export,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_runs_pass() {
        let runner = ScenarioRunner::new(42).unwrap();
        for id in ScenarioId::all() {
            let result = runner.run(id);
            assert!(result.passed, "{} failed: {:?}", id, result.failure_reason());
            assert_eq!(result.export.scenario, id.name());
        }
    }

    #[test]
    fn test_live_without_agent_fails_validation() {
        let runner = ScenarioRunner::new(42)
            .unwrap()
            .with_mode(RunMode::Live)
            .with_agent(AgentChoice::Absent);
        let result = runner.run(ScenarioId::KvDemo);
        assert!(!result.passed);
        assert_eq!(result.metrics.agent_actions, 0);
        assert!(result.failure_reason().unwrap().contains("Name not changed"));
    }

    #[test]
    fn test_determinism_across_reset() {
        let runner = ScenarioRunner::new(7).unwrap();
        assert!(runner.check_determinism(ScenarioId::EmailCalendarSeries).unwrap());
    }
}
