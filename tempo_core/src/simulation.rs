//! Simulation - build, run, validate and reset one scenario instance.
//!
//! Ties the engine's parts together the way a runner uses them:
//!
//! ```text
//! apps + clock ──► Environment ──► declare(builder, env) ──► EventGraph
//!                       │                                       │
//!                       └────────────► Scheduler::run ◄─────────┘
//!                                          │
//!                                     EventLog + RunReport ──► validate(check)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut sim = Simulation::build(apps, VirtualClock::shared(7), RunConfig::default(), |b, _env| {
//!     b.user("AgentUserInterface", "send_message_to_agent", args! { "content" => "hi" }).register()?;
//!     Ok(())
//! })?;
//! let report = sim.run(RunMode::Oracle, None).await;
//! let result = sim.validate(&my_check);
//! sim.reset()?;
//! ```

use crate::agent::AgentDriver;
use crate::builder::GraphBuilder;
use crate::config::{RunConfig, RunMode};
use crate::environment::{Environment, StateImage};
use crate::error::{BuildError, SimulationError};
use crate::graph::EventGraph;
use crate::log::{LogEntry, LogReader};
use crate::metrics::RunMetrics;
use crate::scheduler::{RunReport, Scheduler};
use crate::validation::{validate, Check, ValidationResult};
use std::sync::Arc;
use tempo_env::{App, SimClock};
use tracing::info;

/// One scenario instance: frozen graph, live environment, initial state.
pub struct Simulation {
    graph: EventGraph,
    env: Environment,
    config: RunConfig,

    /// State before any event fired, restored by `reset`
    initial: StateImage,

    last_report: Option<RunReport>,
}

impl Simulation {
    /// Creates the environment, lets `declare` register events, and freezes the graph.
    ///
    /// `declare` may read the freshly initialized applications. A build
    /// error aborts before anything executes.
    pub fn build<F>(
        apps: Vec<Box<dyn App>>,
        clock: Arc<dyn SimClock>,
        config: RunConfig,
        declare: F,
    ) -> Result<Self, SimulationError>
    where
        F: FnOnce(&mut GraphBuilder, &Environment) -> Result<(), BuildError>,
    {
        let env = Environment::new(apps, clock);
        env.clock().set_time(config.start_time);

        let mut builder = GraphBuilder::begin_build();
        declare(&mut builder, &env)?;
        let graph = builder.finalize()?;
        let initial = env.snapshot()?;

        info!(
            "Built simulation: {} events ({} oracle), apps {:?}",
            graph.len(),
            graph.oracle_events().count(),
            env.app_names()
        );

        Ok(Self {
            graph,
            env,
            config,
            initial,
            last_report: None,
        })
    }

    /// Runs the graph in `mode`. `agent` is consulted only in live mode.
    pub async fn run(&mut self, mode: RunMode, agent: Option<&mut dyn AgentDriver>) -> RunReport {
        let config = self.config.clone().with_mode(mode);
        let report = Scheduler::new(&self.graph, config).run(&mut self.env, agent).await;
        self.last_report = Some(report.clone());
        report
    }

    /// Validates the current log and application states.
    pub fn validate(&self, check: &dyn Check) -> ValidationResult {
        match self.env.snapshot() {
            Ok(states) => validate(&self.log().snapshot(), &states, check),
            Err(err) => ValidationResult {
                success: false,
                rationale: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Restores the initial state and starts a fresh log.
    ///
    /// Readers obtained before the reset keep observing the previous run.
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        self.env.restore(&self.initial)?;
        self.env.start_new_log();
        self.last_report = None;
        Ok(())
    }

    pub fn graph(&self) -> &EventGraph {
        &self.graph
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn log(&self) -> LogReader {
        self.env.log()
    }

    /// Report of the latest run since the last reset.
    pub fn report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Metrics of the latest run, if any.
    pub fn metrics(&self) -> Option<RunMetrics> {
        let entries: Vec<LogEntry> = self.log().snapshot();
        self.last_report.as_ref().map(|report| RunMetrics::collect(report, &entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::tests::Store;
    use crate::error::ValidationError;
    use crate::validation::{ValidationContext, Verdict};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempo_env::{args, VirtualClock};

    fn build() -> Simulation {
        Simulation::build(
            vec![Box::new(Store::new())],
            VirtualClock::shared(1),
            RunConfig::default(),
            |b, env| {
                assert_eq!(env.app_names(), vec!["Store"]);
                let first = b
                    .user("Store", "set", args! { "key" => "name", "value" => "Jane" })
                    .delay(Duration::from_secs(1))
                    .register()?;
                b.agent("Store", "get", args! { "key" => "name" })
                    .oracle()
                    .after(first)
                    .delay(Duration::from_secs(2))
                    .register()?;
                Ok(())
            },
        )
        .unwrap()
    }

    fn name_is_jane(ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        let store: BTreeMap<String, String> = ctx.app_state_as("Store")?;
        Ok(Verdict::from(store.get("name").map(String::as_str) == Some("Jane")))
    }

    #[tokio::test]
    async fn test_build_run_validate_reset() {
        let mut sim = build();
        let report = sim.run(RunMode::Oracle, None).await;
        assert_eq!(report.steps, 2);
        assert!(sim.validate(&name_is_jane).success);
        assert_eq!(sim.metrics().map(|m| m.oracle_actions), Some(1));

        let old_log = sim.log();
        sim.reset().unwrap();
        assert!(sim.log().is_empty());
        assert_eq!(old_log.len(), 2);
        assert!(!sim.validate(&name_is_jane).success);
        assert!(sim.report().is_none());

        // a second run from the restored state is identical
        sim.run(RunMode::Oracle, None).await;
        assert_eq!(sim.log().to_json().unwrap(), {
            let mut fresh = build();
            fresh.run(RunMode::Oracle, None).await;
            fresh.log().to_json().unwrap()
        });
    }

    #[test]
    fn test_build_error_aborts() {
        let result = Simulation::build(
            vec![Box::new(Store::new())],
            VirtualClock::shared(1),
            RunConfig::default(),
            |b, _| {
                b.user("Store", "set", args! {}).after_label("missing").register()?;
                Ok(())
            },
        );
        assert!(matches!(result, Err(SimulationError::Build(_))));
    }
}
