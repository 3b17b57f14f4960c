//! SimWorld - The scenario harness container.

use crate::agent::ScriptedAgent;
use crate::context::SimContext;
use crate::error::SimError;
use crate::scenarios::Scenario;

use std::sync::Arc;
use std::time::Duration;
use tempo_core::{RunConfig, RunMode, Simulation};
use tempo_env::{PacedClock, SimClock};

/// How simulated time relates to wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockMode {
    /// Virtual time jumps straight to the next trigger
    Simulated,
    /// Waits are real, scaled by `speed` (2.0 runs twice as fast as wall time)
    WallPaced { speed: f64 },
}

/// Configuration for a scenario run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Oracle or live
    pub mode: RunMode,

    pub pacing: ClockMode,

    /// Overrides the scenario's own time budget
    pub duration: Option<Duration>,

    /// Scheduler step guard
    pub max_steps: usize,

    /// Upper bound of the scripted agent's extra think time
    pub think_jitter: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            mode: RunMode::Oracle,
            pacing: ClockMode::Simulated,
            duration: None,
            max_steps: 100_000,
            think_jitter: Duration::from_millis(500),
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pacing(mut self, pacing: ClockMode) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_think_jitter(mut self, jitter: Duration) -> Self {
        self.think_jitter = jitter;
        self
    }
}

/// The SimWorld - owns the seeded context and builds simulations from scenarios.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Seeded context (virtual clock + RNG streams)
    pub context: Arc<SimContext>,
}

impl SimWorld {
    /// Stream id of the scripted agent's think times
    const AGENT_STREAM: u64 = 0xA6E7;

    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        let context = SimContext::shared(config.seed);
        Self { config, context }
    }

    /// Clock the simulation runs on.
    pub fn clock(&self) -> Result<Arc<dyn SimClock>, SimError> {
        let clock: Arc<dyn SimClock> = match self.config.pacing {
            ClockMode::Simulated => self.context.clone(),
            ClockMode::WallPaced { speed } => {
                if !(speed.is_finite() && speed > 0.0) {
                    return Err(SimError::Runtime(format!("pacing speed must be positive, got {}", speed)));
                }
                PacedClock::shared(speed)
            }
        };
        Ok(clock)
    }

    /// Run configuration for `scenario` under this world's settings.
    pub fn run_config(&self, scenario: &dyn Scenario) -> RunConfig {
        RunConfig::default()
            .with_start_time(scenario.start_time())
            .with_duration(self.config.duration.unwrap_or_else(|| scenario.duration()))
            .with_mode(self.config.mode)
            .with_max_steps(self.config.max_steps)
    }

    /// Initializes the scenario's applications and freezes its event graph.
    pub fn build_simulation(&self, scenario: &dyn Scenario) -> Result<Simulation, SimError> {
        let sim = Simulation::build(
            scenario.init_apps(),
            self.clock()?,
            self.run_config(scenario),
            |builder, env| scenario.build_events(builder, env),
        )?;
        Ok(sim)
    }

    /// Scripted agent for `sim`, seeded from this world.
    pub fn scripted_agent(&self, sim: &Simulation) -> ScriptedAgent {
        ScriptedAgent::from_graph(
            sim.graph(),
            self.context.derive_rng(Self::AGENT_STREAM),
            self.config.think_jitter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_duration_override() {
        let scenario = ScenarioId::KvDemo.scenario();
        let world = SimWorld::new(SimConfig::default());
        assert_eq!(world.run_config(scenario.as_ref()).duration, Duration::from_secs(300));

        let world = SimWorld::new(SimConfig::default().with_duration(Duration::from_secs(5)));
        assert_eq!(world.run_config(scenario.as_ref()).duration, Duration::from_secs(5));
    }

    #[test]
    fn test_build_every_scenario() {
        let world = SimWorld::new(SimConfig::default());
        for id in ScenarioId::all() {
            let sim = world.build_simulation(id.scenario().as_ref()).unwrap();
            assert!(sim.graph().oracle_events().count() > 0, "{}", id);
        }
    }

    #[test]
    fn test_rejects_bad_speed() {
        let world = SimWorld::new(SimConfig::default().with_pacing(ClockMode::WallPaced { speed: 0.0 }));
        assert!(world.clock().is_err());
    }
}
