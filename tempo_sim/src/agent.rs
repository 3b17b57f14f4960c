//! Built-in agent drivers for live runs.
//!
//! - [`ScriptedAgent`]: replays the graph's oracle actions on its own,
//!   reacting to what it observes in the log instead of to the scheduler
//! - [`ReplayAgent`]: re-injects the agent actions of an exported trace at
//!   their recorded timestamps

use async_trait::async_trait;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::time::Duration;
use tempo_core::{
    Action, ActionDescriptor, AgentDecision, AgentDriver, EventGraph, EventId, EventType, Observation, Timing,
};
use tempo_env::SimTime;
use tracing::debug;

/// One oracle action the scripted agent intends to perform.
#[derive(Debug, Clone)]
struct Step {
    id: EventId,
    dependencies: Vec<EventId>,
    timing: Timing,
    action: Action,
}

/// Agent that performs the graph's oracle actions once their inputs are visible.
///
/// An oracle action becomes ready when every dependency has a successful
/// entry in the log (non-oracle agent dependencies count as done, since a
/// live run skips them). Ready actions are decided in registration order with
/// the declared delay plus a random think-time jitter.
pub struct ScriptedAgent {
    steps: Vec<Step>,

    /// Graph events known to have completed
    done: HashSet<EventId>,

    /// Steps already decided, waiting for their entry to show up
    in_flight: Vec<usize>,

    decided: Vec<bool>,

    rng: ChaCha8Rng,

    /// Upper bound of the extra think time
    max_jitter: Duration,
}

impl ScriptedAgent {
    /// Builds the script from the oracle events of `graph`.
    pub fn from_graph(graph: &EventGraph, rng: ChaCha8Rng, max_jitter: Duration) -> Self {
        let steps: Vec<Step> = graph
            .oracle_events()
            .filter_map(|event| {
                event.action.clone().map(|action| Step {
                    id: event.id,
                    dependencies: event.dependencies.clone(),
                    timing: event.timing,
                    action,
                })
            })
            .collect();

        let done = graph
            .events()
            .iter()
            .filter(|e| e.event_type == EventType::Agent && !e.oracle)
            .map(|e| e.id)
            .collect();

        Self {
            decided: vec![false; steps.len()],
            steps,
            done,
            in_flight: Vec::new(),
            rng,
            max_jitter,
        }
    }

    /// Number of scripted actions not yet decided.
    pub fn remaining(&self) -> usize {
        self.decided.iter().filter(|d| !**d).count()
    }

    fn absorb(&mut self, observation: &Observation) {
        for entry in &observation.entries {
            if !entry.outcome.is_success() {
                continue;
            }
            match entry.event_id {
                Some(id) => {
                    self.done.insert(id);
                }
                None if entry.is_agent() => {
                    // our own injected action: settle the first matching one
                    let position = self.in_flight.iter().position(|&i| {
                        entry.action.as_ref() == Some(&self.steps[i].action)
                    });
                    if let Some(position) = position {
                        let index = self.in_flight.remove(position);
                        self.done.insert(self.steps[index].id);
                    }
                }
                None => {}
            }
        }
    }

    fn think_time(&mut self, timing: Timing, now: SimTime) -> Duration {
        let base = match timing {
            Timing::After(delay) => delay,
            Timing::At(at) => at.saturating_since(now),
        };
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            base
        } else {
            base + Duration::from_millis(self.rng.gen_range(0..=jitter_ms))
        }
    }
}

#[async_trait]
impl AgentDriver for ScriptedAgent {
    async fn step(&mut self, observation: Observation) -> Vec<AgentDecision> {
        self.absorb(&observation);

        let mut decisions = Vec::new();
        for index in 0..self.steps.len() {
            if self.decided[index] {
                continue;
            }
            let ready = self.steps[index].dependencies.iter().all(|dep| self.done.contains(dep));
            if !ready {
                continue;
            }
            let think_time = self.think_time(self.steps[index].timing, observation.now);
            debug!(
                "Scripted agent decides {} (+{}ms)",
                self.steps[index].action,
                think_time.as_millis()
            );
            self.decided[index] = true;
            self.in_flight.push(index);
            decisions.push(AgentDecision::new(self.steps[index].action.clone(), think_time));
        }
        decisions
    }
}

/// Agent that re-issues recorded actions at their original timestamps.
pub struct ReplayAgent {
    pending: Vec<ActionDescriptor>,
}

impl ReplayAgent {
    /// Replays `descriptors`; only the first observation triggers decisions.
    pub fn new(descriptors: Vec<ActionDescriptor>) -> Self {
        Self { pending: descriptors }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[async_trait]
impl AgentDriver for ReplayAgent {
    async fn step(&mut self, observation: Observation) -> Vec<AgentDecision> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|d| {
                let think_time = d.timestamp.saturating_since(observation.now);
                AgentDecision::new(d.to_action(), think_time)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tempo_core::{GraphBuilder, LogEntry, Outcome};
    use tempo_env::args;

    fn graph() -> EventGraph {
        let mut b = GraphBuilder::begin_build();
        let ask = b
            .user("UI", "ask", args! {})
            .delay(Duration::from_secs(1))
            .register()
            .unwrap();
        let first = b
            .agent("Store", "set", args! { "key" => "a", "value" => "1" })
            .oracle()
            .after(ask)
            .delay(Duration::from_secs(2))
            .register()
            .unwrap();
        b.agent("UI", "reply", args! {})
            .oracle()
            .after(first)
            .delay(Duration::from_secs(1))
            .register()
            .unwrap();
        b.finalize().unwrap()
    }

    fn entry(event_id: Option<EventId>, event_type: EventType, action: Action, at: u64) -> LogEntry {
        LogEntry {
            event_id,
            event_type,
            timestamp: SimTime::from_secs(at),
            action: Some(action),
            outcome: Outcome::success(serde_json::Value::Null),
            oracle: false,
        }
    }

    fn observe(now: u64, entries: Vec<LogEntry>) -> Observation {
        Observation {
            now: SimTime::from_secs(now),
            log_len: entries.len(),
            entries,
        }
    }

    #[tokio::test]
    async fn test_scripted_agent_follows_dependencies() {
        let graph = graph();
        let mut agent = ScriptedAgent::from_graph(&graph, ChaCha8Rng::seed_from_u64(1), Duration::ZERO);
        assert_eq!(agent.remaining(), 2);

        // nothing is ready before the user asks
        assert!(agent.step(observe(0, Vec::new())).await.is_empty());

        let asked = entry(Some(EventId(0)), EventType::User, Action::new("UI", "ask", args! {}), 1);
        let decisions = agent.step(observe(1, vec![asked])).await;
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action.operation.as_str(), "set");
        assert_eq!(decisions[0].think_time, Duration::from_secs(2));

        let own = entry(None, EventType::Agent, decisions[0].action.clone(), 3);
        let decisions = agent.step(observe(3, vec![own])).await;
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action.operation.as_str(), "reply");
        assert_eq!(agent.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_agent_jitter_is_seeded() {
        let graph = graph();
        let asked = entry(Some(EventId(0)), EventType::User, Action::new("UI", "ask", args! {}), 1);

        let mut times = Vec::new();
        for _ in 0..2 {
            let mut agent =
                ScriptedAgent::from_graph(&graph, ChaCha8Rng::seed_from_u64(9), Duration::from_millis(500));
            let decisions = agent.step(observe(1, vec![asked.clone()])).await;
            let think = decisions[0].think_time;
            assert!(think >= Duration::from_secs(2) && think <= Duration::from_millis(2500));
            times.push(think);
        }
        assert_eq!(times[0], times[1]);
    }

    #[tokio::test]
    async fn test_replay_agent_schedules_at_recorded_times() {
        let descriptor = entry(None, EventType::Agent, Action::new("Store", "get", args! { "key" => "a" }), 7)
            .descriptor()
            .unwrap();
        let mut agent = ReplayAgent::new(vec![descriptor]);
        assert_eq!(agent.len(), 1);

        let decisions = agent.step(observe(2, Vec::new())).await;
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].think_time, Duration::from_secs(5));
        assert!(agent.is_empty());
        assert!(agent.step(observe(3, Vec::new())).await.is_empty());
    }
}
