//! The Scheduler - deterministic, time-ordered execution of an event graph.
//!
//! # Algorithm
//!
//! A min-priority queue keyed by `(trigger time, slot)` holds every event
//! whose trigger time is known. Slots order graph events by registration
//! index, then actions injected by a live agent by arrival sequence, so
//! two entries due at the same instant always fire in the same order.
//!
//! On each pop the clock is advanced to the entry's time and the entry is
//! fired:
//!
//! - action events dispatch through the [`Environment`] and become
//!   `Executed` or `Failed`
//! - condition events evaluate their predicate and either fire, re-queue at
//!   `min(now + interval, deadline)`, or time out at the deadline
//! - `Agent` events are dispatched only in oracle mode when flagged oracle,
//!   otherwise they are `Skipped` at their trigger time
//!
//! Completing an event re-evaluates its direct dependents. A dependent
//! resolves once every dependency is `Executed` or `Skipped`; dependents of
//! `Failed` or `TimedOut` events stay pending. When the run stops, pending
//! condition events are reported `TimedOut` and everything else `Skipped`.

use crate::agent::{AgentDecision, AgentDriver, Observation};
use crate::config::{RunConfig, RunMode};
use crate::environment::{DispatchMeta, Environment};
use crate::error::{panic_message, ActionError};
use crate::event::{Event, EventId, EventState, EventType, Timing};
use crate::graph::EventGraph;
use crate::log::Outcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tempo_env::SimTime;
use tracing::{debug, info, warn};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Nothing left to fire
    QueueDrained,
    /// Next trigger time lies beyond `start_time + duration`
    DurationExceeded,
    /// `max_steps` pops were performed
    StepLimit,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub termination: Termination,
    pub start_time: SimTime,
    /// Clock time when the run stopped
    pub end_time: SimTime,
    /// Queue pops performed
    pub steps: usize,
    /// Final state of each event, indexed by `EventId`
    pub states: Vec<EventState>,
    /// Completion time of each event that reached a terminal state while running
    pub completed_at: Vec<Option<SimTime>>,
}

impl RunReport {
    pub fn state(&self, id: EventId) -> Option<EventState> {
        self.states.get(id.index()).copied()
    }

    /// Number of events that ended in `state`.
    pub fn count(&self, state: EventState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }
}

/// What a queue entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    /// Graph event (ordered by registration index)
    Event(EventId),
    /// Agent action injected during a live run (ordered by arrival)
    Injected(usize),
}

/// Runs one event graph against one environment.
pub struct Scheduler<'g> {
    graph: &'g EventGraph,
    config: RunConfig,

    states: Vec<EventState>,
    completed_at: Vec<Option<SimTime>>,

    /// Deadline of each condition, set at its first check
    deadlines: Vec<Option<SimTime>>,

    queue: BinaryHeap<Reverse<(SimTime, Slot)>>,

    /// Actions injected by the agent, indexed by arrival sequence
    injected: Vec<AgentDecision>,

    /// Log length already shown to the agent
    observed: usize,

    steps: usize,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g EventGraph, config: RunConfig) -> Self {
        let n = graph.len();
        Self {
            graph,
            config,
            states: vec![EventState::Pending; n],
            completed_at: vec![None; n],
            deadlines: vec![None; n],
            queue: BinaryHeap::new(),
            injected: Vec::new(),
            observed: 0,
            steps: 0,
        }
    }

    /// Executes the graph until the queue drains, the duration is exceeded,
    /// or the step limit is reached.
    ///
    /// `agent` is consulted only in live mode.
    pub async fn run(
        mut self,
        env: &mut Environment,
        mut agent: Option<&mut dyn AgentDriver>,
    ) -> RunReport {
        let start = self.config.start_time;
        let end = self.config.end_time();
        env.clock().set_time(start);
        self.observed = env.log().len();

        info!(
            "Starting {} run: {} events, window {} .. {}",
            self.config.mode,
            self.graph.len(),
            start,
            end
        );

        for root in self.graph.roots() {
            self.resolve(*root, start, start);
        }

        if self.config.mode == RunMode::Live {
            if let Some(agent) = agent.as_deref_mut() {
                self.step_agent(env, agent).await;
            }
        }

        let live = self.config.mode == RunMode::Live;
        let termination = loop {
            if self.steps >= self.config.max_steps {
                break Termination::StepLimit;
            }
            if let (true, Some(agent)) = (live, agent.as_deref_mut()) {
                let arrived = agent.poll(env.now());
                self.queue_decisions(env.now(), arrived);
                if self.queue.is_empty() {
                    let owed = agent.flush(env.now()).await;
                    self.queue_decisions(env.now(), owed);
                }
            }
            let Some(Reverse((time, slot))) = self.queue.peek().copied() else {
                break Termination::QueueDrained;
            };
            if time > end {
                break Termination::DurationExceeded;
            }
            self.queue.pop();
            self.steps += 1;

            let now = env.now();
            if time > now {
                env.clock().sleep(time.saturating_since(now)).await;
            }

            let before = env.log().len();
            match slot {
                Slot::Event(id) => self.fire(id, env),
                Slot::Injected(seq) => {
                    if let Some(decision) = self.injected.get(seq) {
                        env.dispatch(DispatchMeta::agent(), &decision.action);
                    }
                }
            }

            if live && env.log().len() > before {
                if let Some(agent) = agent.as_deref_mut() {
                    self.step_agent(env, agent).await;
                }
            }
        };

        self.finish(env, termination)
    }

    /// Computes the trigger time of `id` and queues it.
    fn resolve(&mut self, id: EventId, base: SimTime, now: SimTime) {
        let Some(event) = self.graph.event(id) else {
            return;
        };
        let trigger = match event.timing {
            Timing::After(delay) => base.saturating_add(delay),
            Timing::At(time) => time,
        };
        let trigger = trigger.max(now);
        self.states[id.index()] = EventState::Resolved;
        self.queue.push(Reverse((trigger, Slot::Event(id))));
        debug!("Resolved {} to {}", event.display_name(), trigger);
    }

    fn fire(&mut self, id: EventId, env: &mut Environment) {
        let graph = self.graph;
        let Some(event) = graph.event(id) else {
            return;
        };

        match event.event_type {
            EventType::Condition => self.check_condition(event, env),
            EventType::Agent if self.config.mode == RunMode::Live || !event.oracle => {
                debug!("Skipping agent event {} at {}", event.display_name(), env.now());
                self.complete(id, EventState::Skipped, env.now());
            }
            _ => {
                let Some(action) = &event.action else {
                    self.complete(id, EventState::Skipped, env.now());
                    return;
                };
                let meta = DispatchMeta::event(id, event.event_type, event.oracle);
                let entry = env.dispatch(meta, action);
                let state = if entry.outcome.is_success() {
                    EventState::Executed
                } else {
                    EventState::Failed
                };
                self.complete(id, state, entry.timestamp);
            }
        }
    }

    fn check_condition(&mut self, event: &Event, env: &mut Environment) {
        let id = event.id;
        let Some(condition) = &event.condition else {
            return;
        };
        let now = env.now();
        let deadline = *self.deadlines[id.index()].get_or_insert(now.saturating_add(condition.timeout));
        let meta = DispatchMeta::event(id, EventType::Condition, false);

        let checked = catch_unwind(AssertUnwindSafe(|| (condition.predicate)(&*env)));
        match checked {
            Err(payload) => {
                let err = ActionError::Predicate(panic_message(payload.as_ref()));
                warn!("Condition {} failed: {}", event.display_name(), err);
                env.record(meta, None, Outcome::failure(&err));
                self.complete(id, EventState::Failed, now);
            }
            Ok(true) => {
                let state = match &event.action {
                    Some(action) => {
                        if env.dispatch(meta, action).outcome.is_success() {
                            EventState::Executed
                        } else {
                            EventState::Failed
                        }
                    }
                    None => {
                        env.record(meta, None, Outcome::success(Value::Bool(true)));
                        EventState::Executed
                    }
                };
                debug!("Condition {} satisfied at {}", event.display_name(), now);
                self.complete(id, state, now);
            }
            Ok(false) if now >= deadline => {
                let timeout_ms = u64::try_from(condition.timeout.as_millis()).unwrap_or(u64::MAX);
                let err = ActionError::Timeout(timeout_ms);
                warn!("Condition {} timed out at {}", event.display_name(), now);
                env.record(meta, None, Outcome::failure(&err));
                self.complete(id, EventState::TimedOut, now);
            }
            Ok(false) => {
                let next = now.saturating_add(condition.interval).min(deadline);
                self.queue.push(Reverse((next, Slot::Event(id))));
            }
        }
    }

    /// Marks `id` terminal and resolves any dependents it unblocks.
    fn complete(&mut self, id: EventId, state: EventState, at: SimTime) {
        self.states[id.index()] = state;
        self.completed_at[id.index()] = Some(at);
        if !state.releases_dependents() {
            return;
        }

        let graph = self.graph;
        for dependent in graph.dependents(id) {
            if self.states[dependent.index()] != EventState::Pending {
                continue;
            }
            let Some(event) = graph.event(*dependent) else {
                continue;
            };
            let mut base = SimTime::ZERO;
            let mut ready = true;
            for dep in &event.dependencies {
                match self.completed_at[dep.index()] {
                    Some(done) if self.states[dep.index()].releases_dependents() => {
                        base = base.max(done);
                    }
                    _ => {
                        ready = false;
                        break;
                    }
                }
            }
            if ready {
                self.resolve(*dependent, base, at);
            }
        }
    }

    async fn step_agent(&mut self, env: &Environment, agent: &mut dyn AgentDriver) {
        let log = env.log();
        let entries = log.since(self.observed);
        self.observed = log.len();
        let now = env.now();

        let decisions = agent
            .step(Observation {
                now,
                entries,
                log_len: self.observed,
            })
            .await;

        self.queue_decisions(now, decisions);
    }

    fn queue_decisions(&mut self, now: SimTime, decisions: Vec<AgentDecision>) {
        for decision in decisions {
            let at = now.saturating_add(decision.think_time);
            debug!("Agent decided {} for {}", decision.action, at);
            self.queue.push(Reverse((at, Slot::Injected(self.injected.len()))));
            self.injected.push(decision);
        }
    }

    fn finish(mut self, env: &Environment, termination: Termination) -> RunReport {
        for (index, state) in self.states.iter_mut().enumerate() {
            if state.is_terminal() {
                continue;
            }
            *state = match self.graph.events().get(index) {
                Some(event) if event.event_type == EventType::Condition => EventState::TimedOut,
                _ => EventState::Skipped,
            };
        }

        let report = RunReport {
            termination,
            start_time: self.config.start_time,
            end_time: env.now(),
            steps: self.steps,
            states: self.states,
            completed_at: self.completed_at,
        };
        info!(
            "Run finished ({:?}) at {} after {} steps",
            report.termination, report.end_time, report.steps
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::environment::tests::{store_env, Store};
    use crate::error::FailureKind;
    use crate::event::Condition;
    use crate::log::LogEntry;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::time::Duration;
    use tempo_env::args;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn set(key: &str) -> tempo_env::Args {
        args! { "key" => key, "value" => "v" }
    }

    async fn run(graph: &EventGraph, env: &mut Environment, config: RunConfig) -> RunReport {
        Scheduler::new(graph, config).run(env, None).await
    }

    fn timestamps(entries: &[LogEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.timestamp.as_millis() / 1000).collect()
    }

    #[tokio::test]
    async fn test_chain_resolves_cumulative_delays() {
        let mut b = GraphBuilder::begin_build();
        let e1 = b.env("Store", "set", set("a")).delay(secs(5)).register().unwrap();
        let e2 = b.env("Store", "set", set("b")).after(e1).delay(secs(10)).register().unwrap();
        b.env("Store", "set", set("c")).after(e2).delay(secs(2)).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let report = run(&graph, &mut env, RunConfig::default()).await;

        assert_eq!(timestamps(&env.log().snapshot()), vec![5, 15, 17]);
        assert_eq!(report.termination, Termination::QueueDrained);
        assert_eq!(report.count(EventState::Executed), 3);
    }

    #[tokio::test]
    async fn test_simultaneous_events_fire_in_registration_order() {
        let mut b = GraphBuilder::begin_build();
        let e1 = b.env("Store", "set", set("first")).delay(secs(5)).register().unwrap();
        let e2 = b.env("Store", "set", set("e2")).after(e1).delay(secs(5)).register().unwrap();
        let e3 = b.env("Store", "set", set("e3")).after(e1).delay(secs(5)).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        run(&graph, &mut env, RunConfig::default()).await;

        let log = env.log().snapshot();
        let ids: Vec<_> = log.iter().filter_map(|e| e.event_id).collect();
        assert_eq!(ids, vec![e1.id(), e2.id(), e3.id()]);
        assert_eq!(timestamps(&log), vec![5, 10, 10]);
    }

    #[tokio::test]
    async fn test_absolute_time_is_clamped_to_now() {
        let mut b = GraphBuilder::begin_build();
        let e1 = b.env("Store", "set", set("a")).delay(secs(20)).register().unwrap();
        b.env("Store", "set", set("b")).after(e1).at(SimTime::from_secs(3)).register().unwrap();
        b.env("Store", "set", set("c")).at(SimTime::from_secs(7)).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        run(&graph, &mut env, RunConfig::default()).await;
        assert_eq!(timestamps(&env.log().snapshot()), vec![7, 20, 20]);
    }

    fn oracle_graph() -> EventGraph {
        let mut b = GraphBuilder::begin_build();
        let user = b.user("Store", "set", set("ask")).delay(secs(1)).register().unwrap();
        let answer = b
            .agent("Store", "get", args! { "key" => "ask" })
            .oracle()
            .after(user)
            .delay(secs(2))
            .register()
            .unwrap();
        b.agent("Store", "set", set("not-expected")).after(user).register().unwrap();
        b.env("Store", "set", set("after-answer")).after(answer).delay(secs(1)).register().unwrap();
        b.finalize().unwrap()
    }

    #[tokio::test]
    async fn test_oracle_mode_dispatches_oracle_agent_events() {
        let graph = oracle_graph();
        let mut env = store_env();
        let report = run(&graph, &mut env, RunConfig::default()).await;

        let log = env.log().snapshot();
        let agent: Vec<_> = log.iter().filter(|e| e.is_agent()).collect();
        assert_eq!(agent.len(), 1);
        assert!(agent[0].oracle);
        assert_eq!(agent[0].timestamp, SimTime::from_secs(3));
        assert_eq!(report.state(EventId(2)), Some(EventState::Skipped));
        assert_eq!(report.count(EventState::Executed), 3);
    }

    #[tokio::test]
    async fn test_live_mode_skips_agent_events_without_driver() {
        let graph = oracle_graph();
        let mut env = store_env();
        let config = RunConfig::default().with_mode(RunMode::Live);
        let report = run(&graph, &mut env, config).await;

        let log = env.log().snapshot();
        assert!(log.iter().all(|e| !e.is_agent()));
        assert_eq!(report.state(EventId(1)), Some(EventState::Skipped));
        // the dependent of the skipped agent event still fires
        assert_eq!(report.state(EventId(3)), Some(EventState::Executed));
        assert_eq!(log.last().map(|e| e.timestamp), Some(SimTime::from_secs(4)));
    }

    struct EchoAgent;

    #[async_trait]
    impl AgentDriver for EchoAgent {
        async fn step(&mut self, observation: Observation) -> Vec<AgentDecision> {
            observation
                .entries
                .iter()
                .filter(|e| e.event_type == EventType::User)
                .map(|_| {
                    let action = crate::event::Action::new("Store", "get", args! { "key" => "ask" });
                    AgentDecision::new(action, Duration::from_millis(1500))
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn test_live_mode_queues_agent_decisions() {
        let graph = oracle_graph();
        let mut env = store_env();
        let mut agent = EchoAgent;
        let config = RunConfig::default().with_mode(RunMode::Live);
        Scheduler::new(&graph, config).run(&mut env, Some(&mut agent)).await;

        let log = env.log().snapshot();
        let injected: Vec<_> = log.iter().filter(|e| e.is_agent()).collect();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].event_id, None);
        assert!(!injected[0].oracle);
        assert_eq!(injected[0].timestamp, SimTime::from_millis(2500));
        assert!(injected[0].outcome.is_success());
    }

    #[tokio::test]
    async fn test_reply_after_decision_window_still_reaches_log() {
        let mut b = GraphBuilder::begin_build();
        let ask = b.user("Store", "set", set("ask")).delay(secs(1)).register().unwrap();
        b.env("Store", "set", set("tick")).after(ask).delay(secs(5)).register().unwrap();
        let graph = b.finalize().unwrap();

        let (driver, mut endpoint) = crate::agent::ChannelAgent::pair(Duration::from_millis(50));
        let mut driver = driver.with_drain_timeout(Duration::from_secs(2));
        let agent = tokio::spawn(async move {
            while let Some(observation) = endpoint.next_observation().await {
                tokio::time::sleep(Duration::from_millis(120)).await;
                let asked = observation.entries.iter().any(|e| e.event_type == EventType::User);
                let reply = if asked {
                    vec![AgentDecision::immediate(crate::event::Action::new("Store", "set", set("agent")))]
                } else {
                    Vec::new()
                };
                if !endpoint.respond(reply).await {
                    break;
                }
            }
        });

        let mut env = store_env();
        let config = RunConfig::default().with_mode(RunMode::Live);
        let report = Scheduler::new(&graph, config).run(&mut env, Some(&mut driver)).await;
        drop(driver);
        agent.await.unwrap();

        assert_eq!(report.termination, Termination::QueueDrained);
        let log = env.log().snapshot();
        let injected: Vec<_> = log.iter().filter(|e| e.is_agent()).collect();
        assert_eq!(injected.len(), 1);
        assert!(injected[0].outcome.is_success());
        // the answer to the t=1 observation arrives once the clock is at 6s
        assert_eq!(injected[0].timestamp, SimTime::from_secs(6));
        assert!(env.get_typed::<Store>().unwrap().entries.contains_key("agent"));
    }

    #[tokio::test]
    async fn test_failed_dispatch_does_not_block_sibling() {
        let mut b = GraphBuilder::begin_build();
        let root = b.env("Store", "set", set("root")).register().unwrap();
        let bad = b
            .env("Store", "set", args! { "key" => 42, "value" => "v" })
            .after(root)
            .delay(secs(1))
            .register()
            .unwrap();
        let sibling = b.env("Store", "set", set("sibling")).after(root).delay(secs(1)).register().unwrap();
        let downstream = b.env("Store", "set", set("down")).after(bad).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let report = run(&graph, &mut env, RunConfig::default()).await;

        assert_eq!(report.state(bad.id()), Some(EventState::Failed));
        assert_eq!(report.state(sibling.id()), Some(EventState::Executed));
        assert_eq!(report.state(downstream.id()), Some(EventState::Skipped));

        let log = env.log().snapshot();
        assert_eq!(log[1].outcome.failure_kind(), Some(FailureKind::InvalidArgument));
        assert!(env.get_typed::<Store>().unwrap().entries.contains_key("sibling"));
    }

    #[tokio::test]
    async fn test_condition_times_out_exactly_at_deadline() {
        let mut b = GraphBuilder::begin_build();
        let never = Condition::new(|_| false, secs(3), secs(10));
        let cond = b.condition(never).delay(secs(2)).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let report = run(&graph, &mut env, RunConfig::default()).await;

        assert_eq!(report.state(cond.id()), Some(EventState::TimedOut));
        assert_eq!(report.completed_at[cond.id().index()], Some(SimTime::from_secs(12)));
        let log = env.log().snapshot();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].timestamp, SimTime::from_secs(12));
        assert_eq!(log[0].outcome.failure_kind(), Some(FailureKind::Timeout));
        // checks at 2, 5, 8, 11, 12
        assert_eq!(report.steps, 5);
    }

    #[tokio::test]
    async fn test_condition_fires_follow_up_once_satisfied() {
        let mut b = GraphBuilder::begin_build();
        b.env("Store", "set", set("flag")).delay(secs(7)).register().unwrap();
        let cond = Condition::new(
            |env: &Environment| env.get_typed::<Store>().map_or(false, |s| s.entries.contains_key("flag")),
            secs(5),
            secs(60),
        );
        let watcher = b
            .condition(cond)
            .then(crate::event::Action::new("Store", "set", set("seen")))
            .register()
            .unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let report = run(&graph, &mut env, RunConfig::default()).await;

        assert_eq!(report.state(watcher.id()), Some(EventState::Executed));
        assert_eq!(report.completed_at[watcher.id().index()], Some(SimTime::from_secs(10)));
        assert!(env.get_typed::<Store>().unwrap().entries.contains_key("seen"));
    }

    #[tokio::test]
    async fn test_panicking_predicate_fails_condition() {
        let mut b = GraphBuilder::begin_build();
        let cond = Condition::new(|_| panic!("bad predicate"), secs(1), secs(5));
        let id = b.condition(cond).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let report = run(&graph, &mut env, RunConfig::default()).await;
        assert_eq!(report.state(id.id()), Some(EventState::Failed));
        assert_eq!(env.log().snapshot()[0].outcome.failure_kind(), Some(FailureKind::Predicate));
    }

    #[tokio::test]
    async fn test_duration_bounds_the_run() {
        let mut b = GraphBuilder::begin_build();
        b.env("Store", "set", set("edge")).delay(secs(10)).register().unwrap();
        let late = b.env("Store", "set", set("late")).delay(secs(11)).register().unwrap();
        let cond = b.condition(Condition::new(|_| false, secs(4), secs(100))).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let config = RunConfig::default().with_duration(secs(10));
        let report = run(&graph, &mut env, config).await;

        assert_eq!(report.termination, Termination::DurationExceeded);
        assert_eq!(report.state(EventId(0)), Some(EventState::Executed));
        assert_eq!(report.state(late.id()), Some(EventState::Skipped));
        assert_eq!(report.state(cond.id()), Some(EventState::TimedOut));
    }

    #[tokio::test]
    async fn test_unfinished_conditions_time_out_at_termination() {
        let mut b = GraphBuilder::begin_build();
        let never_checked = b.condition(Condition::new(|_| true, secs(1), secs(5))).delay(secs(50)).register().unwrap();
        let bad = b.env("Store", "set", args! { "key" => 1, "value" => "v" }).register().unwrap();
        let blocked = b.condition(Condition::new(|_| true, secs(1), secs(5))).after(bad).register().unwrap();
        let action_after_bad = b.env("Store", "set", set("x")).after(bad).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let config = RunConfig::default().with_duration(secs(10));
        let report = run(&graph, &mut env, config).await;

        assert_eq!(report.termination, Termination::DurationExceeded);
        assert_eq!(report.state(never_checked.id()), Some(EventState::TimedOut));
        assert_eq!(report.state(blocked.id()), Some(EventState::TimedOut));
        assert_eq!(report.state(action_after_bad.id()), Some(EventState::Skipped));
        assert_eq!(report.completed_at[never_checked.id().index()], None);
    }

    #[tokio::test]
    async fn test_step_limit_guard() {
        let mut b = GraphBuilder::begin_build();
        b.condition(Condition::new(|_| false, secs(1), secs(1000))).register().unwrap();
        let graph = b.finalize().unwrap();

        let mut env = store_env();
        let config = RunConfig::default().with_max_steps(4);
        let report = run(&graph, &mut env, config).await;
        assert_eq!(report.termination, Termination::StepLimit);
        assert_eq!(report.steps, 4);
    }

    async fn serialized_log(graph: &EventGraph) -> String {
        let mut env = store_env();
        run(graph, &mut env, RunConfig::default()).await;
        env.log().to_json().unwrap()
    }

    #[tokio::test]
    async fn test_identical_runs_are_byte_identical() {
        let graph = oracle_graph();
        assert_eq!(serialized_log(&graph).await, serialized_log(&graph).await);
    }

    proptest! {
        #[test]
        fn prop_dispatch_order_respects_time_and_dependencies(
            spec in proptest::collection::vec((0u64..20, proptest::option::of(any::<prop::sample::Index>())), 1..25)
        ) {
            let mut b = GraphBuilder::begin_build();
            let mut handles = Vec::new();
            for (i, (delay, dep)) in spec.iter().enumerate() {
                let mut draft = b.env("Store", "set", set(&format!("k{}", i))).delay(secs(*delay));
                if let (Some(ix), false) = (dep, handles.is_empty()) {
                    draft = draft.after(handles[ix.index(handles.len())]);
                }
                handles.push(draft.register().unwrap());
            }
            let graph = b.finalize().unwrap();

            let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            let (first, second) = runtime.block_on(async {
                let mut env = store_env();
                run(&graph, &mut env, RunConfig::default()).await;
                let first = env.log().snapshot();
                let again = serialized_log(&graph).await;
                (first, again)
            });

            prop_assert_eq!(serde_json::to_string(&first).unwrap(), second);
            prop_assert_eq!(first.len(), spec.len());
            let mut seen_at = vec![SimTime::ZERO; spec.len()];
            for pair in first.windows(2) {
                prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            }
            for entry in &first {
                if let Some(id) = entry.event_id {
                    seen_at[id.index()] = entry.timestamp;
                }
            }
            for event in graph.events() {
                for dep in &event.dependencies {
                    prop_assert!(seen_at[event.id.index()] >= seen_at[dep.index()]);
                }
            }
        }
    }
}
