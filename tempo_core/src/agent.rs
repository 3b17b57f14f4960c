//! Agent driver seam for live runs.
//!
//! In live mode the scheduler never dispatches `Agent` graph events itself.
//! Instead it hands an [`Observation`] of the new log entries to an
//! [`AgentDriver`] and queues whatever [`AgentDecision`]s come back at
//! `now + think_time`. Decisions that arrive between steps are picked up
//! through [`AgentDriver::poll`] and [`AgentDriver::flush`].

use crate::event::Action;
use crate::log::LogEntry;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tempo_env::SimTime;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What the agent sees at a step.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Simulated time of the step
    pub now: SimTime,

    /// Log entries appended since the previous observation
    pub entries: Vec<LogEntry>,

    /// Total log length at the step
    pub log_len: usize,
}

/// An action chosen by the agent, applied after a simulated think time.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDecision {
    pub action: Action,
    pub think_time: Duration,
}

impl AgentDecision {
    pub fn new(action: Action, think_time: Duration) -> Self {
        Self { action, think_time }
    }

    /// A decision applied without any delay.
    pub fn immediate(action: Action) -> Self {
        Self::new(action, Duration::ZERO)
    }
}

/// Decision-making agent exercised by a live run.
#[async_trait]
pub trait AgentDriver: Send {
    /// Observes new log entries and returns zero or more decisions.
    async fn step(&mut self, observation: Observation) -> Vec<AgentDecision>;

    /// Decisions that arrived since the last call, without waiting.
    ///
    /// Called before every queue pop. Think times are relative to `now`.
    fn poll(&mut self, _now: SimTime) -> Vec<AgentDecision> {
        Vec::new()
    }

    /// Waits for replies still owed for earlier observations.
    ///
    /// Called when the queue is empty; returning nothing ends the run.
    async fn flush(&mut self, _now: SimTime) -> Vec<AgentDecision> {
        Vec::new()
    }
}

/// Forwards observations to an agent running elsewhere over tokio channels.
///
/// Each observation expects exactly one reply (possibly empty), tagged with
/// the observation's sequence number. A step waits at most the decision
/// window for its own reply. Replies that miss the window are not lost: they
/// are returned by a later `step`, `poll` or `flush`, anchored at the time
/// of the observation they answer (or the current time, if that is later).
pub struct ChannelAgent {
    observations: mpsc::Sender<(u64, Observation)>,
    decisions: mpsc::Receiver<(u64, Vec<AgentDecision>)>,

    /// Wall-clock time granted to the external agent per step
    decision_window: Duration,

    /// Wall-clock time granted per outstanding reply once the queue is empty
    drain_timeout: Duration,

    next_seq: u64,

    /// Observation time of each unanswered observation
    outstanding: BTreeMap<u64, SimTime>,
}

/// The external agent's side of a [`ChannelAgent`].
pub struct AgentEndpoint {
    observations: mpsc::Receiver<(u64, Observation)>,
    decisions: mpsc::Sender<(u64, Vec<AgentDecision>)>,

    /// Sequence number of the latest observation received
    current: u64,
}

impl ChannelAgent {
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a connected driver/endpoint pair.
    pub fn pair(decision_window: Duration) -> (ChannelAgent, AgentEndpoint) {
        let (obs_tx, obs_rx) = mpsc::channel(16);
        let (dec_tx, dec_rx) = mpsc::channel(16);
        (
            ChannelAgent {
                observations: obs_tx,
                decisions: dec_rx,
                decision_window,
                drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
                next_seq: 0,
                outstanding: BTreeMap::new(),
            },
            AgentEndpoint {
                observations: obs_rx,
                decisions: dec_tx,
                current: 0,
            },
        )
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Observations sent but not yet answered.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Re-bases a reply's think times onto `now`.
    fn accept(&mut self, seq: u64, decisions: Vec<AgentDecision>, now: SimTime) -> Vec<AgentDecision> {
        let observed_at = self.outstanding.remove(&seq).unwrap_or(now);
        if observed_at < now && !decisions.is_empty() {
            debug!("Late agent reply to observation {} (observed {}, now {})", seq, observed_at, now);
        }
        decisions
            .into_iter()
            .map(|decision| {
                let due = observed_at.saturating_add(decision.think_time);
                AgentDecision::new(decision.action, due.saturating_since(now))
            })
            .collect()
    }
}

#[async_trait]
impl AgentDriver for ChannelAgent {
    async fn step(&mut self, observation: Observation) -> Vec<AgentDecision> {
        let now = observation.now;
        let mut ready = self.poll(now);

        let seq = self.next_seq;
        self.next_seq += 1;
        if self.observations.send((seq, observation)).await.is_err() {
            debug!("Agent endpoint closed at {}", now);
            return ready;
        }
        self.outstanding.insert(seq, now);

        let mut replies = Vec::new();
        let receiver = &mut self.decisions;
        let answered = tokio::time::timeout(self.decision_window, async {
            while let Some((reply_seq, decisions)) = receiver.recv().await {
                replies.push((reply_seq, decisions));
                if reply_seq == seq {
                    return true;
                }
            }
            false
        })
        .await;

        if answered.is_err() {
            debug!("No agent decision within {:?} at {}", self.decision_window, now);
        }
        for (reply_seq, decisions) in replies {
            ready.extend(self.accept(reply_seq, decisions, now));
        }
        ready
    }

    fn poll(&mut self, now: SimTime) -> Vec<AgentDecision> {
        let mut ready = Vec::new();
        while let Ok((seq, decisions)) = self.decisions.try_recv() {
            ready.extend(self.accept(seq, decisions, now));
        }
        ready
    }

    async fn flush(&mut self, now: SimTime) -> Vec<AgentDecision> {
        let mut ready = self.poll(now);
        while ready.is_empty() && !self.outstanding.is_empty() {
            match tokio::time::timeout(self.drain_timeout, self.decisions.recv()).await {
                Ok(Some((seq, decisions))) => ready.extend(self.accept(seq, decisions, now)),
                Ok(None) => self.outstanding.clear(),
                Err(_) => {
                    warn!(
                        "Agent left {} observations unanswered after {:?}",
                        self.outstanding.len(),
                        self.drain_timeout
                    );
                    self.outstanding.clear();
                }
            }
        }
        ready
    }
}

impl AgentEndpoint {
    /// Waits for the next observation; `None` once the run is over.
    pub async fn next_observation(&mut self) -> Option<Observation> {
        let (seq, observation) = self.observations.recv().await?;
        self.current = seq;
        Some(observation)
    }

    /// Replies to the latest observation. Returns false if the run is over.
    pub async fn respond(&self, decisions: Vec<AgentDecision>) -> bool {
        self.decisions.send((self.current, decisions)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_env::args;

    fn observation(secs: u64) -> Observation {
        Observation {
            now: SimTime::from_secs(secs),
            entries: Vec::new(),
            log_len: 0,
        }
    }

    #[tokio::test]
    async fn test_channel_agent_round_trip() {
        let (mut driver, mut endpoint) = ChannelAgent::pair(Duration::from_secs(5));

        let agent = tokio::spawn(async move {
            while let Some(obs) = endpoint.next_observation().await {
                let action = Action::new("KVStore", "get_all", args! {});
                let reply = vec![AgentDecision::new(action, Duration::from_millis(obs.now.as_millis()))];
                if !endpoint.respond(reply).await {
                    break;
                }
            }
        });

        let decisions = driver.step(observation(2)).await;
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].think_time, Duration::from_secs(2));

        drop(driver);
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_agent_window_expires() {
        let (mut driver, _endpoint) = ChannelAgent::pair(Duration::from_millis(10));
        assert!(driver.step(observation(1)).await.is_empty());
    }

    /// Endpoint that answers every observation with one `get_all`, `delay` late.
    fn slow_endpoint(mut endpoint: AgentEndpoint, delay: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while endpoint.next_observation().await.is_some() {
                tokio::time::sleep(delay).await;
                let action = Action::new("KVStore", "get_all", args! {});
                if !endpoint.respond(vec![AgentDecision::new(action, Duration::from_secs(3))]).await {
                    break;
                }
            }
        })
    }

    #[tokio::test]
    async fn test_channel_agent_flush_keeps_late_reply() {
        let (driver, endpoint) = ChannelAgent::pair(Duration::from_millis(10));
        let mut driver = driver.with_drain_timeout(Duration::from_secs(2));
        let agent = slow_endpoint(endpoint, Duration::from_millis(50));

        assert!(driver.step(observation(2)).await.is_empty());
        assert_eq!(driver.outstanding(), 1);

        // observed at 2s with 3s think time, so due 1s after 4s
        let late = driver.flush(SimTime::from_secs(4)).await;
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].think_time, Duration::from_secs(1));
        assert_eq!(driver.outstanding(), 0);

        drop(driver);
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_agent_poll_picks_up_late_reply() {
        let (mut driver, endpoint) = ChannelAgent::pair(Duration::from_millis(10));
        let agent = slow_endpoint(endpoint, Duration::from_millis(30));

        assert!(driver.step(observation(2)).await.is_empty());
        tokio::time::sleep(Duration::from_millis(150)).await;

        // already past the due time: no extra wait
        let late = driver.poll(SimTime::from_secs(10));
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].think_time, Duration::ZERO);
        assert!(driver.poll(SimTime::from_secs(10)).is_empty());

        drop(driver);
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_agent_flush_gives_up_on_silent_agent() {
        let (driver, _endpoint) = ChannelAgent::pair(Duration::from_millis(10));
        let mut driver = driver.with_drain_timeout(Duration::from_millis(20));
        assert!(driver.step(observation(1)).await.is_empty());
        assert!(driver.flush(SimTime::from_secs(1)).await.is_empty());
        assert_eq!(driver.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_channel_agent_closed_endpoint() {
        let (mut driver, endpoint) = ChannelAgent::pair(Duration::from_secs(1));
        drop(endpoint);
        assert!(driver.step(observation(1)).await.is_empty());
    }
}
