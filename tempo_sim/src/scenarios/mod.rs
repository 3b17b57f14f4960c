//! Built-in scenarios.
//!
//! A scenario supplies the initial applications, declares the event graph
//! and grades the finished run.

mod commitment_tracking;
mod email_calendar;
mod email_calendar_manager;
mod fault_isolation;
mod kv_demo;
mod timed_inbox;

pub use commitment_tracking::CommitmentTracking;
pub use email_calendar::EmailCalendarSeries;
pub use email_calendar_manager::EmailCalendarManager;
pub use fault_isolation::FaultIsolation;
pub use kv_demo::KvDemo;
pub use timed_inbox::TimedInbox;

use std::time::Duration;
use tempo_core::{BuildError, Environment, GraphBuilder, ValidationContext, ValidationError, Verdict};
use tempo_env::{App, SimTime};

/// The scenario collaborator contract.
pub trait Scenario: Send + Sync {
    fn id(&self) -> ScenarioId;

    /// Simulated time at which the run starts
    fn start_time(&self) -> SimTime {
        SimTime::ZERO
    }

    /// Scenario time budget
    fn duration(&self) -> Duration;

    /// Fresh, populated applications in registration order.
    fn init_apps(&self) -> Vec<Box<dyn App>>;

    /// Declares the event graph. `env` holds the freshly initialized applications.
    fn build_events(&self, builder: &mut GraphBuilder, env: &Environment) -> Result<(), BuildError>;

    /// Grades a finished run.
    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError>;
}

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Rename a key in the key-value store, then verify it
    KvDemo,

    /// Three scheduling emails, each turned into a calendar entry and a notification
    EmailCalendarSeries,

    /// Deliveries at absolute times watched by a condition event
    TimedInbox,

    /// Failing dispatches next to independent siblings
    FaultIsolation,

    /// Five meeting emails, fanning out from the first, each booked on the calendar
    EmailCalendarManager,

    /// Multi-turn reminders and meetings that get created, moved and cancelled
    CommitmentTracking,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::KvDemo,
            ScenarioId::EmailCalendarSeries,
            ScenarioId::TimedInbox,
            ScenarioId::FaultIsolation,
            ScenarioId::EmailCalendarManager,
            ScenarioId::CommitmentTracking,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::KvDemo => "kv_demo",
            ScenarioId::EmailCalendarSeries => "email_calendar_series",
            ScenarioId::TimedInbox => "timed_inbox",
            ScenarioId::FaultIsolation => "fault_isolation",
            ScenarioId::EmailCalendarManager => "email_calendar_manager",
            ScenarioId::CommitmentTracking => "commitment_tracking",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::KvDemo => "Agent renames the user in KVStore and verifies the change",
            ScenarioId::EmailCalendarSeries => "Sequential scheduling emails coordinated into calendar entries",
            ScenarioId::TimedInbox => "Absolute-time deliveries and a condition watching the calendar",
            ScenarioId::FaultIsolation => "Invalid and unknown actions fail without blocking siblings",
            ScenarioId::EmailCalendarManager => "Meeting requests arriving by email turned into calendar events",
            ScenarioId::CommitmentTracking => "Commitments tracked across turns, with updates and cancellations",
        }
    }

    /// Instantiates the scenario.
    pub fn scenario(&self) -> Box<dyn Scenario> {
        match self {
            ScenarioId::KvDemo => Box::new(KvDemo),
            ScenarioId::EmailCalendarSeries => Box::new(EmailCalendarSeries),
            ScenarioId::TimedInbox => Box::new(TimedInbox),
            ScenarioId::FaultIsolation => Box::new(FaultIsolation),
            ScenarioId::EmailCalendarManager => Box::new(EmailCalendarManager),
            ScenarioId::CommitmentTracking => Box::new(CommitmentTracking),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kv_demo" | "kvdemo" | "scenario_kv_demo" => Ok(ScenarioId::KvDemo),
            "email_calendar_series" | "email_calendar" => Ok(ScenarioId::EmailCalendarSeries),
            "timed_inbox" | "timedinbox" => Ok(ScenarioId::TimedInbox),
            "fault_isolation" | "faults" => Ok(ScenarioId::FaultIsolation),
            "email_calendar_manager" | "calendar_manager" => Ok(ScenarioId::EmailCalendarManager),
            "commitment_tracking" | "commitments" => Ok(ScenarioId::CommitmentTracking),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

/// Lower-cased `content` of every successful agent message to the user.
pub(crate) fn agent_notifications(ctx: &ValidationContext<'_>) -> Vec<String> {
    ctx.agent_actions()
        .filter_map(|entry| entry.action.as_ref())
        .filter(|action| {
            action.app.as_str() == crate::apps::AgentUserInterface::NAME
                && action.operation.as_str() == "send_message_to_user"
        })
        .filter_map(|action| action.args.get("content").and_then(|c| c.as_str()))
        .map(str::to_lowercase)
        .collect()
}

/// Issue text if no notification contains every keyword.
pub(crate) fn missing_keywords(notifications: &[String], keywords: &[&str]) -> Option<String> {
    let found = notifications
        .iter()
        .any(|note| keywords.iter().all(|k| note.contains(&k.to_lowercase())));
    if found {
        None
    } else {
        let listed: Vec<String> = keywords.iter().map(|k| format!("'{}'", k)).collect();
        Some(format!("User notification missing key details: {}.", listed.join(", ")))
    }
}
