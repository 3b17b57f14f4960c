//! Timed inbox: deliveries pinned to absolute times, and a condition event
//! that waits for the standup to reach the calendar before the user follows up.

use super::{agent_notifications, missing_keywords, Scenario, ScenarioId};
use crate::apps::{AgentUserInterface, CalendarApp, EmailClientApp};
use std::time::Duration;
use tempo_core::{
    Action, BuildError, Condition, Environment, EventType, GraphBuilder, ValidationContext, ValidationError, Verdict,
};
use tempo_env::{args, App, SimTime};

const STANDUP: &str = "Team Standup";
const STANDUP_START: &str = "2026-03-09 10:00:00";
const STANDUP_END: &str = "2026-03-09 10:30:00";

/// Polling period of the calendar watch
const WATCH_INTERVAL: Duration = Duration::from_secs(2);
const WATCH_TIMEOUT: Duration = Duration::from_secs(30);

fn standup_booked(env: &Environment) -> bool {
    env.get_typed::<CalendarApp>()
        .map_or(false, |calendar| calendar.events().any(|e| e.title == STANDUP))
}

pub struct TimedInbox;

impl Scenario for TimedInbox {
    fn id(&self) -> ScenarioId {
        ScenarioId::TimedInbox
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn init_apps(&self) -> Vec<Box<dyn App>> {
        vec![
            Box::new(AgentUserInterface::new()),
            Box::new(EmailClientApp::new()),
            Box::new(CalendarApp::new()),
        ]
    }

    fn build_events(&self, b: &mut GraphBuilder, _env: &Environment) -> Result<(), BuildError> {
        b.user(
            AgentUserInterface::NAME,
            "send_message_to_agent",
            args! { "content" => "Book whatever meetings arrive by email and tell me when they are on the calendar." },
        )
        .label("request")
        .at(SimTime::ZERO)
        .register()?;

        let invite = b
            .env(
                EmailClientApp::NAME,
                "send_email_to_user",
                args! {
                    "email_id" => "timed-inbox-standup",
                    "sender" => "eng-manager@lumenicorp.com",
                    "subject" => "Weekly standup",
                    "content" => "Please add the team standup on Monday, March 9th, 10:00 to 10:30 UTC.",
                },
            )
            .label("invite")
            .at(SimTime::from_secs(3))
            .register()?;

        let booked = b
            .agent(
                CalendarApp::NAME,
                "add_calendar_event",
                args! {
                    "title" => STANDUP,
                    "start_datetime" => STANDUP_START,
                    "end_datetime" => STANDUP_END,
                    "attendees" => ["engineering team"],
                },
            )
            .oracle()
            .after(invite)
            .delay(Duration::from_secs(5))
            .register()?;

        b.agent(
            AgentUserInterface::NAME,
            "send_message_to_user",
            args! { "content" => "Team standup booked for Monday, March 9 at 10:00 UTC." },
        )
        .oracle()
        .after(booked)
        .delay(Duration::from_secs(2))
        .register()?;

        b.condition(Condition::new(standup_booked, WATCH_INTERVAL, WATCH_TIMEOUT))
            .label("standup-watch")
            .after_label("request")
            .then(Action::new(
                AgentUserInterface::NAME,
                "send_message_to_agent",
                args! { "content" => "Thanks, I see the standup. Please keep Monday mornings free of other meetings." },
            ))
            .register()?;

        // a late reminder pinned well after everything else
        b.env(
            EmailClientApp::NAME,
            "send_email_to_user",
            args! {
                "email_id" => "timed-inbox-agenda",
                "sender" => "eng-manager@lumenicorp.com",
                "subject" => "Standup agenda",
                "content" => "Agenda attached for Monday.",
            },
        )
        .at(SimTime::from_secs(60))
        .register()?;

        Ok(())
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        let state = ctx.app_state(CalendarApp::NAME)?;
        let booked = state
            .get("events")
            .and_then(|events| events.as_object())
            .map_or(false, |events| {
                events.values().any(|e| {
                    e["title"] == STANDUP && e["start_datetime"] == STANDUP_START && e["end_datetime"] == STANDUP_END
                })
            });

        let mut issues = Vec::new();
        if !booked {
            issues.push(format!("Missing or incorrect calendar entry for '{}'.", STANDUP));
        }
        let watched = ctx
            .entries_of(EventType::Condition)
            .any(|entry| entry.outcome.is_success());
        if !watched {
            issues.push("The standup never appeared while the user was watching.".to_string());
        }
        if let Some(issue) = missing_keywords(&agent_notifications(ctx), &["standup", "monday"]) {
            issues.push(issue);
        }

        if issues.is_empty() {
            Ok(Verdict::pass("Standup booked and confirmed in time."))
        } else {
            Ok(Verdict::fail(issues.join(" ")))
        }
    }
}
