//! Email calendar manager: five meeting emails arrive over a few seconds
//! and the agent books each one.
//!
//! The first email fans out: the user's request and the second email both
//! hang off it with different delays, so two branches run side by side.
//! Every later email is anchored on the one before it.

use super::{Scenario, ScenarioId};
use crate::apps::{AgentUserInterface, CalendarApp, CalendarEvent, EmailClientApp};
use std::time::Duration;
use tempo_core::{
    ActionKey, BuildError, EventHandle, Environment, GraphBuilder, ValidationContext, ValidationError, Verdict,
};
use tempo_env::{args, App};

struct Meeting {
    email_id: &'static str,
    sender: &'static str,
    subject: &'static str,
    content: &'static str,
    title: &'static str,
    start: &'static str,
    end: &'static str,
    description: &'static str,
    location: Option<&'static str>,
    attendees: &'static [&'static str],
    /// Delay of the email after the previous delivery
    gap: u64,
}

const MEETINGS: [Meeting; 5] = [
    Meeting {
        email_id: "email_team_meeting",
        sender: "alice.chen@company.com",
        subject: "Q4 Planning Team Meeting",
        content: "Hi there! Let's schedule a team meeting this Monday at 2 PM for 1 hour to discuss Q4 planning. \
                  I'll need you, Carol, and David to attend. We'll meet in Conference Room B.",
        title: "Q4 Planning Team Meeting",
        start: "2024-12-09 14:00:00",
        end: "2024-12-09 15:00:00",
        description: "Team meeting to discuss Q4 planning",
        location: Some("Conference Room B"),
        attendees: &["Alice Chen", "Carol Stevens", "David Kim"],
        gap: 2,
    },
    Meeting {
        email_id: "email_client_call",
        sender: "bob.martinez@clientcorp.com",
        subject: "Project Sync Call",
        content: "Hello! Can we set up a client call this Wednesday? I'm available between 10 AM and 12 PM. \
                  About 30 minutes should be sufficient to go over the project updates.",
        title: "Project Sync Call with Bob Martinez",
        start: "2024-12-11 10:00:00",
        end: "2024-12-11 10:30:00",
        description: "Client call to discuss project updates",
        location: None,
        attendees: &["Bob Martinez"],
        gap: 5,
    },
    Meeting {
        email_id: "email_standup",
        sender: "alice.chen@company.com",
        subject: "Weekly Standup Reminder",
        content: "Quick reminder: our weekly standup meetings start this coming Tuesday at 9 AM. \
                  They'll run for 1 hour every Tuesday. The whole team should attend.",
        title: "Weekly Team Standup",
        start: "2024-12-10 09:00:00",
        end: "2024-12-10 10:00:00",
        description: "Weekly standup meeting",
        location: None,
        attendees: &["Alice Chen", "Carol Stevens", "David Kim", "Emma Wilson"],
        gap: 3,
    },
    Meeting {
        email_id: "email_room_booking",
        sender: "facilities@company.com",
        subject: "Conference Room Alpha - Booking Confirmed",
        content: "Your booking for Conference Room Alpha has been confirmed for this Thursday from 3 PM to 5 PM \
                  for your product presentation. Room capacity: 50 people.",
        title: "Product Presentation",
        start: "2024-12-12 15:00:00",
        end: "2024-12-12 17:00:00",
        description: "Product presentation",
        location: Some("Conference Room Alpha"),
        attendees: &[],
        gap: 3,
    },
    Meeting {
        email_id: "email_reschedule",
        sender: "david.kim@company.com",
        subject: "Need to Reschedule Friday Meeting",
        content: "Hey, I need to reschedule our 1-on-1 meeting scheduled for Friday at 2 PM. \
                  Can we move it to next Friday at the same time? It should still be about 1 hour. Thanks!",
        title: "1-on-1 with David Kim",
        start: "2024-12-20 14:00:00",
        end: "2024-12-20 15:00:00",
        description: "Rescheduled 1-on-1 meeting",
        location: None,
        attendees: &["David Kim"],
        gap: 3,
    },
];

const TITLE_KEYWORDS: [&str; 5] = ["meeting", "call", "standup", "presentation", "1-on-1"];

pub struct EmailCalendarManager;

impl EmailCalendarManager {
    /// Books `meeting` 5s after `trigger`, then tells the user.
    fn book(b: &mut GraphBuilder, meeting: &Meeting, trigger: EventHandle) -> Result<(), BuildError> {
        let mut event = args! {
            "title" => meeting.title,
            "start_datetime" => meeting.start,
            "end_datetime" => meeting.end,
            "description" => meeting.description,
        };
        if let Some(location) = meeting.location {
            event.insert("location".to_string(), location.into());
        }
        if !meeting.attendees.is_empty() {
            event.insert("attendees".to_string(), meeting.attendees.to_vec().into());
        }

        let booked = b
            .agent(CalendarApp::NAME, "add_calendar_event", event)
            .oracle()
            .after(trigger)
            .delay(Duration::from_secs(5))
            .register()?;
        b.agent(
            AgentUserInterface::NAME,
            "send_message_to_user",
            args! { "content" => format!("Added '{}' on {}.", meeting.title, meeting.start) },
        )
        .oracle()
        .after(booked)
        .delay(Duration::from_secs(2))
        .register()?;
        Ok(())
    }
}

impl Scenario for EmailCalendarManager {
    fn id(&self) -> ScenarioId {
        ScenarioId::EmailCalendarManager
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(600)
    }

    fn init_apps(&self) -> Vec<Box<dyn App>> {
        vec![
            Box::new(AgentUserInterface::new()),
            Box::new(EmailClientApp::new()),
            Box::new(CalendarApp::new()),
        ]
    }

    fn build_events(&self, b: &mut GraphBuilder, _env: &Environment) -> Result<(), BuildError> {
        let mut previous: Option<EventHandle> = None;
        for (index, meeting) in MEETINGS.iter().enumerate() {
            let mut draft = b
                .env(
                    EmailClientApp::NAME,
                    "send_email_to_user",
                    args! {
                        "email_id" => meeting.email_id,
                        "sender" => meeting.sender,
                        "subject" => meeting.subject,
                        "content" => meeting.content,
                    },
                )
                .label(meeting.email_id)
                .delay(Duration::from_secs(meeting.gap));
            if let Some(previous) = previous {
                draft = draft.after(previous);
            }
            let delivered = draft.register()?;

            if index == 0 {
                // the first booking waits for the user's go-ahead
                let ask = b
                    .user(
                        AgentUserInterface::NAME,
                        "send_message_to_agent",
                        args! {
                            "content" => "Hi! I just got some meeting requests in my email. Please check my inbox \
                                          and create calendar events for all the meetings mentioned, with attendees, \
                                          times and locations."
                        },
                    )
                    .label("request")
                    .after(delivered)
                    .delay(Duration::from_secs(3))
                    .register()?;
                Self::book(b, meeting, ask)?;
            } else {
                Self::book(b, meeting, delivered)?;
            }
            previous = Some(delivered);
        }
        Ok(())
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        let calendar: Vec<CalendarEvent> = ctx
            .app_state_as::<serde_json::Value>(CalendarApp::NAME)?
            .get("events")
            .and_then(|events| events.as_object())
            .ok_or_else(|| ValidationError::StateShape("CalendarApp has no events map".to_string()))?
            .values()
            .map(|event| serde_json::from_value(event.clone()))
            .collect::<Result<_, _>>()?;

        if calendar.len() < 3 {
            return Ok(Verdict::fail(format!(
                "Only {} calendar events created, expected at least 3",
                calendar.len()
            )));
        }

        let add_event = ActionKey::new(CalendarApp::NAME, "add_calendar_event");
        let booked = ctx.agent_actions_for(&add_event).len();
        if booked < 3 {
            return Ok(Verdict::fail(format!(
                "Agent only called add_calendar_event {} times, expected at least 3",
                booked
            )));
        }

        let titled = calendar.iter().any(|event| {
            let title = event.title.to_lowercase();
            TITLE_KEYWORDS.iter().any(|k| title.contains(k))
        });
        if !titled {
            return Ok(Verdict::fail("Calendar events don't contain expected meeting-related titles"));
        }

        if calendar.iter().filter(|event| !event.attendees.is_empty()).count() < 2 {
            return Ok(Verdict::fail("Not enough calendar events include attendees"));
        }

        let reads = ctx
            .agent_actions()
            .filter_map(|entry| entry.action.as_ref())
            .filter(|action| {
                action.app.as_str() == EmailClientApp::NAME
                    && matches!(action.operation.as_str(), "list_emails" | "get_email_by_id")
            })
            .count();

        Ok(Verdict::pass(format!(
            "Successfully created {} calendar events with appropriate details from {} email interactions",
            calendar.len(),
            reads
        )))
    }
}
