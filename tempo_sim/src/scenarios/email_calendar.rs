//! Email/calendar series: three scheduling requests arrive one after the
//! other. Each is expected to become a calendar entry followed by a short
//! notification to the user.

use super::{agent_notifications, missing_keywords, Scenario, ScenarioId};
use crate::apps::{AgentUserInterface, CalendarApp, CalendarEvent, Email, EmailClientApp};
use std::time::Duration;
use tempo_core::{BuildError, Environment, GraphBuilder, ValidationContext, ValidationError, Verdict};
use tempo_env::{args, App};

/// One scheduling request and what handling it looks like.
struct Request {
    email_id: &'static str,
    sender: &'static str,
    subject: &'static str,
    content: &'static str,
    title: &'static str,
    start: &'static str,
    end: &'static str,
    tag: &'static str,
    description: &'static str,
    location: &'static str,
    attendees: &'static [&'static str],
    notification: &'static str,
    keywords: &'static [&'static str],
}

const REQUESTS: [Request; 3] = [
    Request {
        email_id: "email-calendar-series-budget-review",
        sender: "finance-ops@lumenicorp.com",
        subject: "Budget Review with Finance Leadership",
        content: "Please schedule a budget review on Tuesday, March 4th at 15:00 UTC for one hour. \
                  Invite Dana Chao and flag it with the 'Finance' tag so I remember to prepare numbers.",
        title: "Budget Review with Finance Leadership",
        start: "2025-03-04 15:00:00",
        end: "2025-03-04 16:00:00",
        tag: "Finance",
        description: "Quarterly budget review requested by finance operations.",
        location: "Conference Room 3A",
        attendees: &["Dana Chao"],
        notification: "Budget review scheduled for March 4 at 15:00 UTC.",
        keywords: &["budget review", "march 4", "15:00"],
    },
    Request {
        email_id: "email-calendar-series-engineering-sync",
        sender: "platform-leads@lumenicorp.com",
        subject: "Urgent Platform Stability Sync",
        content: "We need a platform stability sync on Wednesday, March 5th at 09:30 UTC. \
                  Book 45 minutes, tag it as 'Engineering', and include the platform leads DL.",
        title: "Platform Stability Sync",
        start: "2025-03-05 09:30:00",
        end: "2025-03-05 10:15:00",
        tag: "Engineering",
        description: "Platform stability status review with engineering leads.",
        location: "Zoom",
        attendees: &["platform-leads@lumenicorp.com"],
        notification: "Platform stability sync is on the calendar for March 5 at 09:30 UTC.",
        keywords: &["stability sync", "march 5", "09:30"],
    },
    Request {
        email_id: "email-calendar-series-product-handoff",
        sender: "product@lumenicorp.com",
        subject: "Product Roadmap Handoff",
        content: "Can you block a product roadmap handoff working session for Thursday, March 6th starting at 13:00 UTC? \
                  Make it a two-hour working session, add the product managers, and tag with 'Product'.",
        title: "Product Roadmap Handoff Working Session",
        start: "2025-03-06 13:00:00",
        end: "2025-03-06 15:00:00",
        tag: "Product",
        description: "Working session to hand off roadmap priorities to delivery teams.",
        location: "Hybrid - Teams Bridge",
        attendees: &["product@lumenicorp.com"],
        notification: "Scheduled the product roadmap handoff on March 6 at 13:00 UTC.",
        keywords: &["roadmap handoff", "march 6", "13:00"],
    },
];

impl Request {
    fn matches(&self, event: &CalendarEvent) -> bool {
        let mut attendees: Vec<&str> = event.attendees.iter().map(String::as_str).collect();
        attendees.sort_unstable();
        attendees.dedup();
        let mut expected = self.attendees.to_vec();
        expected.sort_unstable();

        event.title == self.title
            && event.start_datetime == self.start
            && event.end_datetime == self.end
            && event.tag.as_deref() == Some(self.tag)
            && event.location.as_deref() == Some(self.location)
            && attendees == expected
    }
}

pub struct EmailCalendarSeries;

impl Scenario for EmailCalendarSeries {
    fn id(&self) -> ScenarioId {
        ScenarioId::EmailCalendarSeries
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(1800)
    }

    fn init_apps(&self) -> Vec<Box<dyn App>> {
        let mut email = EmailClientApp::new();
        email.add_email(Email::to_user(
            "email-calendar-series-headsup",
            "chief-of-staff@lumenicorp.com",
            "Heads-up on incoming scheduling requests",
            "Expect several teams to email in the next hour with scheduling needs. \
             Please handle each request and keep me updated.",
        ));
        vec![
            Box::new(AgentUserInterface::new()),
            Box::new(email),
            Box::new(CalendarApp::new()),
        ]
    }

    fn build_events(&self, b: &mut GraphBuilder, _env: &Environment) -> Result<(), BuildError> {
        let kickoff = b
            .user(
                AgentUserInterface::NAME,
                "send_message_to_agent",
                args! {
                    "content" => "Morning! Please watch for scheduling emails and keep the calendar organized. \
                                  Let me know once each request is handled."
                },
            )
            .label("kickoff")
            .delay(Duration::from_secs(10))
            .register()?;

        // each email is anchored on the previous delivery, not on the agent's work
        let mut anchor = kickoff;
        for (index, request) in REQUESTS.iter().enumerate() {
            let gap = if index == 0 { 30 } else { 60 };
            let delivered = b
                .env(
                    EmailClientApp::NAME,
                    "send_email_to_user",
                    args! {
                        "email_id" => request.email_id,
                        "sender" => request.sender,
                        "subject" => request.subject,
                        "content" => request.content,
                    },
                )
                .label(request.email_id)
                .after(anchor)
                .delay(Duration::from_secs(gap))
                .register()?;

            let scheduled = b
                .agent(
                    CalendarApp::NAME,
                    "add_calendar_event",
                    args! {
                        "title" => request.title,
                        "start_datetime" => request.start,
                        "end_datetime" => request.end,
                        "tag" => request.tag,
                        "description" => request.description,
                        "location" => request.location,
                        "attendees" => request.attendees.to_vec(),
                    },
                )
                .oracle()
                .after(delivered)
                .delay(Duration::from_secs(20))
                .register()?;

            b.agent(
                AgentUserInterface::NAME,
                "send_message_to_user",
                args! { "content" => request.notification },
            )
            .oracle()
            .after(scheduled)
            .delay(Duration::from_secs(15))
            .register()?;

            anchor = delivered;
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

        let mut issues = Vec::new();
        for request in &REQUESTS {
            if !calendar.iter().any(|event| request.matches(event)) {
                issues.push(format!("Missing or incorrect calendar entry for '{}'.", request.title));
            }
        }

        let notifications = agent_notifications(ctx);
        issues.extend(
            REQUESTS
                .iter()
                .filter_map(|request| missing_keywords(&notifications, request.keywords)),
        );

        if issues.is_empty() {
            Ok(Verdict::pass("All scheduling requests handled correctly."))
        } else {
            Ok(Verdict::fail(issues.join(" ")))
        }
    }
}
