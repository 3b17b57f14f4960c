//! Commitment tracking: eight conversational turns in which the user (and
//! two emails) create, move and cancel commitments.
//!
//! Each turn is anchored on the previous one as an environment event, so
//! the conversation advances on its own clock whatever the agent does. The
//! run is graded with partial credit over seven checks.

use super::{agent_notifications, Scenario, ScenarioId};
use crate::apps::{AgentUserInterface, CalendarApp, CalendarEvent, Email, EmailClientApp, Reminder, ReminderApp};
use std::time::Duration;
use tempo_core::{
    Action, ActionKey, BuildError, Environment, EventHandle, EventType, GraphBuilder, ValidationContext,
    ValidationError, Verdict,
};
use tempo_env::{args, App};
use tracing::debug;

/// What starts a turn.
enum Prompt {
    User(&'static str),
    Email {
        sender: &'static str,
        subject: &'static str,
        content: &'static str,
    },
}

/// What the agent is expected to do about a turn.
enum Commitment {
    Remind {
        title: &'static str,
        due: &'static str,
        description: &'static str,
    },
    Schedule {
        title: &'static str,
        start: &'static str,
        end: &'static str,
    },
    MoveReminder {
        reminder_id: &'static str,
        due: &'static str,
    },
    Acknowledge,
    Reschedule {
        event_id: &'static str,
        title: &'static str,
        start: &'static str,
        end: &'static str,
    },
    Cancel {
        event_id: &'static str,
    },
    Summarize,
}

struct Turn {
    /// Seconds after the previous turn
    delay: u64,
    prompt: Prompt,
    commitment: Commitment,
    /// Last message the agent sends for this turn
    reply: &'static str,
}

const TEAM: &str = "engineering team";

const TURNS: [Turn; 8] = [
    Turn {
        delay: 10,
        prompt: Prompt::User(
            "Hey! Can you help me track some commitments this week? First, I promised Sarah I'd send her \
             the Q1 budget analysis by end of day Friday. Can you make sure I don't forget?",
        ),
        commitment: Commitment::Remind {
            title: "Send Q1 budget analysis to Sarah",
            due: "2026-03-06 23:59:00",
            description: "budget analysis Sarah",
        },
        reply: "Set a reminder to send the budget analysis to Sarah by Friday end of day.",
    },
    Turn {
        delay: 45,
        prompt: Prompt::User(
            "Also, I need to schedule a team standup for Monday at 10am UTC. It should be 30 minutes. \
             Add the whole engineering team.",
        ),
        commitment: Commitment::Schedule {
            title: "Team Standup",
            start: "2026-03-09 10:00:00",
            end: "2026-03-09 10:30:00",
        },
        reply: "Team standup scheduled for Monday 10:00 UTC with the engineering team.",
    },
    Turn {
        delay: 60,
        prompt: Prompt::User(
            "Oh, and I'll try to review the design docs over the weekend if I get a chance. \
             Nothing urgent, but would be good to have a note about it.",
        ),
        commitment: Commitment::Remind {
            title: "Review design docs",
            due: "2026-03-08 17:00:00",
            description: "design docs review",
        },
        reply: "Noted: review the design docs over the weekend.",
    },
    Turn {
        delay: 50,
        prompt: Prompt::Email {
            sender: "sarah@company.com",
            subject: "Budget Analysis Timeline Change",
            content: "Hi! Actually, can you send the budget analysis by Thursday afternoon instead? \
                      We moved up the board meeting. Thanks!",
        },
        commitment: Commitment::MoveReminder {
            reminder_id: "rem-0001",
            due: "2026-03-05 17:00:00",
        },
        reply: "Sarah moved the budget analysis to Thursday afternoon; reminder updated.",
    },
    Turn {
        delay: 55,
        prompt: Prompt::User("Just saw Sarah's email about moving the deadline. Can you update that commitment?"),
        commitment: Commitment::Acknowledge,
        reply: "Already updated: the budget analysis is now due Thursday at 17:00.",
    },
    Turn {
        delay: 60,
        prompt: Prompt::User(
            "Actually, the team standup on Monday needs to be pushed to 2pm UTC instead. \
             10am won't work for the west coast folks.",
        ),
        commitment: Commitment::Reschedule {
            event_id: "cal-0001",
            title: "Team Standup",
            start: "2026-03-09 14:00:00",
            end: "2026-03-09 14:30:00",
        },
        reply: "The standup is rescheduled to Monday 2pm UTC.",
    },
    Turn {
        delay: 45,
        prompt: Prompt::Email {
            sender: "manager@company.com",
            subject: "Skip This Week's Standup",
            content: "Team - let's cancel Monday's standup. We're all heads-down on the release. \
                      We'll resume next week.",
        },
        commitment: Commitment::Cancel { event_id: "cal-0002" },
        reply: "Monday's standup is cancelled per your manager's email.",
    },
    Turn {
        delay: 50,
        prompt: Prompt::User(
            "Can you give me a summary of all my current commitments? I want to make sure I'm not missing anything.",
        ),
        commitment: Commitment::Summarize,
        reply: "Summary of your current commitments: send the Q1 budget analysis to Sarah by Thursday 17:00, \
                and review the design docs over the weekend.",
    },
];

impl Commitment {
    /// Expected agent actions, excluding the closing reply.
    fn actions(&self) -> Vec<Action> {
        match *self {
            Commitment::Remind {
                title,
                due,
                description,
            } => vec![Action::new(
                ReminderApp::NAME,
                "add_reminder",
                args! { "title" => title, "due_datetime" => due, "description" => description },
            )],
            Commitment::Schedule { title, start, end } => vec![schedule(title, start, end)],
            Commitment::MoveReminder { reminder_id, due } => vec![Action::new(
                ReminderApp::NAME,
                "update_reminder",
                args! { "reminder_id" => reminder_id, "due_datetime" => due },
            )],
            Commitment::Reschedule {
                event_id,
                title,
                start,
                end,
            } => vec![cancel(event_id), schedule(title, start, end)],
            Commitment::Cancel { event_id } => vec![cancel(event_id)],
            Commitment::Acknowledge | Commitment::Summarize => Vec::new(),
        }
    }
}

fn schedule(title: &str, start: &str, end: &str) -> Action {
    Action::new(
        CalendarApp::NAME,
        "add_calendar_event",
        args! { "title" => title, "start_datetime" => start, "end_datetime" => end, "attendees" => [TEAM] },
    )
}

fn cancel(event_id: &str) -> Action {
    Action::new(CalendarApp::NAME, "delete_calendar_event", args! { "event_id" => event_id })
}

const CHECKS: [&str; 7] = [
    "budget_reminder_created",
    "budget_reminder_updated",
    "standup_created",
    "standup_rescheduled",
    "standup_cancelled",
    "implicit_reminder_tracked",
    "summary_provided",
];

pub struct CommitmentTracking;

impl CommitmentTracking {
    fn announce(b: &mut GraphBuilder, index: usize, turn: &Turn, after: Option<EventHandle>) -> Result<EventHandle, BuildError> {
        let mut draft = match turn.prompt {
            Prompt::User(content) => b.user(
                AgentUserInterface::NAME,
                "send_message_to_agent",
                args! { "content" => content },
            ),
            Prompt::Email {
                sender,
                subject,
                content,
            } => b.env(
                EmailClientApp::NAME,
                "send_email_to_user",
                args! {
                    "email_id" => format!("commitment-tracking-turn-{}", index + 1),
                    "sender" => sender,
                    "subject" => subject,
                    "content" => content,
                },
            ),
        };
        draft = draft
            .with_type(EventType::Env)
            .label(format!("turn-{}", index + 1))
            .delay(Duration::from_secs(turn.delay));
        if let Some(previous) = after {
            draft = draft.after(previous);
        }
        draft.register()
    }
}

impl Scenario for CommitmentTracking {
    fn id(&self) -> ScenarioId {
        ScenarioId::CommitmentTracking
    }

    fn duration(&self) -> Duration {
        Duration::from_secs(900)
    }

    fn init_apps(&self) -> Vec<Box<dyn App>> {
        let mut email = EmailClientApp::new();
        email.add_email(Email::to_user(
            "commitment-tracking-intro",
            "assistant-intro@company.com",
            "Welcome to Your Commitment Tracker",
            "Hi! I'm here to help you track your commitments and obligations. Just let me know what you need \
             to remember, and I'll make sure you stay on top of everything.",
        ));
        vec![
            Box::new(AgentUserInterface::new()),
            Box::new(email),
            Box::new(CalendarApp::new()),
            Box::new(ReminderApp::new()),
        ]
    }

    fn build_events(&self, b: &mut GraphBuilder, _env: &Environment) -> Result<(), BuildError> {
        let mut anchor = None;
        for (index, turn) in TURNS.iter().enumerate() {
            let prompt = Self::announce(b, index, turn, anchor)?;

            let mut previous = prompt;
            let mut delay = 15;
            for action in turn.commitment.actions() {
                previous = b
                    .agent(action.app, action.operation, action.args)
                    .oracle()
                    .after(previous)
                    .delay(Duration::from_secs(delay))
                    .register()?;
                delay = 5;
            }
            b.agent(
                AgentUserInterface::NAME,
                "send_message_to_user",
                args! { "content" => turn.reply },
            )
            .oracle()
            .after(previous)
            .delay(Duration::from_secs(delay))
            .register()?;

            anchor = Some(prompt);
        }
        Ok(())
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict, ValidationError> {
        let reminders: Vec<Reminder> = map_values(ctx, ReminderApp::NAME, "reminders")?;
        let calendar: Vec<CalendarEvent> = map_values(ctx, CalendarApp::NAME, "events")?;

        let mut passed = [false; CHECKS.len()];
        let mut issues = Vec::new();

        let budget: Vec<&Reminder> = reminders
            .iter()
            .filter(|r| {
                let title = r.title.to_lowercase();
                title.contains("budget") && title.contains("sarah")
            })
            .collect();
        passed[0] = !budget.is_empty();
        passed[1] = budget.iter().any(|r| r.due_datetime == "2026-03-05 17:00:00");
        if !passed[0] {
            issues.push("Budget analysis reminder for Sarah not created.");
        } else if !passed[1] {
            issues.push("Budget reminder not updated to Thursday afternoon as requested.");
        }

        let booked = ctx.agent_actions_for(&ActionKey::new(CalendarApp::NAME, "add_calendar_event"));
        let standups: Vec<&str> = booked
            .iter()
            .filter_map(|entry| entry.action.as_ref())
            .filter(|action| {
                action
                    .args
                    .get("title")
                    .and_then(|t| t.as_str())
                    .map_or(false, |t| t.to_lowercase().contains("standup"))
            })
            .map(|action| action.args.get("start_datetime").and_then(|s| s.as_str()).unwrap_or(""))
            .collect();
        passed[2] = !standups.is_empty();
        passed[3] = standups.iter().any(|start| start.ends_with("14:00:00"));
        if passed[2] && !passed[3] {
            issues.push("Standup was not rescheduled to 2pm as requested.");
        }

        passed[4] = !calendar.iter().any(|e| e.title.to_lowercase().contains("standup"));
        if !passed[4] {
            issues.push("Standup meeting still exists but should have been cancelled.");
        }

        passed[5] = reminders.iter().any(|r| {
            let title = r.title.to_lowercase();
            title.contains("design") && title.contains("doc")
        });

        passed[6] = agent_notifications(ctx).iter().any(|note| {
            ["commitment", "summary", "current", "tracking"].iter().any(|k| note.contains(k)) && note.contains("budget")
        });
        if !passed[6] {
            issues.push("Agent did not provide a commitment summary when requested.");
        }

        let score = passed.iter().filter(|p| **p).count();
        let percent = score * 100 / CHECKS.len();
        for (name, ok) in CHECKS.iter().zip(passed) {
            debug!("commitment check {}: {}", name, ok);
        }

        // at least 60% of the checks
        if score * 5 >= CHECKS.len() * 3 {
            let mut rationale = format!(
                "Commitment tracking successful. Passed {}/{} checks ({}%).",
                score,
                CHECKS.len(),
                percent
            );
            if !issues.is_empty() {
                rationale.push_str(&format!(" Minor issues: {}", issues[..issues.len().min(2)].join(" ")));
            }
            Ok(Verdict::pass(rationale))
        } else {
            Ok(Verdict::fail(format!(
                "Commitment tracking incomplete. Only {}/{} checks passed ({}%). Issues: {}",
                score,
                CHECKS.len(),
                percent,
                issues[..issues.len().min(3)].join(" ")
            )))
        }
    }
}

/// Values of the object stored under `key` in `app`'s state.
fn map_values<T: serde::de::DeserializeOwned>(
    ctx: &ValidationContext<'_>,
    app: &str,
    key: &str,
) -> Result<Vec<T>, ValidationError> {
    ctx.app_state(app)?
        .get(key)
        .and_then(|map| map.as_object())
        .ok_or_else(|| ValidationError::StateShape(format!("{} has no {} map", app, key)))?
        .values()
        .map(|value| serde_json::from_value(value.clone()).map_err(ValidationError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScenarioRunner, SimConfig, SimWorld};
    use tempo_core::RunMode;

    #[test]
    fn test_turns_are_env_anchors() {
        let world = SimWorld::new(SimConfig::default());
        let sim = world.build_simulation(&CommitmentTracking).unwrap();
        let graph = sim.graph();

        for n in 1..=TURNS.len() {
            let turn = graph.by_label(&format!("turn-{}", n)).unwrap();
            assert_eq!(turn.event_type, EventType::Env);
        }
        // a reply per turn, two reminders, a move, two bookings and two cancellations
        let oracle = graph.oracle_events().count();
        assert_eq!(oracle, TURNS.len() + 7);
    }

    #[test]
    fn test_oracle_run_passes_every_check() {
        let result = ScenarioRunner::new(11).unwrap().run(ScenarioId::CommitmentTracking);
        assert!(result.passed, "{:?}", result.failure_reason());
        assert!(result.rationale.unwrap().contains("Passed 7/7"));
    }

    #[test]
    fn test_absent_agent_scores_only_the_cancellation() {
        let result = ScenarioRunner::new(11)
            .unwrap()
            .with_mode(RunMode::Live)
            .with_agent(crate::AgentChoice::Absent)
            .run(ScenarioId::CommitmentTracking);
        assert!(!result.passed);
        let rationale = result.rationale.unwrap();
        assert!(rationale.contains("Only 1/7"), "{}", rationale);
        assert!(rationale.contains("Budget analysis reminder for Sarah not created."));
    }
}
