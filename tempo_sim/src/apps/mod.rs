//! Demo applications driven by the built-in scenarios.
//!
//! Each application declares its operations once, in an `OperationTable`
//! built by its constructor, and keeps all state in plain serde types so
//! that `get_state`/`load_state` round-trip exactly.

mod agent_ui;
mod calendar;
mod email;
mod kv_store;
mod reminder;

pub use agent_ui::{AgentUserInterface, Message, Sender};
pub use calendar::{CalendarApp, CalendarEvent};
pub use email::{Email, EmailClientApp, USER_EMAIL};
pub use kv_store::KvStore;
pub use reminder::{Reminder, ReminderApp};
