//! Calendar application.
//!
//! Datetimes are UTC strings in `YYYY-MM-DD HH:MM:SS` form. That format
//! sorts lexicographically, so start/end ordering is a string comparison.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use tempo_env::{App, AppError, ArgType, Args, ArgsExt, OperationTable, Signature};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub title: String,
    pub start_datetime: String,
    pub end_datetime: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CalendarState {
    events: BTreeMap<String, CalendarEvent>,
    next_id: u64,
}

/// `CalendarApp` application.
pub struct CalendarApp {
    state: CalendarState,
    ops: OperationTable<CalendarApp>,
}

/// Checks the `YYYY-MM-DD HH:MM:SS` shape and field ranges.
pub(super) fn check_datetime(name: &str, value: &str) -> Result<(), AppError> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 19
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            10 => *b == b' ',
            13 | 16 => *b == b':',
            _ => b.is_ascii_digit(),
        });
    let field = |range: std::ops::Range<usize>| value.get(range).and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
    let ranges_ok = shape_ok
        && (1..=12).contains(&field(5..7))
        && (1..=31).contains(&field(8..10))
        && field(11..13) < 24
        && field(14..16) < 60
        && field(17..19) < 60;

    if ranges_ok {
        Ok(())
    } else {
        Err(AppError::invalid(format!(
            "'{}' must be formatted YYYY-MM-DD HH:MM:SS, got '{}'",
            name, value
        )))
    }
}

impl CalendarApp {
    pub const NAME: &'static str = "CalendarApp";

    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                Signature::write("add_calendar_event")
                    .param("title", ArgType::String)
                    .param("start_datetime", ArgType::String)
                    .param("end_datetime", ArgType::String)
                    .optional("tag", ArgType::String)
                    .optional("description", ArgType::String)
                    .optional("location", ArgType::String)
                    .optional("attendees", ArgType::Array),
                CalendarApp::op_add,
            )
            .with(Signature::read("get_calendar_events"), CalendarApp::op_list)
            .with(
                Signature::read("get_calendar_event").param("event_id", ArgType::String),
                CalendarApp::op_get,
            )
            .with(
                Signature::write("delete_calendar_event").param("event_id", ArgType::String),
                CalendarApp::op_delete,
            );
        Self {
            state: CalendarState::default(),
            ops,
        }
    }

    /// Events ordered by id.
    pub fn events(&self) -> impl Iterator<Item = &CalendarEvent> {
        self.state.events.values()
    }

    fn op_add(&mut self, args: &Args) -> Result<Value, AppError> {
        let start = args.str_arg("start_datetime")?;
        let end = args.str_arg("end_datetime")?;
        check_datetime("start_datetime", start)?;
        check_datetime("end_datetime", end)?;
        if end <= start {
            return Err(AppError::invalid("end_datetime must be after start_datetime"));
        }

        self.state.next_id += 1;
        let event_id = format!("cal-{:04}", self.state.next_id);
        let event = CalendarEvent {
            event_id: event_id.clone(),
            title: args.str_arg("title")?.to_string(),
            start_datetime: start.to_string(),
            end_datetime: end.to_string(),
            tag: args.opt_str_arg("tag").map(str::to_string),
            description: args.opt_str_arg("description").map(str::to_string),
            location: args.opt_str_arg("location").map(str::to_string),
            attendees: args.str_list_arg("attendees")?,
        };
        self.state.events.insert(event_id.clone(), event);
        Ok(Value::from(event_id))
    }

    fn op_list(&mut self, _args: &Args) -> Result<Value, AppError> {
        let events: Vec<&CalendarEvent> = self.events().collect();
        Ok(serde_json::to_value(events)?)
    }

    fn op_get(&mut self, args: &Args) -> Result<Value, AppError> {
        let event_id = args.str_arg("event_id")?;
        let event = self
            .state
            .events
            .get(event_id)
            .ok_or_else(|| AppError::not_found(format!("calendar event {}", event_id)))?;
        Ok(serde_json::to_value(event)?)
    }

    fn op_delete(&mut self, args: &Args) -> Result<Value, AppError> {
        let event_id = args.str_arg("event_id")?;
        self.state
            .events
            .remove(event_id)
            .map(|_| Value::Null)
            .ok_or_else(|| AppError::not_found(format!("calendar event {}", event_id)))
    }
}

impl Default for CalendarApp {
    fn default() -> Self {
        Self::new()
    }
}

impl App for CalendarApp {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn signature(&self, operation: &str) -> Option<&Signature> {
        self.ops.signature(operation)
    }

    fn signatures(&self) -> Vec<&Signature> {
        self.ops.signatures()
    }

    fn call(&mut self, operation: &str, args: &Args) -> Result<Value, AppError> {
        let handler = self
            .ops
            .handler(operation)
            .ok_or_else(|| AppError::not_found(operation))?;
        handler(self, args)
    }

    fn get_state(&self) -> Result<Value, AppError> {
        Ok(serde_json::to_value(&self.state)?)
    }

    fn load_state(&mut self, state: &Value) -> Result<(), AppError> {
        self.state = serde_json::from_value(state.clone())?;
        Ok(())
    }

    fn reset(&mut self) {
        self.state = CalendarState::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
