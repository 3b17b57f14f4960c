//! Reminder application: titled reminders with a due datetime.

use super::calendar::check_datetime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use tempo_env::{App, AppError, ArgType, Args, ArgsExt, OperationTable, Signature};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: String,
    pub title: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub due_datetime: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ReminderState {
    reminders: BTreeMap<String, Reminder>,
    next_id: u64,
}

/// `ReminderApp` application.
pub struct ReminderApp {
    state: ReminderState,
    ops: OperationTable<ReminderApp>,
}

impl ReminderApp {
    pub const NAME: &'static str = "ReminderApp";

    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                Signature::write("add_reminder")
                    .param("title", ArgType::String)
                    .param("due_datetime", ArgType::String)
                    .optional("description", ArgType::String),
                ReminderApp::op_add,
            )
            .with(
                Signature::write("update_reminder")
                    .param("reminder_id", ArgType::String)
                    .optional("title", ArgType::String)
                    .optional("due_datetime", ArgType::String)
                    .optional("description", ArgType::String),
                ReminderApp::op_update,
            )
            .with(
                Signature::write("delete_reminder").param("reminder_id", ArgType::String),
                ReminderApp::op_delete,
            )
            .with(Signature::read("get_all_reminders"), ReminderApp::op_list);
        Self {
            state: ReminderState::default(),
            ops,
        }
    }

    /// Reminders ordered by id.
    pub fn reminders(&self) -> impl Iterator<Item = &Reminder> {
        self.state.reminders.values()
    }

    fn op_add(&mut self, args: &Args) -> Result<Value, AppError> {
        let due = args.str_arg("due_datetime")?;
        check_datetime("due_datetime", due)?;

        self.state.next_id += 1;
        let reminder_id = format!("rem-{:04}", self.state.next_id);
        let reminder = Reminder {
            reminder_id: reminder_id.clone(),
            title: args.str_arg("title")?.to_string(),
            due_datetime: due.to_string(),
            description: args.opt_str_arg("description").map(str::to_string),
        };
        self.state.reminders.insert(reminder_id.clone(), reminder);
        Ok(Value::from(reminder_id))
    }

    fn op_update(&mut self, args: &Args) -> Result<Value, AppError> {
        let reminder_id = args.str_arg("reminder_id")?;
        if let Some(due) = args.opt_str_arg("due_datetime") {
            check_datetime("due_datetime", due)?;
        }
        let reminder = self
            .state
            .reminders
            .get_mut(reminder_id)
            .ok_or_else(|| AppError::not_found(format!("reminder {}", reminder_id)))?;

        if let Some(title) = args.opt_str_arg("title") {
            reminder.title = title.to_string();
        }
        if let Some(due) = args.opt_str_arg("due_datetime") {
            reminder.due_datetime = due.to_string();
        }
        if let Some(description) = args.opt_str_arg("description") {
            reminder.description = Some(description.to_string());
        }
        Ok(serde_json::to_value(&*reminder)?)
    }

    fn op_delete(&mut self, args: &Args) -> Result<Value, AppError> {
        let reminder_id = args.str_arg("reminder_id")?;
        self.state
            .reminders
            .remove(reminder_id)
            .map(|_| Value::Null)
            .ok_or_else(|| AppError::not_found(format!("reminder {}", reminder_id)))
    }

    fn op_list(&mut self, _args: &Args) -> Result<Value, AppError> {
        let reminders: Vec<&Reminder> = self.reminders().collect();
        Ok(serde_json::to_value(reminders)?)
    }
}

impl Default for ReminderApp {
    fn default() -> Self {
        Self::new()
    }
}

impl App for ReminderApp {
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
        self.state = ReminderState::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
