//! The conversation channel between the simulated user and the agent.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use tempo_env::{App, AppError, ArgType, Args, ArgsExt, OperationTable, Signature};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub content: String,
}

/// `AgentUserInterface` application.
pub struct AgentUserInterface {
    messages: Vec<Message>,
    ops: OperationTable<AgentUserInterface>,
}

impl AgentUserInterface {
    pub const NAME: &'static str = "AgentUserInterface";

    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                Signature::write("send_message_to_agent").param("content", ArgType::String),
                AgentUserInterface::op_send_to_agent,
            )
            .with(
                Signature::write("send_message_to_user").param("content", ArgType::String),
                AgentUserInterface::op_send_to_user,
            )
            .with(
                Signature::read("get_last_message_from_user"),
                AgentUserInterface::op_last_from_user,
            )
            .with(Signature::read("get_all_messages"), AgentUserInterface::op_all);
        Self {
            messages: Vec::new(),
            ops,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn push(&mut self, sender: Sender, args: &Args) -> Result<Value, AppError> {
        let content = args.str_arg("content")?;
        self.messages.push(Message {
            sender,
            content: content.to_string(),
        });
        Ok(json!(self.messages.len() - 1))
    }

    fn op_send_to_agent(&mut self, args: &Args) -> Result<Value, AppError> {
        self.push(Sender::User, args)
    }

    fn op_send_to_user(&mut self, args: &Args) -> Result<Value, AppError> {
        self.push(Sender::Agent, args)
    }

    fn op_last_from_user(&mut self, _args: &Args) -> Result<Value, AppError> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map(|m| Value::from(m.content.clone()))
            .ok_or_else(|| AppError::not_found("message from user"))
    }

    fn op_all(&mut self, _args: &Args) -> Result<Value, AppError> {
        Ok(serde_json::to_value(&self.messages)?)
    }
}

impl Default for AgentUserInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl App for AgentUserInterface {
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
        Ok(json!({ "messages": self.messages }))
    }

    fn load_state(&mut self, state: &Value) -> Result<(), AppError> {
        self.messages = match state.get("messages") {
            Some(messages) => serde_json::from_value(messages.clone())?,
            None => Vec::new(),
        };
        Ok(())
    }

    fn reset(&mut self) {
        self.messages.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_env::args;

    #[test]
    fn test_conversation() {
        let mut ui = AgentUserInterface::new();
        assert!(ui.call("get_last_message_from_user", &args! {}).is_err());

        ui.call("send_message_to_agent", &args! { "content" => "hello" }).unwrap();
        ui.call("send_message_to_user", &args! { "content" => "hi there" }).unwrap();

        assert_eq!(ui.call("get_last_message_from_user", &args! {}).unwrap(), "hello");
        assert_eq!(ui.messages()[1].sender, Sender::Agent);
        assert_eq!(
            ui.get_state().unwrap()["messages"][1],
            json!({ "sender": "agent", "content": "hi there" })
        );
    }
}
