//! Mailbox application with an inbox and a sent folder.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use tempo_env::{App, AppError, ArgType, Args, ArgsExt, OperationTable, Signature};

pub const USER_EMAIL: &str = "user@tempo.example";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub email_id: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
}

impl Email {
    /// An unread email addressed to the mailbox owner.
    pub fn to_user(email_id: &str, sender: &str, subject: &str, content: &str) -> Self {
        Self {
            email_id: email_id.to_string(),
            sender: sender.to_string(),
            recipients: vec![USER_EMAIL.to_string()],
            subject: subject.to_string(),
            content: content.to_string(),
            is_read: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Mailbox {
    inbox: Vec<Email>,
    sent: Vec<Email>,
    /// Counter for ids of emails written by the user
    next_id: u64,
}

/// `EmailClientApp` application.
pub struct EmailClientApp {
    mailbox: Mailbox,
    ops: OperationTable<EmailClientApp>,
}

impl EmailClientApp {
    pub const NAME: &'static str = "EmailClientApp";

    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                Signature::write("send_email_to_user")
                    .param("email_id", ArgType::String)
                    .param("sender", ArgType::String)
                    .param("subject", ArgType::String)
                    .param("content", ArgType::String),
                EmailClientApp::op_deliver,
            )
            .with(
                Signature::read("list_emails").optional("folder", ArgType::String),
                EmailClientApp::op_list,
            )
            .with(
                Signature::read("get_email_by_id").param("email_id", ArgType::String),
                EmailClientApp::op_get,
            )
            .with(
                Signature::write("send_email")
                    .param("recipients", ArgType::Array)
                    .param("subject", ArgType::String)
                    .param("content", ArgType::String),
                EmailClientApp::op_send,
            )
            .with(
                Signature::write("reply_to_email")
                    .param("email_id", ArgType::String)
                    .param("content", ArgType::String),
                EmailClientApp::op_reply,
            );
        Self {
            mailbox: Mailbox::default(),
            ops,
        }
    }

    /// Places an email in the inbox directly, outside of any event.
    pub fn add_email(&mut self, email: Email) {
        self.mailbox.inbox.push(email);
    }

    pub fn inbox(&self) -> &[Email] {
        &self.mailbox.inbox
    }

    pub fn sent(&self) -> &[Email] {
        &self.mailbox.sent
    }

    fn op_deliver(&mut self, args: &Args) -> Result<Value, AppError> {
        let email_id = args.str_arg("email_id")?;
        if self.mailbox.inbox.iter().any(|e| e.email_id == email_id) {
            return Err(AppError::InvalidState(format!("email {} already delivered", email_id)));
        }
        self.add_email(Email::to_user(
            email_id,
            args.str_arg("sender")?,
            args.str_arg("subject")?,
            args.str_arg("content")?,
        ));
        Ok(Value::from(email_id))
    }

    fn op_list(&mut self, args: &Args) -> Result<Value, AppError> {
        let folder = args.opt_str_arg("folder").unwrap_or("INBOX");
        let emails = match folder.to_ascii_uppercase().as_str() {
            "INBOX" => &self.mailbox.inbox,
            "SENT" => &self.mailbox.sent,
            other => return Err(AppError::invalid(format!("unknown folder {}", other))),
        };
        Ok(serde_json::to_value(emails)?)
    }

    fn op_get(&mut self, args: &Args) -> Result<Value, AppError> {
        let email_id = args.str_arg("email_id")?;
        let email = self
            .mailbox
            .inbox
            .iter_mut()
            .chain(self.mailbox.sent.iter_mut())
            .find(|e| e.email_id == email_id)
            .ok_or_else(|| AppError::not_found(format!("email {}", email_id)))?;
        email.is_read = true;
        Ok(serde_json::to_value(&*email)?)
    }

    fn write_email(&mut self, recipients: Vec<String>, subject: String, content: String) -> Value {
        self.mailbox.next_id += 1;
        let email_id = format!("sent-{}", self.mailbox.next_id);
        self.mailbox.sent.push(Email {
            email_id: email_id.clone(),
            sender: USER_EMAIL.to_string(),
            recipients,
            subject,
            content,
            is_read: true,
        });
        Value::from(email_id)
    }

    fn op_send(&mut self, args: &Args) -> Result<Value, AppError> {
        let recipients = args.str_list_arg("recipients")?;
        if recipients.is_empty() {
            return Err(AppError::invalid("an email needs at least one recipient"));
        }
        let subject = args.str_arg("subject")?.to_string();
        let content = args.str_arg("content")?.to_string();
        Ok(self.write_email(recipients, subject, content))
    }

    fn op_reply(&mut self, args: &Args) -> Result<Value, AppError> {
        let email_id = args.str_arg("email_id")?;
        let original = self
            .mailbox
            .inbox
            .iter()
            .find(|e| e.email_id == email_id)
            .ok_or_else(|| AppError::not_found(format!("email {}", email_id)))?;
        let recipients = vec![original.sender.clone()];
        let subject = format!("Re: {}", original.subject);
        Ok(self.write_email(recipients, subject, args.str_arg("content")?.to_string()))
    }
}

impl Default for EmailClientApp {
    fn default() -> Self {
        Self::new()
    }
}

impl App for EmailClientApp {
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
        let mut state = serde_json::to_value(&self.mailbox)?;
        if let Some(map) = state.as_object_mut() {
            map.insert("user_email".to_string(), json!(USER_EMAIL));
        }
        Ok(state)
    }

    fn load_state(&mut self, state: &Value) -> Result<(), AppError> {
        self.mailbox = serde_json::from_value(state.clone())?;
        Ok(())
    }

    fn reset(&mut self) {
        self.mailbox = Mailbox::default();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
