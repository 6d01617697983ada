//! Write commands against the router.
//!
//! Commands are parsed from a name plus a JSON argument object into a typed
//! [`Command`], validated before anything goes on the wire, executed through
//! the shared [`DeviceApi`], announced on the notification channel and followed
//! by an immediate coordinator refresh so the sensors show post-action state.

use crate::coordinator::Coordinator;
use crate::error::CommandError;
use crate::transport::DeviceApi;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub const EVENT_SMS_SENT: &str = "askey_sms_sent";
pub const EVENT_INBOX_DATA: &str = "askey_rtl6300_5g_cpe_sms_inbox_data";
pub const EVENT_COMMAND_RESULT: &str = "askey_command_result";

const SMS_ENDPOINT: &str = "sms/send_msg";
const INBOX_ENDPOINT: &str = "sms/inbox_list";
const REBOOT_ENDPOINT: &str = "system/reboot";
const RECONNECT_ENDPOINT: &str = "CMGR/reconnect";

/// Buffered notifications per subscriber before the slowest one starts lagging.
const NOTIFICATION_CAPACITY: usize = 64;

/// Every command name accepted by [`Command::parse`].
pub const COMMAND_NAMES: &[&str] = &[
    "send_sms",
    "get_inbox",
    "clear_inbox",
    "clear_outbox",
    "restart",
    "reconnect",
];

/// An event for host-side automation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: &'static str,
    pub data: Value,
    pub at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn new(event: &'static str, data: Value) -> Self {
        Self {
            event,
            data,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendSms {
        phone_number: String,
        message: String,
    },
    GetInbox,
    ClearInbox,
    ClearOutbox,
    Restart,
    Reconnect,
}

impl Command {
    /// Build a validated `send_sms` command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Validation`] when either argument is empty.
    pub fn send_sms(phone_number: &str, message: &str) -> Result<Self, CommandError> {
        if phone_number.trim().is_empty() || message.is_empty() {
            return Err(CommandError::Validation(
                "Phone number and message are required".to_string(),
            ));
        }

        Ok(Command::SendSms {
            phone_number: phone_number.trim().to_string(),
            message: message.to_string(),
        })
    }

    /// Parse a command from its name and JSON arguments.
    ///
    /// # Errors
    ///
    /// Unknown names and invalid arguments are rejected without touching the device.
    pub fn parse(name: &str, args: &Value) -> Result<Self, CommandError> {
        match name {
            "send_sms" => {
                let text = |field: &str| args.get(field).and_then(Value::as_str).unwrap_or_default();
                Self::send_sms(text("phone_number"), text("message"))
            }
            "get_inbox" => Ok(Command::GetInbox),
            "clear_inbox" => Ok(Command::ClearInbox),
            "clear_outbox" => Ok(Command::ClearOutbox),
            "restart" => Ok(Command::Restart),
            "reconnect" => Ok(Command::Reconnect),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::SendSms { .. } => "send_sms",
            Command::GetInbox => "get_inbox",
            Command::ClearInbox => "clear_inbox",
            Command::ClearOutbox => "clear_outbox",
            Command::Restart => "restart",
            Command::Reconnect => "reconnect",
        }
    }
}

/// The router expects a literal `%2B` in place of `+` inside `phone_nums`.
#[must_use]
pub fn encode_phone_number(phone_number: &str) -> String {
    phone_number.replace('+', "%2B")
}

fn clear_box_body(box_id: &str) -> Value {
    json!({"box": box_id, "action": "1", "tagid": "all"})
}

/// Executes commands and fans out their notifications.
pub struct Dispatcher {
    device: Arc<dyn DeviceApi>,
    coordinator: Arc<Coordinator>,
    notifications: broadcast::Sender<Notification>,
}

impl Dispatcher {
    pub fn new(device: Arc<dyn DeviceApi>, coordinator: Arc<Coordinator>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            device,
            coordinator,
            notifications,
        }
    }

    /// Receive every notification fired from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Parse and execute a command by name.
    ///
    /// # Errors
    ///
    /// See [`Command::parse`] and [`Dispatcher::execute`].
    pub async fn dispatch(&self, name: &str, args: &Value) -> Result<Value, CommandError> {
        let command = Command::parse(name, args).map_err(|e| {
            warn!("Rejected command {name}: {e}");
            e
        })?;
        self.execute(command).await
    }

    /// Run a command against the device and refresh the snapshot afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Transport`] when the device call fails. A failed
    /// follow-up refresh is logged, not returned.
    pub async fn execute(&self, command: Command) -> Result<Value, CommandError> {
        let name = command.name();
        info!("Executing command {name}");

        let result = match &command {
            Command::SendSms {
                phone_number,
                message,
            } => self.send_sms(phone_number, message).await,
            Command::GetInbox => self.get_inbox().await,
            Command::ClearInbox => self.simple(name, SMS_ENDPOINT, clear_box_body("1")).await,
            Command::ClearOutbox => self.simple(name, SMS_ENDPOINT, clear_box_body("2")).await,
            Command::Restart => {
                self.simple(name, REBOOT_ENDPOINT, json!({"action": "reboot"}))
                    .await
            }
            Command::Reconnect => {
                self.simple(name, RECONNECT_ENDPOINT, json!({"action": "reconnect"}))
                    .await
            }
        }?;

        if let Err(e) = self.coordinator.refresh_now().await {
            error!("Refresh after {name} failed: {e}");
        }

        Ok(result)
    }

    async fn send_sms(&self, phone_number: &str, message: &str) -> Result<Value, CommandError> {
        let body = json!({
            "tagid": "",
            "phone_nums": encode_phone_number(phone_number),
            "message": message,
        });

        match self.device.put(SMS_ENDPOINT, body).await {
            Ok(response) => {
                info!("SMS sent successfully to {phone_number}");
                self.notify(
                    EVENT_SMS_SENT,
                    json!({"phone_number": phone_number, "status": "success", "response": response}),
                );
                Ok(response)
            }
            Err(e) => {
                error!("Failed to send SMS to {phone_number}: {e}");
                self.notify(
                    EVENT_SMS_SENT,
                    json!({"phone_number": phone_number, "status": "failed", "error": e.to_string()}),
                );
                Err(e.into())
            }
        }
    }

    async fn get_inbox(&self) -> Result<Value, CommandError> {
        let messages = self.device.get(INBOX_ENDPOINT).await?;
        self.notify(EVENT_INBOX_DATA, json!({ "messages": messages }));
        Ok(messages)
    }

    async fn simple(&self, name: &str, endpoint: &str, body: Value) -> Result<Value, CommandError> {
        match self.device.put(endpoint, body).await {
            Ok(response) => {
                info!("Command {name} succeeded");
                self.notify(
                    EVENT_COMMAND_RESULT,
                    json!({"command": name, "status": "success", "response": response}),
                );
                Ok(response)
            }
            Err(e) => {
                self.notify(
                    EVENT_COMMAND_RESULT,
                    json!({"command": name, "status": "failed", "error": e.to_string()}),
                );
                Err(e.into())
            }
        }
    }

    fn notify(&self, event: &'static str, data: Value) {
        // No subscribers is not an error
        let _ = self.notifications.send(Notification::new(event, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_sms() {
        let command = Command::parse(
            "send_sms",
            &json!({"phone_number": "+15551234", "message": "hi"}),
        )
        .unwrap();
        assert_eq!(
            command,
            Command::SendSms {
                phone_number: "+15551234".to_string(),
                message: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_send_sms_requires_both_fields() {
        assert!(matches!(Command::send_sms("", "hi"), Err(CommandError::Validation(_))));
        assert!(matches!(Command::send_sms("+1555", ""), Err(CommandError::Validation(_))));
        assert!(matches!(
            Command::parse("send_sms", &json!({"phone_number": 5551234, "message": "hi"})),
            Err(CommandError::Validation(_))
        ));
        assert!(matches!(
            Command::parse("send_sms", &Value::Null),
            Err(CommandError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_argument_free_commands() {
        for name in COMMAND_NAMES.iter().filter(|n| **n != "send_sms") {
            let command = Command::parse(name, &Value::Null).unwrap();
            assert_eq!(command.name(), *name);
        }
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("factory_reset", &json!({})),
            Err(CommandError::UnknownCommand("factory_reset".to_string()))
        );
    }

    #[test]
    fn test_encode_phone_number() {
        assert_eq!(encode_phone_number("+15551234"), "%2B15551234");
        assert_eq!(encode_phone_number("5551234"), "5551234");
    }

    #[test]
    fn test_clear_box_body() {
        assert_eq!(
            clear_box_body("2"),
            json!({"box": "2", "action": "1", "tagid": "all"})
        );
    }
}
