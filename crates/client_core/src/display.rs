use chrono::NaiveDateTime;
use shared::{
    domain::{ChatType, Identity, ADMINISTRATOR_LABEL},
    protocol::ChatMessage,
};

const DISPLAY_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Admin,
    Sent,
    Received,
}

/// A message as a chat view renders it. Derived on demand; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub message: ChatMessage,
    pub class: MessageClass,
    pub formatted_date: String,
}

impl DisplayMessage {
    pub fn new(message: &ChatMessage, identity: &Identity) -> Self {
        Self {
            class: classify(message, identity),
            formatted_date: format_send_at(message.send_at),
            message: message.clone(),
        }
    }

    pub fn is_my_message(&self) -> bool {
        self.class == MessageClass::Sent
    }

    pub fn is_admin_message(&self) -> bool {
        self.class == MessageClass::Admin
    }
}

pub fn classify(message: &ChatMessage, identity: &Identity) -> MessageClass {
    if message.kind == ChatType::Admin && message.sender_name == ADMINISTRATOR_LABEL {
        MessageClass::Admin
    } else if message.sender_id == Some(identity.member_id) {
        MessageClass::Sent
    } else {
        MessageClass::Received
    }
}

pub fn format_send_at(send_at: Option<NaiveDateTime>) -> String {
    send_at
        .map(|ts| ts.format(DISPLAY_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/display_tests.rs"]
mod tests;
