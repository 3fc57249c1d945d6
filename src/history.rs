//! Advisory copies of the backend's threads and messages.
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

/// Which edge of the chat surface a message is pinned to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "right")]
    Right,
}

impl Role {
    pub fn side(self) -> Side {
        match self {
            Role::User => Side::Right,
            Role::Assistant => Side::Left,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn side(&self) -> Side {
        self.role.side()
    }
}

/// A server-tracked conversation as last seen by this client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl Thread {
    pub fn new(id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        let updated_at = messages.iter().filter_map(|m| m.timestamp).max();
        Self {
            id: id.into(),
            messages,
            updated_at,
        }
    }
}
