use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::time::now_iso8601;

/// Role of the author of a conversation turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed into the console.
    User,

    /// Text streamed back by the model.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One recorded conversation turn.
///
/// This is both the persisted history record and the wire shape of a chat
/// message; the server ignores the extra `timestamp` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who produced the content.
    pub role: Role,

    /// The text of the turn.
    pub content: String,

    /// ISO-8601 UTC time the turn was recorded.
    pub timestamp: String,
}

impl HistoryEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a user entry stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant entry stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Replace the timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}
