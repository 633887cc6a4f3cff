use serde::{Deserialize, Serialize};

use crate::types::{HistoryEntry, StreamChunk};

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier, e.g. `llama3.1:8b`.
    pub model: String,

    /// The conversation so far, oldest first.
    pub messages: Vec<HistoryEntry>,

    /// Ask the server to stream newline-delimited chunks.
    pub stream: bool,
}

impl ChatRequest {
    /// Create a streaming chat request.
    pub fn new(model: impl Into<String>, messages: Vec<HistoryEntry>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

/// The partial assistant message carried by one chat chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub content: String,
}

/// One streamed chunk of a chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatDelta>,

    pub done: bool,
}

impl From<ChatChunk> for StreamChunk {
    fn from(chunk: ChatChunk) -> Self {
        StreamChunk {
            text: chunk.message.map(|m| m.content).unwrap_or_default(),
            done: chunk.done,
        }
    }
}
