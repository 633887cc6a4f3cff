use serde::{Deserialize, Serialize};

use crate::types::{ChatRequest, GenerateRequest};

/// A streaming request in either of the two supported shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamRequest {
    /// Multi-turn chat with the bounded history as context.
    Chat(ChatRequest),

    /// Single-turn generation from one prompt.
    Generate(GenerateRequest),
}

impl StreamRequest {
    /// Path of the endpoint, relative to the API base.
    pub fn path(&self) -> &'static str {
        match self {
            StreamRequest::Chat(_) => "chat",
            StreamRequest::Generate(_) => "generate",
        }
    }

    /// The model the request targets.
    pub fn model(&self) -> &str {
        match self {
            StreamRequest::Chat(req) => &req.model,
            StreamRequest::Generate(req) => &req.model,
        }
    }
}

impl From<ChatRequest> for StreamRequest {
    fn from(request: ChatRequest) -> Self {
        StreamRequest::Chat(request)
    }
}

impl From<GenerateRequest> for StreamRequest {
    fn from(request: GenerateRequest) -> Self {
        StreamRequest::Generate(request)
    }
}

/// A response chunk normalized across the chat and generate endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text to append to the response line; may be empty.
    pub text: String,

    /// True on the terminal chunk.
    pub done: bool,
}

impl StreamChunk {
    /// A non-terminal chunk carrying `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    /// The terminal chunk.
    pub fn done() -> Self {
        Self {
            text: String::new(),
            done: true,
        }
    }
}

/// One line of a streamed body: either a chunk or a server-side failure.
///
/// The server reports errors that happen after the response has started as a
/// line of the form `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireChunk<T> {
    Failure { error: String },
    Chunk(T),
}
