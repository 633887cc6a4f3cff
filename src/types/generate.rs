use serde::{Deserialize, Serialize};

use crate::types::StreamChunk;

/// Body of `POST /generate`, the single-turn endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerateRequest {
    /// Create a streaming single-turn request.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
        }
    }
}

/// One streamed chunk of a single-turn response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,

    pub done: bool,
}

impl From<GenerateChunk> for StreamChunk {
    fn from(chunk: GenerateChunk) -> Self {
        StreamChunk {
            text: chunk.response,
            done: chunk.done,
        }
    }
}
