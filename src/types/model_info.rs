use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A locally installed model, as listed by `GET /tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name including tag, e.g. `llama3.1:8b`.
    pub name: String,

    /// RFC 3339 datetime of the last modification of the local copy.
    #[serde(with = "crate::utils::time")]
    pub modified_at: OffsetDateTime,

    /// Size on disk in bytes.
    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Format and family information.
    #[serde(default)]
    pub details: ModelDetails,
}

/// Details block of a listed model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDetails {
    /// File format, e.g. `gguf`.
    #[serde(default)]
    pub format: String,

    /// Model family, e.g. `llama`.
    #[serde(default)]
    pub family: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub families: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization_level: Option<String>,
}
