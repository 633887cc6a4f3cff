use serde::{Deserialize, Serialize};

use crate::types::ModelInfo;

/// Response from `GET /tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelListResponse {
    /// Locally installed models.
    pub models: Vec<ModelInfo>,
}

impl ModelListResponse {
    /// Create a new `ModelListResponse`.
    pub fn new(models: Vec<ModelInfo>) -> Self {
        Self { models }
    }

    /// Get the list of models.
    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    /// True when no model is installed.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_list_response_deserialization() {
        let json = serde_json::json!({
            "models": [{
                "name": "llama3.1:8b",
                "modified_at": "2024-07-23T10:11:12Z",
                "size": 4661224676u64,
                "details": {"format": "gguf", "family": "llama"}
            }]
        });
        let response: ModelListResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.models().len(), 1);
        assert_eq!(response.models()[0].name, "llama3.1:8b");
        assert!(!response.is_empty());
    }

    #[test]
    fn test_empty_model_list() {
        let response: ModelListResponse =
            serde_json::from_value(serde_json::json!({"models": []})).unwrap();
        assert!(response.is_empty());
    }
}
