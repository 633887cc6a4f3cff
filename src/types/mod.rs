// Public modules
pub mod chat;
pub mod generate;
pub mod history_entry;
pub mod model_info;
pub mod model_list_response;
pub mod stream;

// Re-exports
pub use chat::{ChatChunk, ChatDelta, ChatRequest};
pub use generate::{GenerateChunk, GenerateRequest};
pub use history_entry::{HistoryEntry, Role};
pub use model_info::{ModelDetails, ModelInfo};
pub use model_list_response::ModelListResponse;
pub use stream::{StreamChunk, StreamRequest, WireChunk};
