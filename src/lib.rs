// Public modules
pub mod client;
pub mod console;
pub mod error;
pub mod ndjson;
pub mod observability;
pub mod render;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{ChunkStream, ModelServer, Ollama, base_url_for};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::TerminalRenderer;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, Storage};
pub use types::*;
