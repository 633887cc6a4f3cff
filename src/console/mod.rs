//! The interactive console: a line-oriented chat front end for Ollama.
//!
//! # Architecture
//!
//! - [`lines`]: the keyed line store every other component writes into
//! - [`state`]: color mode and availability, persisted through [`crate::store`]
//! - [`history`]: the bounded conversation log sent as chat context
//! - [`prober`]: periodic availability checks driving the welcome line
//! - [`session`]: streaming replies into output lines
//! - [`help`]: the typed-out help text
//! - [`commands`]: parsing and dispatching user input
//! - [`config`]: CLI argument parsing and configuration
//! - [`context`]: one view's wiring and teardown

pub mod commands;
pub mod config;
pub mod context;
pub mod help;
pub mod history;
pub mod lines;
pub mod prober;
pub mod session;
pub mod state;

pub use commands::{ConsoleCommand, DispatchOutcome, Dispatcher, parse_command};
pub use config::{ConsoleArgs, ConsoleConfig};
pub use context::Console;
pub use help::{HELP_LINES, HelpRenderer, HelpStyle};
pub use history::History;
pub use lines::{Line, LineKeys, LineKind, LineStore, Lines, WELCOME_KEY};
pub use prober::{Prober, WELCOME_AVAILABLE, WELCOME_UNAVAILABLE, welcome_message};
pub use session::{RequestMode, SessionController, StreamOutcome, StreamSummary};
pub use state::{ColorMode, SessionState};
