//! Configuration types for the console.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the console runs with.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, base_url_for};
use crate::console::help::{DEFAULT_TYPE_DELAY, HelpStyle};
use crate::console::history::DEFAULT_HISTORY_SIZE;
use crate::console::prober::DEFAULT_PROBE_INTERVAL;
use crate::console::session::{DEFAULT_MODEL, RequestMode};

/// Command-line arguments for the ollama-console tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ConsoleArgs {
    #[arrrg(optional, "Ollama host (default: localhost)", "HOST")]
    pub host: Option<String>,

    #[arrrg(optional, "Ollama port (default: 11434)", "PORT")]
    pub port: Option<u16>,

    #[arrrg(optional, "Model to chat with (default: llama3.1:8b)", "MODEL")]
    pub model: Option<String>,

    #[arrrg(optional, "Conversation turns to keep (default: 10)", "N")]
    pub history_size: Option<usize>,

    #[arrrg(optional, "Milliseconds between availability probes (default: 5000)", "MS")]
    pub probe_interval_ms: Option<u64>,

    #[arrrg(optional, "Milliseconds per character of help text (default: 25)", "MS")]
    pub type_delay_ms: Option<u64>,

    #[arrrg(flag, "Print help text at once instead of typing it")]
    pub instant_help: bool,

    #[arrrg(flag, "Send each prompt alone via /generate instead of /chat")]
    pub single_turn: bool,

    #[arrrg(optional, "JSON file persisting color mode and history", "PATH")]
    pub store: Option<String>,

    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    #[arrrg(flag, "List installed models and exit")]
    pub list_models: bool,

    #[arrrg(optional, "HTTP timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,
}

/// Resolved settings for a console session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub host: String,
    pub port: u16,

    /// Model named in every stream request.
    pub model: String,

    /// Bound on stored conversation turns.
    pub history_size: usize,

    pub probe_interval: Duration,
    pub help_style: HelpStyle,
    pub request_mode: RequestMode,

    /// Where state persists; `None` keeps it in memory.
    pub store_path: Option<PathBuf>,

    pub use_color: bool,
    pub timeout: Duration,
}

impl ConsoleConfig {
    /// Creates a config talking to `http://localhost:11434/api` with
    /// `llama3.1:8b`, ten turns of history and animated help.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            history_size: DEFAULT_HISTORY_SIZE,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            help_style: HelpStyle::default(),
            request_mode: RequestMode::Chat,
            store_path: None,
            use_color: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The API root for the configured host and port.
    pub fn base_url(&self) -> String {
        base_url_for(&self.host, self.port)
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_help_style(mut self, style: HelpStyle) -> Self {
        self.help_style = style;
        self
    }

    pub fn with_request_mode(mut self, mode: RequestMode) -> Self {
        self.request_mode = mode;
        self
    }

    pub fn with_store_path(mut self, path: Option<PathBuf>) -> Self {
        self.store_path = path;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ConsoleArgs> for ConsoleConfig {
    fn from(args: ConsoleArgs) -> Self {
        let help_style = if args.instant_help {
            HelpStyle::Instant
        } else {
            HelpStyle::Animated {
                delay: args
                    .type_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_TYPE_DELAY),
            }
        };
        let request_mode = if args.single_turn {
            RequestMode::SingleTurn
        } else {
            RequestMode::Chat
        };
        let defaults = ConsoleConfig::new();
        ConsoleConfig {
            host: args.host.unwrap_or(defaults.host),
            port: args.port.unwrap_or(defaults.port),
            model: args.model.unwrap_or(defaults.model),
            history_size: args.history_size.unwrap_or(defaults.history_size),
            probe_interval: args
                .probe_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_interval),
            help_style,
            request_mode,
            store_path: args.store.map(PathBuf::from),
            use_color: !args.no_color,
            timeout: args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}
