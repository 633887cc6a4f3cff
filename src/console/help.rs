//! The static command help, typed into the console line by line.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::console::lines::{Line, LineKeys, LineStore};
use crate::error::{Error, Result};

/// Default per-character delay of the typing animation.
pub const DEFAULT_TYPE_DELAY: Duration = Duration::from_millis(25);

/// The help text, one line per entry, in display order.
pub const HELP_LINES: [&str; 4] = [
    "Available commands:",
    "help - display this help message",
    "toggle-color-mode - toggle between light and dark mode",
    "clear-history - clear the command history",
];

/// How help lines appear.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HelpStyle {
    /// Each line is pushed whole.
    Instant,
    /// Each line is typed one character at a time.
    Animated { delay: Duration },
}

impl Default for HelpStyle {
    fn default() -> Self {
        HelpStyle::Animated {
            delay: DEFAULT_TYPE_DELAY,
        }
    }
}

/// Pushes [`HELP_LINES`] into the line store.
#[derive(Clone)]
pub struct HelpRenderer {
    lines: LineStore,
    keys: Arc<LineKeys>,
    style: HelpStyle,
}

impl HelpRenderer {
    pub fn new(lines: LineStore, keys: Arc<LineKeys>, style: HelpStyle) -> Self {
        Self { lines, keys, style }
    }

    pub fn style(&self) -> HelpStyle {
        self.style
    }

    /// Show every help line, each under a fresh `help-…` key.
    pub async fn show_help(&self, token: &CancellationToken) -> Result<()> {
        for message in HELP_LINES {
            self.type_message(message, token).await?;
        }
        Ok(())
    }

    async fn type_message(&self, message: &str, token: &CancellationToken) -> Result<()> {
        let key = self.keys.next("help");
        let delay = match self.style {
            HelpStyle::Instant => {
                ensure_live(token)?;
                return self.lines.push(Line::output(key, message)).await;
            }
            HelpStyle::Animated { delay } => delay,
        };

        let mut buf = [0u8; 4];
        for (i, c) in message.chars().enumerate() {
            ensure_live(token)?;
            let c = c.encode_utf8(&mut buf);
            if i == 0 {
                self.lines.push(Line::output(key.clone(), &*c)).await?;
            } else {
                self.lines.append(&key, c).await?;
            }
            tokio::select! {
                _ = token.cancelled() => return Err(Error::cancelled("help animation interrupted")),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(())
    }
}

fn ensure_live(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(Error::cancelled("help animation interrupted"))
    } else {
        Ok(())
    }
}
