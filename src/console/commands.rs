//! Console command parsing and dispatch.
//!
//! Commands are whole-line, exact and case-sensitive: `help`,
//! `toggle-color-mode` and `clear-history`. Anything else is a prompt for
//! the model.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::console::help::HelpRenderer;
use crate::console::history::History;
use crate::console::lines::{Line, LineKeys, LineStore};
use crate::console::session::{SessionController, StreamSummary};
use crate::console::state::{ColorMode, SessionState};
use crate::error::Result;
use crate::observability::COMMANDS_DISPATCHED;
use crate::types::HistoryEntry;

/// A parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Display the help text.
    Help,

    /// Switch between light and dark mode.
    ToggleColorMode,

    /// Empty the conversation history.
    ClearHistory,

    /// Send the text to the model.
    Chat(String),
}

/// Parses one line of console input.
///
/// ```
/// # use ollama_console::console::{ConsoleCommand, parse_command};
/// assert_eq!(parse_command("help"), ConsoleCommand::Help);
/// assert_eq!(parse_command("Help"), ConsoleCommand::Chat("Help".to_string()));
/// ```
pub fn parse_command(input: &str) -> ConsoleCommand {
    match input {
        "help" => ConsoleCommand::Help,
        "toggle-color-mode" => ConsoleCommand::ToggleColorMode,
        "clear-history" => ConsoleCommand::ClearHistory,
        _ => ConsoleCommand::Chat(input.to_string()),
    }
}

/// What dispatching one line did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The help text was shown.
    Help,
    /// The color mode changed to the contained mode.
    ColorMode(ColorMode),
    /// History was emptied.
    HistoryCleared,
    /// A reply is streaming on the returned task.
    Streaming(JoinHandle<StreamSummary>),
    /// The server is unavailable, so help was shown instead of chatting.
    HelpFallback,
}

/// Routes console input to the component that handles it.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<SessionState>,
    history: History,
    lines: LineStore,
    keys: Arc<LineKeys>,
    help: HelpRenderer,
    session: Arc<SessionController>,
}

impl Dispatcher {
    pub fn new(
        state: Arc<SessionState>,
        history: History,
        lines: LineStore,
        keys: Arc<LineKeys>,
        help: HelpRenderer,
        session: Arc<SessionController>,
    ) -> Self {
        Self {
            state,
            history,
            lines,
            keys,
            help,
            session,
        }
    }

    /// Handle one line of input.
    ///
    /// Every line is recorded as a user turn and echoed before it is acted
    /// on, commands included. Help renders before this returns; a chat
    /// reply streams on a task whose handle is returned. That task stops
    /// when `token` is cancelled.
    pub async fn dispatch(&self, raw: &str, token: &CancellationToken) -> Result<DispatchOutcome> {
        COMMANDS_DISPATCHED.click();
        self.history.append(HistoryEntry::user(raw))?;
        self.lines
            .push(Line::input(self.keys.next("input"), raw))
            .await?;

        match parse_command(raw) {
            ConsoleCommand::Help => {
                self.help.show_help(token).await?;
                Ok(DispatchOutcome::Help)
            }
            ConsoleCommand::ToggleColorMode => {
                let mode = self.state.toggle_color_mode()?;
                tracing::debug!(%mode, "color mode toggled");
                Ok(DispatchOutcome::ColorMode(mode))
            }
            ConsoleCommand::ClearHistory => {
                self.history.clear()?;
                Ok(DispatchOutcome::HistoryCleared)
            }
            ConsoleCommand::Chat(prompt) => {
                if self.state.is_available() {
                    let task = self.session.spawn_send(prompt, token.clone());
                    Ok(DispatchOutcome::Streaming(task))
                } else {
                    self.help.show_help(token).await?;
                    Ok(DispatchOutcome::HelpFallback)
                }
            }
        }
    }
}
