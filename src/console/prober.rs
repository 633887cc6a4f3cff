//! Periodic availability checks and the welcome line they drive.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::ModelServer;
use crate::console::lines::{LineStore, WELCOME_KEY};
use crate::console::state::SessionState;
use crate::error::Result;
use crate::observability::WELCOME_RENDERS;

/// Default time between probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(5000);

/// Shortest interval `spawn` will tick at; shorter ones are raised to it.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(1);

/// Welcome text while the server answers.
pub const WELCOME_AVAILABLE: &str = "Welcome to the Ollama Web Console! 👋";
/// Welcome text while it does not.
pub const WELCOME_UNAVAILABLE: &str = "Ollama is not available. Please run ollama locally.";

/// The welcome text for an availability.
pub fn welcome_message(available: bool) -> &'static str {
    if available {
        WELCOME_AVAILABLE
    } else {
        WELCOME_UNAVAILABLE
    }
}

/// Probes the server and keeps the welcome line and stored availability
/// in step with the answer.
#[derive(Clone)]
pub struct Prober {
    server: Arc<dyn ModelServer>,
    lines: LineStore,
    state: Arc<SessionState>,
}

impl Prober {
    pub fn new(server: Arc<dyn ModelServer>, lines: LineStore, state: Arc<SessionState>) -> Self {
        Self {
            server,
            lines,
            state,
        }
    }

    /// Probe once. Returns true when the welcome line was rewritten.
    ///
    /// The line is only replaced when its text changes; availability is
    /// written on every tick.
    pub async fn tick(&self) -> Result<bool> {
        let available = self.server.probe().await;
        let message = welcome_message(available);
        let rewrite = self.lines.content(WELCOME_KEY).as_deref() != Some(message);
        if rewrite {
            self.lines.replace(WELCOME_KEY, message).await?;
            WELCOME_RENDERS.click();
            tracing::info!(available, "server availability changed");
        }
        self.state.set_available(available)?;
        Ok(rewrite)
    }

    /// Probe immediately and then every `interval` until `token` is
    /// cancelled. Probes never overlap; a slow probe delays the next one.
    /// An interval below [`MIN_PROBE_INTERVAL`] is raised to it.
    pub fn spawn(self, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let interval = interval.max(MIN_PROBE_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let result = tokio::select! {
                    _ = token.cancelled() => break,
                    result = self.tick() => result,
                };
                match result {
                    Ok(_) => {}
                    Err(err) if err.is_cancelled() => break,
                    Err(err) => tracing::warn!(error = %err, "availability probe failed"),
                }
            }
            tracing::debug!("prober stopped");
        })
    }
}
