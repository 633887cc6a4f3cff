//! Wiring for one console view: shared state, the line store and its
//! background tasks, torn down together.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ModelServer;
use crate::console::commands::Dispatcher;
use crate::console::config::ConsoleConfig;
use crate::console::help::HelpRenderer;
use crate::console::history::History;
use crate::console::lines::{Line, LineKeys, LineStore, WELCOME_KEY};
use crate::console::prober::Prober;
use crate::console::session::SessionController;
use crate::console::state::SessionState;
use crate::error::Result;
use crate::store::Storage;

/// A running console view.
pub struct Console {
    config: ConsoleConfig,
    state: Arc<SessionState>,
    history: History,
    lines: LineStore,
    keys: Arc<LineKeys>,
    server: Arc<dyn ModelServer>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Console {
    /// Load state from `storage` and start the line store with an empty
    /// welcome line. Must be called within a tokio runtime.
    pub fn start(
        config: ConsoleConfig,
        server: Arc<dyn ModelServer>,
        storage: Storage,
    ) -> Result<Self> {
        let state = Arc::new(SessionState::initialize(storage.clone())?);
        let history = History::new(storage, config.history_size);
        let token = CancellationToken::new();
        let (lines, writer) = LineStore::spawn(vec![Line::output(WELCOME_KEY, "")], token.clone())?;
        Ok(Self {
            config,
            state,
            history,
            lines,
            keys: Arc::new(LineKeys::new()),
            server,
            token,
            tasks: vec![writer],
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn lines(&self) -> &LineStore {
        &self.lines
    }

    /// The view's lifetime token. Cancelled by [`shutdown`](Self::shutdown).
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// A prober bound to this view.
    pub fn prober(&self) -> Prober {
        Prober::new(self.server.clone(), self.lines.clone(), self.state.clone())
    }

    /// Start periodic probing at the configured interval.
    pub fn spawn_prober(&mut self) {
        let task = self
            .prober()
            .spawn(self.config.probe_interval, self.token.child_token());
        self.tasks.push(task);
    }

    /// A dispatcher bound to this view.
    pub fn dispatcher(&self) -> Dispatcher {
        let help = HelpRenderer::new(self.lines.clone(), self.keys.clone(), self.config.help_style);
        let session = Arc::new(SessionController::new(
            self.server.clone(),
            self.lines.clone(),
            self.keys.clone(),
            self.history.clone(),
            self.config.model.clone(),
            self.config.request_mode,
        ));
        Dispatcher::new(
            self.state.clone(),
            self.history.clone(),
            self.lines.clone(),
            self.keys.clone(),
            help,
            session,
        )
    }

    /// Cancel everything started for this view and wait for it to stop.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "console task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::console::commands::DispatchOutcome;
    use crate::console::help::HelpStyle;
    use crate::console::prober::WELCOME_AVAILABLE;
    use crate::console::session::StreamOutcome;
    use crate::console::session::testing::{FakeServer, Script};
    use crate::types::StreamChunk;

    fn config() -> ConsoleConfig {
        ConsoleConfig::new()
            .with_help_style(HelpStyle::Instant)
            .with_probe_interval(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn starts_with_empty_welcome_line() {
        let console = Console::start(
            config(),
            Arc::new(FakeServer::new(true)),
            Storage::in_memory(),
        )
        .unwrap();
        assert_eq!(console.lines().content(WELCOME_KEY).as_deref(), Some(""));
        assert!(!console.state().is_available());
        console.shutdown().await;
    }

    #[tokio::test]
    async fn probe_then_chat() {
        let server = FakeServer::new(true)
            .script(Script::Chunks(vec![Ok(StreamChunk::text("pong"))]));
        let console = Console::start(config(), Arc::new(server), Storage::in_memory()).unwrap();
        console.prober().tick().await.unwrap();
        assert_eq!(
            console.lines().content(WELCOME_KEY).as_deref(),
            Some(WELCOME_AVAILABLE)
        );

        let outcome = console
            .dispatcher()
            .dispatch("ping", console.token())
            .await
            .unwrap();
        let DispatchOutcome::Streaming(task) = outcome else {
            panic!("expected a stream");
        };
        assert_eq!(task.await.unwrap().content, "pong");
        assert_eq!(console.history().len(), 2);
        console.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_prober_and_line_store() {
        let server = Arc::new(FakeServer::new(true));
        let mut console =
            Console::start(config(), server.clone(), Storage::in_memory()).unwrap();
        console.spawn_prober();
        tokio::time::sleep(Duration::from_millis(150)).await;
        let lines = console.lines().clone();
        console.shutdown().await;

        let probes = *server.probes.lock().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*server.probes.lock().unwrap(), probes);
        assert!(lines.replace(WELCOME_KEY, "x").await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn teardown_cancels_streams_in_flight() {
        let server = FakeServer::new(true).script(Script::Pending);
        let console = Console::start(config(), Arc::new(server), Storage::in_memory()).unwrap();
        console.state().set_available(true).unwrap();
        let outcome = console
            .dispatcher()
            .dispatch("hang", console.token())
            .await
            .unwrap();
        let DispatchOutcome::Streaming(task) = outcome else {
            panic!("expected a stream");
        };
        let history = console.history().clone();
        console.shutdown().await;
        assert_eq!(task.await.unwrap().outcome, StreamOutcome::Cancelled);
        assert_eq!(history.len(), 1);
    }
}
