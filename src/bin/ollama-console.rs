//! Interactive console for chatting with a local Ollama server.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the default model on localhost:11434
//! ollama-console
//!
//! # Another host and model, persisting history between runs
//! ollama-console --host gpu-box --model mistral --store ~/.ollama-console.json
//!
//! # Show installed models and exit
//! ollama-console --list-models
//! ```
//!
//! # Commands
//!
//! - `help` - display the help message
//! - `toggle-color-mode` - toggle between light and dark mode
//! - `clear-history` - clear the command history
//!
//! Anything else is sent to the model. Ctrl+C stops the reply in progress;
//! Ctrl+D exits.

use std::io::{self, Stdout};
use std::sync::{Arc, Mutex, PoisonError};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ollama_console::console::{
    Console, ConsoleArgs, ConsoleConfig, DispatchOutcome, LineStore, SessionState,
    StreamOutcome,
};
use ollama_console::utils::time::iso8601;
use ollama_console::{JsonFileStore, ModelServer, Ollama, Storage, TerminalRenderer};

type SharedRenderer = Arc<AsyncMutex<TerminalRenderer<Stdout>>>;

/// Main entry point for the ollama-console application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ConsoleArgs::from_command_line_relaxed("ollama-console [OPTIONS]");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let list_models = args.list_models;
    let config = ConsoleConfig::from(args);
    let client = Ollama::with_options(Some(config.base_url()), Some(config.timeout))?;

    if list_models {
        std::process::exit(print_models(&client).await);
    }

    let storage = match &config.store_path {
        Some(path) => Storage::new(JsonFileStore::open(path)?),
        None => Storage::in_memory(),
    };
    let use_color = config.use_color;
    let mut console = Console::start(config, Arc::new(client), storage)?;
    console.spawn_prober();

    let renderer: SharedRenderer = Arc::new(AsyncMutex::new(TerminalRenderer::with_color(
        io::stdout(),
        use_color,
    )));
    let render_task = spawn_renderer(
        renderer.clone(),
        console.lines().clone(),
        console.state().clone(),
        console.token().child_token(),
    );

    // Ctrl+C cancels whatever the current input started.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let current_clone = current.clone();
    ctrlc::set_handler(move || {
        current_clone
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    })?;

    let dispatcher = console.dispatcher();
    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("> ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let token = console.token().child_token();
                *current.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();

                match dispatcher.dispatch(&line, &token).await {
                    Ok(DispatchOutcome::Streaming(task)) => match task.await {
                        Ok(summary) if summary.outcome == StreamOutcome::Cancelled => {
                            eprintln!("[interrupted]");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "stream task failed"),
                    },
                    Ok(_) => {}
                    Err(err) if err.is_cancelled() => eprintln!("[interrupted]"),
                    Err(err) => tracing::error!(error = %err, "command failed"),
                }
                settle(&renderer, console.lines(), console.state()).await;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "input error");
                break;
            }
        }
    }

    console.shutdown().await;
    if let Err(err) = render_task.await {
        tracing::warn!(error = %err, "renderer ended abnormally");
    }
    Ok(())
}

/// Print the installed models. Returns the process exit code.
async fn print_models(client: &Ollama) -> i32 {
    if !client.probe().await {
        eprintln!("Error: Ollama API is not available");
        return 1;
    }
    match client.list_models().await {
        Ok(list) => {
            println!("Ollama Models");
            for model in list.models() {
                println!();
                println!("    Name: {}", model.name);
                println!("    Modified At: {}", iso8601(model.modified_at));
                println!("    Size: {} bytes", model.size);
                println!(
                    "    Details: {}, {}",
                    model.details.format, model.details.family
                );
            }
            0
        }
        Err(err) => {
            eprintln!("Error: Failed to fetch models: {err}");
            1
        }
    }
}

/// Redraw whenever the line store publishes a new snapshot.
fn spawn_renderer(
    renderer: SharedRenderer,
    lines: LineStore,
    state: Arc<SessionState>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut updates = lines.subscribe();
        loop {
            let snapshot = updates.borrow_and_update().clone();
            if let Err(err) = renderer.lock().await.render(&snapshot, state.color_mode()) {
                tracing::warn!(error = %err, "could not write to terminal");
            }
            tokio::select! {
                _ = token.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        if let Err(err) = renderer.lock().await.finish() {
            tracing::warn!(error = %err, "could not write to terminal");
        }
    })
}

/// Draw the latest snapshot and end the line so the next prompt starts clean.
async fn settle(renderer: &SharedRenderer, lines: &LineStore, state: &SessionState) {
    let mut renderer = renderer.lock().await;
    let result = renderer
        .render(&lines.snapshot(), state.color_mode())
        .and_then(|()| renderer.finish());
    if let Err(err) = result {
        tracing::warn!(error = %err, "could not write to terminal");
    }
}
