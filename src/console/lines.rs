//! The ordered, keyed collection of renderable console lines.
//!
//! All mutations go through a single writer task. Each mutation copies the
//! current snapshot on write, applies the change and publishes the new
//! snapshot, so readers never see a half-applied update and two concurrent
//! appends to the same line cannot overwrite one another.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Key of the line the prober rewrites.
pub const WELCOME_KEY: &str = "welcome-0";

/// Whether a line echoes user input or shows console output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LineKind {
    Input,
    Output,
}

/// One renderable unit of console output or echoed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub key: String,
    pub kind: LineKind,
    pub content: String,
}

impl Line {
    /// An output line.
    pub fn output(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: LineKind::Output,
            content: content.into(),
        }
    }

    /// An input echo line.
    pub fn input(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: LineKind::Input,
            content: content.into(),
        }
    }
}

/// Generates line keys that stay unique for the life of a store.
///
/// Keys combine a sequence number with a random component, e.g.
/// `output-7-3fa2c1d0`.
#[derive(Debug)]
pub struct LineKeys {
    next: AtomicU64,
}

impl LineKeys {
    /// A generator starting at sequence number one.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// A fresh key under `prefix`.
    pub fn next(&self, prefix: &str) -> String {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{seq}-{:08x}", rand::random::<u32>())
    }
}

impl Default for LineKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable snapshot of the line store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lines {
    order: Vec<String>,
    by_key: HashMap<String, Line>,
}

impl Lines {
    /// Lines in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.order.iter().filter_map(|key| self.by_key.get(key))
    }

    /// The line under `key`.
    pub fn get(&self, key: &str) -> Option<&Line> {
        self.by_key.get(key)
    }

    /// Content of the line under `key`.
    pub fn content(&self, key: &str) -> Option<&str> {
        self.get(key).map(|line| line.content.as_str())
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when there are no lines.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn push(&mut self, line: Line) -> Result<()> {
        if self.by_key.contains_key(&line.key) {
            return Err(Error::validation(
                "line key already in use",
                Some(line.key),
            ));
        }
        self.order.push(line.key.clone());
        self.by_key.insert(line.key.clone(), line);
        Ok(())
    }

    fn line_mut(&mut self, key: &str) -> Result<&mut Line> {
        self.by_key.get_mut(key).ok_or_else(|| {
            Error::not_found(
                "no line with this key",
                Some("line".to_string()),
                Some(key.to_string()),
            )
        })
    }

    fn append(&mut self, key: &str, text: &str) -> Result<()> {
        let line = self.line_mut(key)?;
        if line.kind == LineKind::Input {
            return Err(Error::validation(
                "input lines cannot be appended to",
                Some(key.to_string()),
            ));
        }
        line.content.push_str(text);
        Ok(())
    }

    fn replace(&mut self, key: &str, content: String) -> Result<()> {
        self.line_mut(key)?.content = content;
        Ok(())
    }
}

enum LineOp {
    Push(Line),
    Append { key: String, text: String },
    Replace { key: String, content: String },
}

struct Mutation {
    op: LineOp,
    ack: oneshot::Sender<Result<()>>,
}

/// Handle to the line store. Cheap to clone; all clones share one writer.
#[derive(Clone)]
pub struct LineStore {
    tx: mpsc::UnboundedSender<Mutation>,
    snapshot: watch::Receiver<Arc<Lines>>,
}

impl LineStore {
    /// Start the writer task. It stops when `token` is cancelled; later
    /// mutations fail with [`Error::Cancelled`].
    pub fn spawn(initial: Vec<Line>, token: CancellationToken) -> Result<(Self, JoinHandle<()>)> {
        let mut lines = Lines::default();
        for line in initial {
            lines.push(line)?;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<Mutation>();
        let (publish, snapshot) = watch::channel(Arc::new(lines));

        let writer = tokio::spawn(async move {
            loop {
                let mutation = tokio::select! {
                    _ = token.cancelled() => break,
                    mutation = rx.recv() => match mutation {
                        Some(mutation) => mutation,
                        None => break,
                    },
                };
                let mut next = publish.borrow().clone();
                let lines = Arc::make_mut(&mut next);
                let result = match mutation.op {
                    LineOp::Push(line) => lines.push(line),
                    LineOp::Append { key, text } => lines.append(&key, &text),
                    LineOp::Replace { key, content } => lines.replace(&key, content),
                };
                if result.is_ok() {
                    publish.send_replace(next);
                }
                let _ = mutation.ack.send(result);
            }
        });

        Ok((Self { tx, snapshot }, writer))
    }

    async fn apply(&self, op: LineOp) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Mutation { op, ack })
            .map_err(|_| Error::cancelled("line store is shut down"))?;
        done.await
            .map_err(|_| Error::cancelled("line store is shut down"))?
    }

    /// Append a new line at the end.
    pub async fn push(&self, line: Line) -> Result<()> {
        self.apply(LineOp::Push(line)).await
    }

    /// Append `text` to the content of an output line.
    pub async fn append(&self, key: &str, text: &str) -> Result<()> {
        self.apply(LineOp::Append {
            key: key.to_string(),
            text: text.to_string(),
        })
        .await
    }

    /// Replace the content of a line.
    pub async fn replace(&self, key: &str, content: impl Into<String>) -> Result<()> {
        self.apply(LineOp::Replace {
            key: key.to_string(),
            content: content.into(),
        })
        .await
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<Lines> {
        self.snapshot.borrow().clone()
    }

    /// Content of the line under `key` in the latest snapshot.
    pub fn content(&self, key: &str) -> Option<String> {
        self.snapshot.borrow().content(key).map(str::to_string)
    }

    /// A receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Lines>> {
        self.snapshot.clone()
    }
}
