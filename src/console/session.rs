//! The streaming session controller.
//!
//! One call to [`SessionController::send`] reserves an empty output line,
//! issues a streaming request, appends every non-empty chunk to that line as
//! it arrives and finally records the accumulated reply in history.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ModelServer;
use crate::console::history::History;
use crate::console::lines::{Line, LineKeys, LineStore};
use crate::error::Error;
use crate::observability::{
    STREAM_CANCELLED, STREAM_DURATION, STREAM_ERRORS, STREAM_REQUESTS, STREAM_TTFB,
};
use crate::types::{ChatRequest, GenerateRequest, HistoryEntry, StreamRequest};

/// Default model requested from the server.
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Which endpoint a prompt goes to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum RequestMode {
    /// `POST /chat` with the whole stored history as context.
    #[default]
    Chat,
    /// `POST /generate` with only the prompt.
    SingleTurn,
}

/// How a send ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The server signalled completion or closed the stream.
    Completed,
    /// A malformed chunk or mid-stream error stopped processing early.
    Aborted,
    /// The request itself failed; nothing was streamed.
    Failed,
    /// The view was torn down; neither lines nor history were touched after.
    Cancelled,
}

/// What one send produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Key of the reserved output line, if one was reserved.
    pub key: Option<String>,
    /// Text accumulated on the output line.
    pub content: String,
    /// Number of non-empty chunks appended.
    pub chunks: usize,
    pub outcome: StreamOutcome,
}

impl StreamSummary {
    fn cancelled(key: Option<String>, chunks: usize) -> Self {
        STREAM_CANCELLED.click();
        Self {
            key,
            content: String::new(),
            chunks,
            outcome: StreamOutcome::Cancelled,
        }
    }
}

/// Progress of one send through its stream.
struct StreamCursor {
    key: String,
    chunks: usize,
    terminated: bool,
}

impl StreamCursor {
    fn cancelled(self) -> StreamSummary {
        StreamSummary::cancelled(Some(self.key), self.chunks)
    }
}

/// Drives streaming requests into the line store and history.
pub struct SessionController {
    server: Arc<dyn ModelServer>,
    lines: LineStore,
    keys: Arc<LineKeys>,
    history: History,
    model: String,
    mode: RequestMode,
}

impl SessionController {
    pub fn new(
        server: Arc<dyn ModelServer>,
        lines: LineStore,
        keys: Arc<LineKeys>,
        history: History,
        model: impl Into<String>,
        mode: RequestMode,
    ) -> Self {
        Self {
            server,
            lines,
            keys,
            history,
            model: model.into(),
            mode,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// The request `prompt` turns into.
    ///
    /// Chat requests carry the stored history, which already ends with the
    /// user's prompt when sent through the dispatcher.
    pub fn request_for(&self, prompt: &str) -> StreamRequest {
        match self.mode {
            RequestMode::Chat => ChatRequest::new(&self.model, self.history.all()).into(),
            RequestMode::SingleTurn => GenerateRequest::new(&self.model, prompt).into(),
        }
    }

    /// Stream the reply to `prompt` into a fresh output line.
    ///
    /// Failures are logged and reported through the returned summary rather
    /// than propagated; the console keeps running regardless.
    pub async fn send(&self, prompt: &str, token: CancellationToken) -> StreamSummary {
        STREAM_REQUESTS.click();
        let request = self.request_for(prompt);

        if token.is_cancelled() {
            return StreamSummary::cancelled(None, 0);
        }
        let key = self.keys.next("output");
        if let Err(err) = self.lines.push(Line::output(key.clone(), "")).await {
            tracing::debug!(error = %err, "could not reserve output line");
            return StreamSummary::cancelled(None, 0);
        }

        let mut cursor = StreamCursor {
            key,
            chunks: 0,
            terminated: false,
        };

        let started = Instant::now();
        tracing::debug!(model = request.model(), endpoint = request.path(), "sending prompt");
        let response = tokio::select! {
            _ = token.cancelled() => return cursor.cancelled(),
            response = self.server.stream(request) => response,
        };
        let mut stream = match response {
            Ok(stream) => stream,
            Err(err) => {
                STREAM_ERRORS.click();
                tracing::error!(error = %err, "failed to fetch data");
                return StreamSummary {
                    key: Some(cursor.key),
                    content: String::new(),
                    chunks: 0,
                    outcome: StreamOutcome::Failed,
                };
            }
        };

        let mut first = true;
        let mut outcome = StreamOutcome::Completed;
        while !cursor.terminated {
            let item = tokio::select! {
                _ = token.cancelled() => return cursor.cancelled(),
                item = stream.next() => item,
            };
            let chunk = match item {
                None => {
                    cursor.terminated = true;
                    continue;
                }
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    if err.is_malformed_chunk() {
                        tracing::error!(error = %err, "error parsing JSON chunk");
                    } else {
                        tracing::error!(error = %err, "stream failed mid-response");
                    }
                    outcome = StreamOutcome::Aborted;
                    cursor.terminated = true;
                    continue;
                }
            };
            if first {
                first = false;
                STREAM_TTFB.add(started.elapsed().as_secs_f64());
            }
            if chunk.done {
                cursor.terminated = true;
                continue;
            }
            if chunk.text.is_empty() {
                continue;
            }
            if token.is_cancelled() {
                return cursor.cancelled();
            }
            match self.lines.append(&cursor.key, &chunk.text).await {
                Ok(()) => cursor.chunks += 1,
                Err(Error::Cancelled { .. }) => return cursor.cancelled(),
                Err(err) => {
                    STREAM_ERRORS.click();
                    tracing::error!(error = %err, "could not append chunk");
                    outcome = StreamOutcome::Aborted;
                    cursor.terminated = true;
                }
            }
        }

        if token.is_cancelled() {
            return cursor.cancelled();
        }
        let content = self.lines.content(&cursor.key).unwrap_or_default();
        if let Err(err) = self.history.append(HistoryEntry::assistant(content.clone())) {
            tracing::error!(error = %err, "could not record reply in history");
        }
        STREAM_DURATION.add(started.elapsed().as_secs_f64());
        tracing::debug!(chunks = cursor.chunks, ?outcome, "stream finished");
        StreamSummary {
            key: Some(cursor.key),
            content,
            chunks: cursor.chunks,
            outcome,
        }
    }

    /// Run [`send`](Self::send) on its own task.
    pub fn spawn_send(
        self: &Arc<Self>,
        prompt: String,
        token: CancellationToken,
    ) -> JoinHandle<StreamSummary> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.send(&prompt, token).await })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::stream;

    use crate::client::{ChunkStream, ModelServer};
    use crate::error::{Error, Result};
    use crate::types::{ModelListResponse, StreamChunk, StreamRequest};

    /// A scripted response to one stream call.
    pub enum Script {
        Chunks(Vec<Result<StreamChunk>>),
        Fail(Error),
        Pending,
    }

    /// An in-process [`ModelServer`] for tests.
    pub struct FakeServer {
        pub available: Mutex<bool>,
        pub scripts: Mutex<VecDeque<Script>>,
        pub requests: Mutex<Vec<StreamRequest>>,
        pub probes: Mutex<usize>,
    }

    impl FakeServer {
        pub fn new(available: bool) -> Self {
            Self {
                available: Mutex::new(available),
                scripts: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                probes: Mutex::new(0),
            }
        }

        pub fn script(self, script: Script) -> Self {
            self.scripts.lock().unwrap().push_back(script);
            self
        }

        pub fn set_available(&self, available: bool) {
            *self.available.lock().unwrap() = available;
        }

        pub fn requests(&self) -> Vec<StreamRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ModelServer for FakeServer {
        async fn probe(&self) -> bool {
            *self.probes.lock().unwrap() += 1;
            *self.available.lock().unwrap()
        }

        async fn list_models(&self) -> Result<ModelListResponse> {
            Ok(ModelListResponse::new(Vec::new()))
        }

        async fn stream(&self, request: StreamRequest) -> Result<ChunkStream> {
            self.requests.lock().unwrap().push(request);
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Script::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
                Some(Script::Fail(err)) => Err(err),
                Some(Script::Pending) => Ok(Box::pin(stream::pending())),
                None => Ok(Box::pin(stream::iter(vec![Ok(StreamChunk::done())]))),
            }
        }
    }
}
