use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::ndjson::process_ndjson;
use crate::observability::{PROBE_FAILURES, PROBES};
use crate::types::{
    ChatChunk, GenerateChunk, ModelListResponse, StreamChunk, StreamRequest, WireChunk,
};

/// Host the console talks to unless told otherwise.
pub const DEFAULT_HOST: &str = "localhost";
/// Ollama's default port.
pub const DEFAULT_PORT: u16 = 11434;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A boxed stream of normalized response chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// The operations the console needs from a model server.
///
/// [`Ollama`] talks to a real server; tests substitute in-process fakes.
#[async_trait::async_trait]
pub trait ModelServer: Send + Sync {
    /// Returns true when the server answers `GET /tags` with a `models` array.
    ///
    /// Fails closed: any error is reported as unavailable.
    async fn probe(&self) -> bool;

    /// Lists the locally installed models.
    async fn list_models(&self) -> Result<ModelListResponse>;

    /// Issues a streaming request and returns its chunks in arrival order.
    async fn stream(&self, request: StreamRequest) -> Result<ChunkStream>;
}

/// Client for the Ollama HTTP API.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl Ollama {
    /// Create a client for `http://localhost:11434/api`.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `base_url` is the API root, e.g. `http://gpu-box:11434/api`.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => base_url_for(DEFAULT_HOST, DEFAULT_PORT),
        };
        let base_url = normalize_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The API root all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(error_message),
            404 => Error::not_found(error_message, Some("model".to_string()), None),
            408 => Error::timeout(error_message, None),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(status_code, error_message),
        }
    }

    async fn get_tags(&self) -> Result<Response> {
        let response = self
            .client
            .get(self.endpoint("tags")?)
            .headers(self.default_headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    async fn check_available(&self) -> Result<bool> {
        let response = self.get_tags().await?;
        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        Ok(body
            .get("models")
            .is_some_and(serde_json::Value::is_array))
    }
}

#[async_trait::async_trait]
impl ModelServer for Ollama {
    async fn probe(&self) -> bool {
        PROBES.click();
        match self.check_available().await {
            Ok(available) => {
                if !available {
                    PROBE_FAILURES.click();
                    tracing::debug!("server answered without a models array");
                }
                available
            }
            Err(err) => {
                PROBE_FAILURES.click();
                tracing::debug!(error = %err, "error checking Ollama availability");
                false
            }
        }
    }

    async fn list_models(&self) -> Result<ModelListResponse> {
        let response = self.get_tags().await?;
        response.json::<ModelListResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    async fn stream(&self, request: StreamRequest) -> Result<ChunkStream> {
        let url = self.endpoint(request.path())?;

        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        // Convert reqwest errors to our error type
        let bytes = Box::pin(response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
            })
        }));

        let chunks: ChunkStream = match request {
            StreamRequest::Chat(_) => Box::pin(
                process_ndjson::<_, WireChunk<ChatChunk>>(bytes).map(normalize_chunk::<ChatChunk>),
            ),
            StreamRequest::Generate(_) => Box::pin(
                process_ndjson::<_, WireChunk<GenerateChunk>>(bytes)
                    .map(normalize_chunk::<GenerateChunk>),
            ),
        };
        Ok(chunks)
    }
}

/// Build the API root for a host and port.
pub fn base_url_for(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/api/")
}

fn normalize_base_url(base_url: &str) -> Result<Url> {
    // Url::join drops the last path segment unless it ends in a slash
    if base_url.ends_with('/') {
        Ok(Url::parse(base_url)?)
    } else {
        Ok(Url::parse(&format!("{base_url}/"))?)
    }
}

fn normalize_chunk<T: Into<StreamChunk>>(wire: Result<WireChunk<T>>) -> Result<StreamChunk> {
    match wire? {
        WireChunk::Chunk(chunk) => Ok(chunk.into()),
        WireChunk::Failure { error } => Err(Error::streaming(
            format!("server reported: {error}"),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Ollama::new().unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:11434/api/");
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = Ollama::with_options(
            Some("http://gpu-box:8080/api".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "http://gpu-box:8080/api/");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn endpoints_resolve_under_api_root() {
        let client = Ollama::new().unwrap();
        assert_eq!(
            client.endpoint("tags").unwrap().as_str(),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            client.endpoint("chat").unwrap().as_str(),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = Ollama::with_options(Some("not a url".to_string()), None).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn server_failures_become_errors() {
        let failure: Result<WireChunk<GenerateChunk>> = Ok(WireChunk::Failure {
            error: "out of memory".to_string(),
        });
        let err = normalize_chunk(failure).unwrap_err();
        assert!(err.to_string().contains("out of memory"));
    }

    #[tokio::test]
    async fn probe_fails_closed_without_server() {
        // Port 9 (discard) is essentially never serving HTTP on loopback
        let client = Ollama::with_options(
            Some("http://127.0.0.1:9/api".to_string()),
            Some(Duration::from_secs(2)),
        )
        .unwrap();
        assert!(!client.probe().await);
    }
}
