//! Newline-delimited JSON processing for streaming responses.
//!
//! The Ollama server streams one JSON object per line. HTTP chunk boundaries
//! do not line up with those lines, so bytes are buffered and only complete
//! lines are decoded.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::observability::{STREAM_BYTES, STREAM_CHUNKS, STREAM_MALFORMED};
use crate::{Error, Result};

/// Process a stream of bytes into a stream of decoded JSON lines.
///
/// Blank lines are skipped. A final line without a trailing newline is decoded
/// when the byte stream ends. Lines that are not valid UTF-8 or do not decode
/// as `T` yield [`Error::MalformedChunk`]; transport errors are passed through.
pub fn process_ndjson<S, T>(byte_stream: S) -> impl Stream<Item = Result<T>> + Send
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (byte_stream, buffer, false),
        move |(mut stream, mut buffer, mut finished)| async move {
            loop {
                // First check if we have a complete line in the buffer
                while let Some(line) = extract_line(&mut buffer) {
                    if let Some(item) = parse_line(&line) {
                        return Some((item, (stream, buffer, finished)));
                    }
                }
                if finished {
                    // End of stream: whatever is left is the last line
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buffer);
                    match parse_line(&line) {
                        Some(item) => return Some((item, (stream, buffer, finished))),
                        None => return None,
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer, finished)));
                    }
                    None => {
                        finished = true;
                    }
                }
            }
        },
    )
}

/// Remove and return the first newline-terminated line, without the newline.
fn extract_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let newline = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=newline).collect();
    line.pop();
    Some(line)
}

/// Decode one line; `None` for blank lines.
fn parse_line<T: DeserializeOwned>(line: &[u8]) -> Option<Result<T>> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text,
        Err(e) => {
            STREAM_MALFORMED.click();
            return Some(Err(Error::malformed_chunk(
                format!("invalid UTF-8: {e}"),
                String::from_utf8_lossy(line),
                Some(Box::new(e)),
            )));
        }
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    STREAM_CHUNKS.click();
    match serde_json::from_str::<T>(text) {
        Ok(value) => Some(Ok(value)),
        Err(e) => {
            STREAM_MALFORMED.click();
            Some(Err(Error::malformed_chunk(
                e.to_string(),
                text,
                Some(Box::new(e)),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerateChunk;
    use futures::stream;

    fn chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = Result<Bytes>> + Unpin + Send {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn parse_single_line() {
        let body = chunks(vec![b"{\"response\":\"Hi\",\"done\":false}\n"]);
        let mut lines = Box::pin(process_ndjson::<_, GenerateChunk>(body));
        let chunk = lines.next().await.unwrap().unwrap();
        assert_eq!(chunk.response, "Hi");
        assert!(!chunk.done);
        assert!(lines.next().await.is_none());
    }

    #[tokio::test]
    async fn parse_multiple_lines_in_one_read() {
        let body = chunks(vec![
            b"{\"response\":\"a\",\"done\":false}\n{\"response\":\"b\",\"done\":false}\n{\"done\":true}\n",
        ]);
        let lines: Vec<_> = process_ndjson::<_, GenerateChunk>(body).collect().await;
        assert_eq!(lines.len(), 3);
        assert!(lines[2].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn handle_split_line() {
        // One object split across two reads, including a split UTF-8 sequence
        let body = chunks(vec![
            b"{\"response\":\"caf\xc3",
            b"\xa9\",\"done\":false}\n",
        ]);
        let mut lines = Box::pin(process_ndjson::<_, GenerateChunk>(body));
        let chunk = lines.next().await.unwrap().unwrap();
        assert_eq!(chunk.response, "café");
    }

    #[tokio::test]
    async fn trailing_line_without_newline() {
        let body = chunks(vec![b"{\"response\":\"x\",\"done\":false}\n{\"done\":true}"]);
        let lines: Vec<_> = process_ndjson::<_, GenerateChunk>(body).collect().await;
        assert_eq!(lines.len(), 2);
        assert!(lines[1].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn skips_blank_lines() {
        let body = chunks(vec![b"\n\r\n{\"done\":true}\r\n\n"]);
        let lines: Vec<_> = process_ndjson::<_, GenerateChunk>(body).collect().await;
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn handle_malformed_line() {
        let body = chunks(vec![b"not json\n"]);
        let mut lines = Box::pin(process_ndjson::<_, GenerateChunk>(body));
        let err = lines.next().await.unwrap().unwrap_err();
        assert!(err.is_malformed_chunk());
        assert!(err.to_string().contains("not json"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_malformed_chunk() {
        let body = chunks(vec![b"{\"response\":\"\xff\",\"done\":false}\n"]);
        let mut lines = Box::pin(process_ndjson::<_, GenerateChunk>(body));
        let err = lines.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::MalformedChunk { .. }));
        assert!(err.to_string().contains("invalid UTF-8"));
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"response\":\"a\",\"done\":false}\n")),
            Err(Error::streaming("connection reset", None)),
        ]);
        let lines: Vec<_> = process_ndjson::<_, GenerateChunk>(body).collect().await;
        assert!(lines[0].is_ok());
        assert!(matches!(lines[1], Err(Error::Streaming { .. })));
    }
}
