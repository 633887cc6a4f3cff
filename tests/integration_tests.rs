//! Integration tests for the console against a loopback HTTP server.
//! The server answers each accepted connection with one canned response.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use ollama_console::console::{
        Console, ConsoleConfig, DispatchOutcome, HelpStyle, StreamOutcome, WELCOME_AVAILABLE,
        WELCOME_KEY,
    };
    use ollama_console::{
        ChatRequest, HistoryEntry, ModelServer, Ollama, Role, StreamRequest, Storage,
    };

    struct Canned {
        status: u16,
        content_type: &'static str,
        body: String,
    }

    fn json(status: u16, body: &str) -> Canned {
        Canned {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn ndjson(lines: &[&str]) -> Canned {
        let mut body = lines.join("\n");
        body.push('\n');
        Canned {
            status: 200,
            content_type: "application/x-ndjson",
            body,
        }
    }

    /// Serve `responses` in order, one per connection. The task yields the
    /// raw requests it saw.
    async fn serve(responses: Vec<Canned>) -> (Ollama, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut seen = Vec::new();
            for canned in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    canned.status,
                    canned.content_type,
                    canned.body.len(),
                    canned.body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            seen
        });
        let client = Ollama::with_options(
            Some(format!("http://{addr}/api")),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        (client, server)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    fn config() -> ConsoleConfig {
        ConsoleConfig::new().with_help_style(HelpStyle::Instant)
    }

    #[tokio::test]
    async fn probe_accepts_empty_model_list() {
        let (client, server) = serve(vec![json(200, r#"{"models":[]}"#)]).await;
        assert!(client.probe().await);
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/tags "));
    }

    #[tokio::test]
    async fn probe_rejects_missing_models_and_errors() {
        let (client, _server) = serve(vec![
            json(200, r#"{"status":"ok"}"#),
            json(200, r#"{"models":"none"}"#),
            json(500, r#"{"error":"boom"}"#),
        ])
        .await;
        assert!(!client.probe().await);
        assert!(!client.probe().await);
        assert!(!client.probe().await);
    }

    #[tokio::test]
    async fn lists_models() {
        let (client, _server) = serve(vec![json(
            200,
            r#"{"models":[{"name":"llama3.1:8b","modified_at":"2024-07-23T10:11:12Z","size":4661224676,"digest":"42182419e950","details":{"format":"gguf","family":"llama"}}]}"#,
        )])
        .await;
        let list = client.list_models().await.unwrap();
        assert_eq!(list.models().len(), 1);
        let model = &list.models()[0];
        assert_eq!(model.name, "llama3.1:8b");
        assert_eq!(model.size, 4661224676);
        assert_eq!(model.details.format, "gguf");
        assert_eq!(model.details.family, "llama");
    }

    #[tokio::test]
    async fn chat_streams_into_the_console() {
        let (client, server) = serve(vec![
            json(200, r#"{"models":[]}"#),
            ndjson(&[
                r#"{"model":"llama3.1:8b","message":{"role":"assistant","content":"Hel"},"done":false}"#,
                r#"{"model":"llama3.1:8b","message":{"role":"assistant","content":"lo"},"done":false}"#,
                r#"{"model":"llama3.1:8b","message":{"role":"assistant","content":""},"done":true}"#,
            ]),
        ])
        .await;
        let console = Console::start(config(), Arc::new(client), Storage::in_memory()).unwrap();
        console.prober().tick().await.unwrap();
        assert_eq!(
            console.lines().content(WELCOME_KEY).as_deref(),
            Some(WELCOME_AVAILABLE)
        );

        let outcome = console
            .dispatcher()
            .dispatch("Why is the sky blue?", console.token())
            .await
            .unwrap();
        let DispatchOutcome::Streaming(task) = outcome else {
            panic!("expected a stream");
        };
        let summary = task.await.unwrap();
        assert_eq!(summary.outcome, StreamOutcome::Completed);
        assert_eq!(summary.content, "Hello");

        let history = console.history().all();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Hello");
        console.shutdown().await;

        let requests = server.await.unwrap();
        let chat = &requests[1];
        assert!(chat.starts_with("POST /api/chat "));
        let body = &chat[chat.find("\r\n\r\n").unwrap() + 4..];
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["content"], "Why is the sky blue?");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn unknown_model_is_not_found() {
        let (client, _server) =
            serve(vec![json(404, r#"{"error":"model 'nope' not found"}"#)]).await;
        let request = StreamRequest::from(ChatRequest::new("nope", vec![HistoryEntry::user("hi")]));
        let err = match client.stream(request).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("model 'nope' not found"));
    }

    #[tokio::test]
    async fn server_error_mid_stream_ends_the_stream() {
        let (client, _server) = serve(vec![ndjson(&[
            r#"{"message":{"content":"par"},"done":false}"#,
            r#"{"error":"model runner crashed"}"#,
        ])])
        .await;
        let request = StreamRequest::from(ChatRequest::new("m", vec![HistoryEntry::user("hi")]));
        let mut stream = client.stream(request).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text, "par");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("model runner crashed"));
    }

    #[tokio::test]
    async fn malformed_line_aborts_with_partial_reply() {
        let (client, _server) = serve(vec![ndjson(&[
            r#"{"message":{"content":"Hel"},"done":false}"#,
            r#"{"message":{"content":"#,
        ])])
        .await;
        let console = Console::start(config(), Arc::new(client), Storage::in_memory()).unwrap();
        console.state().set_available(true).unwrap();
        let outcome = console
            .dispatcher()
            .dispatch("hi", console.token())
            .await
            .unwrap();
        let DispatchOutcome::Streaming(task) = outcome else {
            panic!("expected a stream");
        };
        let summary = task.await.unwrap();
        assert_eq!(summary.outcome, StreamOutcome::Aborted);
        assert_eq!(summary.content, "Hel");
        assert_eq!(console.history().all()[1].content, "Hel");
        console.shutdown().await;
    }

    #[tokio::test]
    async fn generate_mode_posts_the_prompt() {
        let (client, server) = serve(vec![ndjson(&[
            r#"{"response":"4","done":false}"#,
            r#"{"response":"","done":true}"#,
        ])])
        .await;
        let config = config().with_request_mode(ollama_console::console::RequestMode::SingleTurn);
        let console = Console::start(config, Arc::new(client), Storage::in_memory()).unwrap();
        console.state().set_available(true).unwrap();
        let DispatchOutcome::Streaming(task) = console
            .dispatcher()
            .dispatch("2+2?", console.token())
            .await
            .unwrap()
        else {
            panic!("expected a stream");
        };
        assert_eq!(task.await.unwrap().content, "4");
        console.shutdown().await;

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/generate "));
        assert!(requests[0].contains(r#""prompt":"2+2?""#));
    }
}
