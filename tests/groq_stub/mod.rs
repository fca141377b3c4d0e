use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubReply {
    Content(String),
    Error { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

/// Minimal OpenAI-compatible `chat/completions` endpoint. Replies are served
/// in order; the last one repeats once the queue is drained.
pub struct GroqStub {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl GroqStub {
    pub fn spawn(replies: Vec<StubReply>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start groq stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/openai/v1");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_server = Arc::clone(&seen);
        let mut replies = VecDeque::from(replies);

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                if request.method() != &tiny_http::Method::Post
                    || request.url() != "/openai/v1/chat/completions"
                {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let Ok(parsed) = serde_json::from_str::<Value>(&body) else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid json").with_status_code(400),
                    );
                    continue;
                };

                let authorization = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.as_str().to_owned());
                seen_by_server.lock().unwrap().push(SeenRequest {
                    authorization,
                    body: parsed.clone(),
                });

                let reply = if replies.len() > 1 {
                    replies.pop_front()
                } else {
                    replies.front().cloned()
                };
                let (status, response_body) = match reply {
                    Some(StubReply::Content(content)) => (
                        200,
                        serde_json::json!({
                            "id": "chatcmpl-stub",
                            "object": "chat.completion",
                            "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                            "choices": [
                                {
                                    "index": 0,
                                    "message": { "role": "assistant", "content": content },
                                    "finish_reason": "stop"
                                }
                            ]
                        }),
                    ),
                    Some(StubReply::Error { status, message }) => (
                        status,
                        serde_json::json!({
                            "error": { "message": message, "type": "stub_error" }
                        }),
                    ),
                    None => (
                        500,
                        serde_json::json!({
                            "error": { "message": "no reply scripted", "type": "stub_error" }
                        }),
                    ),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            seen,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for GroqStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
