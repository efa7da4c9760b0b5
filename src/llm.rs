//! Assistant chat streams.
//!
//! [`HttpChatService`] speaks the console's own contract:
//! `POST {api_url}/api/chat` with `{"chatId", "userMessage"}`, answered by a
//! server-sent event stream of `{"token"}` / `{"error"}` frames ending in
//! `[DONE]`. This is not the RPC surface of the hotel's web front end; a
//! backend has to expose this route for the console (or run with `--demo`).

use crate::error::ServiceError;
use crate::identity::ConversationId;
use crate::streaming::relay_sse;
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Lifecycle of one assistant reply stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental piece of reply text, possibly empty
    Chunk(String),
    /// Stream ended normally
    Completed,
    /// Stream ended abnormally
    Failed(String),
}

impl StreamEvent {
    /// Stand-in for a channel that closed without a terminal event
    pub fn disconnected() -> Self {
        StreamEvent::Failed("stream closed without completing".to_string())
    }
}

/// Receiving end of an open reply stream
pub type ChatStream = mpsc::Receiver<StreamEvent>;

/// The remote conversational service.
///
/// Opening never fails up front: transport problems arrive as a
/// [`StreamEvent::Failed`] on the returned stream. Implementations spawn
/// their work, so this must be called inside a tokio runtime.
pub trait ChatService: Send + Sync {
    fn open_stream(&self, conversation: &ConversationId, message: &str) -> ChatStream;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    chat_id: &'a ConversationId,
    user_message: &'a str,
}

/// Streams replies from `POST {api_url}/api/chat`
#[derive(Clone)]
pub struct HttpChatService {
    client: reqwest::Client,
    url: String,
}

impl HttpChatService {
    pub fn new(api_url: &str, connect_timeout: Duration) -> Result<Self> {
        // no overall timeout: a reply may legitimately stream for minutes
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client for chat")?;

        Ok(Self {
            client,
            url: format!("{}/api/chat", api_url.trim_end_matches('/')),
        })
    }

    async fn stream_reply(
        client: reqwest::Client,
        url: String,
        conversation: ConversationId,
        message: String,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ServiceError> {
        let payload = ChatRequest {
            chat_id: &conversation,
            user_message: &message,
        };

        let response = client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }

        relay_sse(response.bytes_stream(), &tx).await;
        Ok(())
    }
}

impl ChatService for HttpChatService {
    fn open_stream(&self, conversation: &ConversationId, message: &str) -> ChatStream {
        let (tx, rx) = mpsc::channel(1000);

        tracing::info!(%conversation, "opening chat stream");
        let client = self.client.clone();
        let url = self.url.clone();
        let conversation = conversation.clone();
        let message = message.to_string();

        tokio::spawn(async move {
            let tx_clone = tx.clone();
            if let Err(e) = Self::stream_reply(client, url, conversation, message, tx).await {
                tracing::warn!(error = %e, "chat stream failed");
                let _ = tx_clone.send(StreamEvent::Failed(e.to_string())).await;
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_camel_case_keys() {
        let id = ConversationId::generate();
        let body = serde_json::to_value(ChatRequest {
            chat_id: &id,
            user_message: "Hi",
        })
        .unwrap();

        assert_eq!(body["chatId"], id.as_str());
        assert_eq!(body["userMessage"], "Hi");
    }

    /// Answer exactly one HTTP request on a local port with `response`
    async fn serve_once(response: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // read the headers and the declared body before answering
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn collect(mut stream: ChatStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn error_status_fails_the_stream_with_the_status() {
        let api_url = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nboom",
        )
        .await;
        let service = HttpChatService::new(&api_url, Duration::from_secs(5)).unwrap();

        let events = collect(service.open_stream(&ConversationId::generate(), "Hi")).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Failed(reason) => {
                assert!(reason.contains("500"), "{reason}");
                assert!(reason.contains("boom"), "{reason}");
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn event_stream_is_relayed_in_order() {
        let api_url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
             data: {\"token\":\"Hel\"}\n\ndata: {\"token\":\"lo!\"}\n\ndata: [DONE]\n\n",
        )
        .await;
        let service = HttpChatService::new(&api_url, Duration::from_secs(5)).unwrap();

        let events = collect(service.open_stream(&ConversationId::generate(), "Hi")).await;

        assert_eq!(
            events,
            [
                StreamEvent::Chunk("Hel".into()),
                StreamEvent::Chunk("lo!".into()),
                StreamEvent::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_backend_fails_the_stream() {
        // port 9 (discard) is closed on test machines; the connect is refused
        let service = HttpChatService::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let mut stream = service.open_stream(&ConversationId::generate(), "Hi");

        let event = stream.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::Failed(_)));
    }
}
