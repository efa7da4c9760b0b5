use crate::error::ServiceError;
use crate::llm::StreamEvent;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

/// One decoded `data:` frame of the chat stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Token(String),
    Error(String),
    Done,
}

#[derive(Deserialize)]
struct Payload {
    token: Option<String>,
    error: Option<String>,
}

/// Incremental server-sent-event decoder.
///
/// Bytes are buffered until a full line is available, so frames (and UTF-8
/// sequences) split across network reads decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(frame) = Self::decode_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that arrived without a newline
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line)
    }

    fn decode_line(line: &[u8]) -> Option<SseFrame> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);

        // comments, `event:` and `id:` lines carry nothing we use
        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data == "[DONE]" {
            return Some(SseFrame::Done);
        }

        match serde_json::from_str::<Payload>(data) {
            Ok(Payload {
                error: Some(error), ..
            }) => Some(SseFrame::Error(error)),
            Ok(Payload {
                token: Some(token), ..
            }) => Some(SseFrame::Token(token)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping undecodable stream frame");
                None
            }
        }
    }
}

/// Relay an SSE body onto `tx`, ending with exactly one terminal event.
///
/// A body that ends without `[DONE]` still counts as completed. Returns early
/// if the receiving side has gone away.
pub async fn relay_sse<S, B, E>(mut body: S, tx: &mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = ServiceError::Transport(e.to_string());
                let _ = tx.send(StreamEvent::Failed(error.to_string())).await;
                return;
            }
        };

        for frame in decoder.push(bytes.as_ref()) {
            if let Some(terminal) = forward(frame, tx).await {
                let _ = tx.send(terminal).await;
                return;
            }
            if tx.is_closed() {
                return;
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        if let Some(terminal) = forward(frame, tx).await {
            let _ = tx.send(terminal).await;
            return;
        }
    }
    let _ = tx.send(StreamEvent::Completed).await;
}

/// Send token frames through; hand terminal frames back to the caller
async fn forward(frame: SseFrame, tx: &mpsc::Sender<StreamEvent>) -> Option<StreamEvent> {
    match frame {
        SseFrame::Token(token) => {
            let _ = tx.send(StreamEvent::Chunk(token)).await;
            None
        }
        SseFrame::Error(error) => Some(StreamEvent::Failed(ServiceError::Remote(error).to_string())),
        SseFrame::Done => Some(StreamEvent::Completed),
    }
}
