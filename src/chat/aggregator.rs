use crate::chat::log::{ChatMessage, MessageLog};
use crate::llm::{ChatStream, StreamEvent};

/// How a turn's stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Failed(String),
}

/// Summary of one consumed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Chunks received, empty ones included
    pub chunks: usize,
    /// Characters of reply text appended to the log
    pub characters: usize,
    /// Whether an assistant message was added to the log
    pub reply_created: bool,
}

/// Folds the chunk sequence of a single stream into the message log.
///
/// The assistant message is only created once real text arrives, so a stream
/// that fails before its first token leaves no empty bubble behind.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    first_chunk_seen: bool,
    chunks: usize,
    characters: usize,
    finished: bool,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one stream event. Returns the outcome once the stream has ended;
    /// anything arriving after that is ignored.
    pub fn apply(&mut self, event: StreamEvent, log: &mut MessageLog) -> Option<TurnOutcome> {
        if self.finished {
            tracing::debug!(?event, "ignoring event after end of stream");
            return None;
        }

        match event {
            StreamEvent::Chunk(chunk) => {
                self.chunks += 1;
                self.characters += chunk.chars().count();
                if !self.first_chunk_seen && !chunk.is_empty() {
                    log.append(ChatMessage::assistant(chunk));
                    self.first_chunk_seen = true;
                } else {
                    log.append_chunk_to_last(&chunk);
                }
                None
            }
            StreamEvent::Completed => Some(self.finish(TurnStatus::Completed)),
            StreamEvent::Failed(reason) => Some(self.finish(TurnStatus::Failed(reason))),
        }
    }

    /// Consume `events` until the stream ends. A channel that closes without
    /// a terminal event counts as a failure.
    pub async fn consume(&mut self, events: &mut ChatStream, log: &mut MessageLog) -> TurnOutcome {
        loop {
            let event = events.recv().await.unwrap_or_else(StreamEvent::disconnected);
            if let Some(outcome) = self.apply(event, log) {
                return outcome;
            }
        }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self, status: TurnStatus) -> TurnOutcome {
        self.finished = true;
        TurnOutcome {
            status,
            chunks: self.chunks,
            characters: self.characters,
            reply_created: self.first_chunk_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn log_with_user_turn() -> MessageLog {
        let mut log = MessageLog::seeded(ChatMessage::assistant("Welcome"));
        log.append(ChatMessage::user("Hi"));
        log
    }

    fn chunk(text: &str) -> StreamEvent {
        StreamEvent::Chunk(text.to_string())
    }

    #[test]
    fn concatenates_chunks_into_one_reply() {
        let mut log = log_with_user_turn();
        let mut aggregator = StreamAggregator::new();

        for text in ["", "Hel", "", "lo", "!"] {
            assert_eq!(aggregator.apply(chunk(text), &mut log), None);
        }
        let outcome = aggregator.apply(StreamEvent::Completed, &mut log).unwrap();

        let transcript = log.snapshot();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.get(1), Some(&ChatMessage::user("Hi")));
        assert_eq!(transcript.get(2), Some(&ChatMessage::assistant("Hello!")));
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.chunks, 5);
        assert_eq!(outcome.characters, 6);
        assert!(outcome.reply_created);
    }

    #[test]
    fn all_empty_chunks_create_no_reply() {
        let mut log = log_with_user_turn();
        let mut aggregator = StreamAggregator::new();

        aggregator.apply(chunk(""), &mut log);
        aggregator.apply(chunk(""), &mut log);
        let outcome = aggregator.apply(StreamEvent::Completed, &mut log).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.snapshot().last(), Some(&ChatMessage::user("Hi")));
        assert!(!outcome.reply_created);
    }

    #[test]
    fn failure_keeps_partial_reply() {
        let mut log = log_with_user_turn();
        let mut aggregator = StreamAggregator::new();

        aggregator.apply(chunk("Let me check"), &mut log);
        let outcome = aggregator
            .apply(StreamEvent::Failed("connection reset".into()), &mut log)
            .unwrap();

        assert_eq!(outcome.status, TurnStatus::Failed("connection reset".into()));
        assert_eq!(outcome.characters, "Let me check".len());
        assert_eq!(log.snapshot().last(), Some(&ChatMessage::assistant("Let me check")));
    }

    #[test]
    fn events_after_the_end_are_ignored() {
        let mut log = log_with_user_turn();
        let mut aggregator = StreamAggregator::new();

        aggregator.apply(StreamEvent::Completed, &mut log);
        assert!(aggregator.is_finished());
        assert_eq!(aggregator.apply(chunk("late"), &mut log), None);
        assert_eq!(aggregator.apply(StreamEvent::Completed, &mut log), None);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn characters_count_chars_not_bytes() {
        let mut log = log_with_user_turn();
        let mut aggregator = StreamAggregator::new();

        aggregator.apply(chunk("Niš "), &mut log);
        aggregator.apply(chunk("✅"), &mut log);
        let outcome = aggregator.apply(StreamEvent::Completed, &mut log).unwrap();

        assert_eq!(outcome.chunks, 2);
        assert_eq!(outcome.characters, 5);
    }

    #[tokio::test]
    async fn consume_treats_a_closed_channel_as_failure() {
        let mut log = log_with_user_turn();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(chunk("partial")).await.unwrap();
        drop(tx);

        let outcome = StreamAggregator::new().consume(&mut rx, &mut log).await;

        assert!(matches!(outcome.status, TurnStatus::Failed(_)));
        assert_eq!(log.snapshot().last(), Some(&ChatMessage::assistant("partial")));
    }
}
