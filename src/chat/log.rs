//! The visible transcript.
//!
//! The log is a sequence of immutable snapshots. Every change builds a new
//! [`Transcript`] that shares the untouched messages with the previous one and
//! publishes it on a watch channel, which is how the view learns it must
//! redraw and jump back to the newest message.

use std::sync::Arc;
use strum::Display;
use tokio::sync::watch;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single turn shown in the chat panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Immutable snapshot of the transcript at one revision.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Arc<[Arc<ChatMessage>]>,
    revision: u64,
}

impl Transcript {
    fn empty() -> Self {
        Self {
            messages: Arc::from(Vec::new()),
            revision: 0,
        }
    }

    fn appended(&self, message: ChatMessage) -> Self {
        let mut messages: Vec<Arc<ChatMessage>> = self.messages.to_vec();
        messages.push(Arc::new(message));
        Self {
            messages: messages.into(),
            revision: self.revision + 1,
        }
    }

    /// Copy of this snapshot with `chunk` added to the last message's content.
    /// Earlier messages are shared, not copied.
    fn with_last_extended(&self, chunk: &str) -> Option<Self> {
        let (last, earlier) = self.messages.split_last()?;
        let mut replaced = ChatMessage::clone(last);
        replaced.content.push_str(chunk);

        let mut messages = earlier.to_vec();
        messages.push(Arc::new(replaced));
        Some(Self {
            messages: messages.into(),
            revision: self.revision + 1,
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index).map(|message| message.as_ref())
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last().map(|message| message.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().map(|message| message.as_ref())
    }

    /// Bumped on every change; the view resets its scroll position when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[cfg(test)]
    fn shared_entry(&self, index: usize) -> &Arc<ChatMessage> {
        &self.messages[index]
    }
}

/// Owner-side handle of the transcript.
///
/// Only the session holds one; everyone else observes snapshots through
/// [`MessageLog::subscribe`].
pub struct MessageLog {
    publisher: watch::Sender<Transcript>,
}

impl MessageLog {
    /// Create a log that already contains `welcome`.
    pub fn seeded(welcome: ChatMessage) -> Self {
        let (publisher, _) = watch::channel(Transcript::empty().appended(welcome));
        Self { publisher }
    }

    pub fn append(&mut self, message: ChatMessage) {
        let next = self.publisher.borrow().appended(message);
        self.publisher.send_replace(next);
    }

    /// Extend the last message with `chunk`. Empty chunks change nothing and
    /// publish nothing.
    pub fn append_chunk_to_last(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }

        let next = self.publisher.borrow().with_last_extended(chunk);
        match next {
            Some(next) => {
                self.publisher.send_replace(next);
            }
            None => tracing::warn!("dropping chunk: transcript has no message to extend"),
        }
    }

    pub fn snapshot(&self) -> Transcript {
        self.publisher.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.publisher.subscribe()
    }

    pub fn len(&self) -> usize {
        self.publisher.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.publisher.borrow().is_empty()
    }
}
