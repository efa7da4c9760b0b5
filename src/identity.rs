use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Correlation key tying a session's turns to the assistant's server-side context.
///
/// Generated once when the session starts and never regenerated; the value
/// carries no meaning beyond identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
