//! Transcript state and the stream folding that feeds it

pub mod aggregator;
pub mod log;

pub use aggregator::{StreamAggregator, TurnOutcome, TurnStatus};
pub use log::{ChatMessage, ChatRole, MessageLog, Transcript};
