//! Operator console for Great Hotel: a live bookings table next to a
//! streaming support chat.

pub mod bookings;
pub mod chat;
pub mod commands;
pub mod config;
pub mod demo;
pub mod error;
pub mod gate;
pub mod identity;
pub mod llm;
pub mod logging;
pub mod refresh;
pub mod session;
pub mod streaming;
pub mod ui;
