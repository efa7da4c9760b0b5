//! Chat panel components

pub mod composer;
pub mod history;

pub use composer::{Composer, ComposerResult};
pub use history::ChatHistory;
