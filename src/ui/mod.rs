//! Terminal presentation: bookings table on the left, support chat on the right

pub mod bookings;
pub mod console;
pub mod conversation;

pub use console::run;
