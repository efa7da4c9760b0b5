//! In-process stand-in for the console backend.
//!
//! The desk keeps a handful of bookings in memory and answers chat messages
//! with a scripted assistant that can look up, cancel, or change the room of
//! a booking. Replies are streamed word by word so the console behaves as it
//! does against the real service.

use crate::bookings::{BookingRecord, BookingSource, BookingStatus, RoomType};
use crate::identity::ConversationId;
use crate::llm::{ChatService, ChatStream, StreamEvent};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;

// number, first name, last name, hotel, room, guests, days from today, nights, status
const SEED: [(&str, &str, &str, &str, RoomType, u32, u64, u64, BookingStatus); 5] = [
    ("101", "John", "Doe", "Great Hotel Belgrade", RoomType::Double, 2, 3, 4, BookingStatus::Confirmed),
    ("102", "Jane", "Smith", "Great Hotel Novi Sad", RoomType::Single, 1, 7, 2, BookingStatus::Confirmed),
    ("103", "Michael", "Johnson", "Great Hotel Belgrade", RoomType::Suite, 3, 10, 5, BookingStatus::Confirmed),
    ("104", "Sarah", "Williams", "Great Hotel Niš", RoomType::Double, 2, 14, 3, BookingStatus::Cancelled),
    ("105", "Robert", "Taylor", "Great Hotel Kragujevac", RoomType::Single, 1, 21, 7, BookingStatus::Confirmed),
];

const HELP: &str = "I can look up, cancel, or change the room type of a booking. \
Try **find 101**, **cancel 102**, or **change 103 to double**.";

#[derive(Clone)]
pub struct DemoDesk {
    bookings: Arc<Mutex<Vec<BookingRecord>>>,
    token_delay: Duration,
}

impl DemoDesk {
    pub fn new(token_delay: Duration) -> Self {
        Self::with_bookings(seed_bookings(Local::now().date_naive()), token_delay)
    }

    pub fn with_bookings(bookings: Vec<BookingRecord>, token_delay: Duration) -> Self {
        Self {
            bookings: Arc::new(Mutex::new(bookings)),
            token_delay,
        }
    }

    /// Work out the reply to `message`, applying any change it asks for
    fn respond(&self, message: &str) -> Result<String> {
        let lowered = message.to_lowercase();
        let Some(number) = booking_number(&lowered) else {
            return Ok(HELP.to_string());
        };

        let mut bookings = self
            .bookings
            .lock()
            .map_err(|_| anyhow!("booking store is poisoned"))?;
        let Some(booking) = bookings.iter_mut().find(|b| b.booking_number == number) else {
            return Ok(format!("I couldn't find a booking with number **{number}**."));
        };

        if lowered.contains("cancel") {
            if booking.booking_status == Some(BookingStatus::Cancelled) {
                return Ok(format!("Booking **{number}** is already cancelled."));
            }
            booking.booking_status = Some(BookingStatus::Cancelled);
            return Ok(format!(
                "Done. Booking **{number}** for {} is now cancelled.",
                booking.guest_name()
            ));
        }

        if let Some(room) = RoomType::iter().find(|room| lowered.contains(&room.to_string().to_lowercase())) {
            booking.room_type = Some(room);
            return Ok(format!("Booking **{number}** now has a {room} room."));
        }

        Ok(describe(booking))
    }
}

#[async_trait]
impl BookingSource for DemoDesk {
    async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>> {
        let bookings = self
            .bookings
            .lock()
            .map_err(|_| anyhow!("booking store is poisoned"))?;
        Ok(bookings.iter().cloned().map(Some).collect())
    }
}

impl ChatService for DemoDesk {
    fn open_stream(&self, conversation: &ConversationId, message: &str) -> ChatStream {
        let (tx, rx) = mpsc::channel(1000);
        tracing::info!(%conversation, "demo desk answering");

        let reply = self.respond(message);
        let delay = self.token_delay;
        tokio::spawn(async move {
            match reply {
                Ok(text) => {
                    simulate_streaming(&text, delay, &tx).await;
                    let _ = tx.send(StreamEvent::Completed).await;
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
                }
            }
        });

        rx
    }
}

/// Send `text` one word at a time, keeping the separating whitespace
async fn simulate_streaming(text: &str, delay: Duration, tx: &mpsc::Sender<StreamEvent>) {
    for word in text.split_inclusive(' ') {
        if tx.send(StreamEvent::Chunk(word.to_string())).await.is_err() {
            return;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn booking_number(message: &str) -> Option<String> {
    message
        .split(|c: char| !c.is_ascii_digit())
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

fn describe(booking: &BookingRecord) -> String {
    let dates = match (booking.check_in_date, booking.check_out_date) {
        (Some(check_in), Some(check_out)) => format!(" from {check_in} to {check_out}"),
        _ => String::new(),
    };
    let room = booking
        .room_type
        .map(|room| format!(" in a {room} room"))
        .unwrap_or_default();
    let status = booking
        .booking_status
        .map(|status| status.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    format!(
        "Booking **{}** for {} at {}{}{}, {} guest(s). Status: {}.",
        booking.booking_number,
        booking.guest_name(),
        booking.hotel_name.as_deref().unwrap_or("an unknown hotel"),
        dates,
        room,
        booking.number_of_guests,
        status
    )
}

fn seed_bookings(today: NaiveDate) -> Vec<BookingRecord> {
    SEED.iter()
        .map(|&(number, first, last, hotel, room, guests, offset, nights, status)| {
            let check_in = today.checked_add_days(Days::new(offset));
            BookingRecord {
                booking_number: number.to_string(),
                first_name: Some(first.to_string()),
                last_name: Some(last.to_string()),
                check_in_date: check_in,
                check_out_date: check_in.and_then(|date| date.checked_add_days(Days::new(nights))),
                booking_status: Some(status),
                hotel_name: Some(hotel.to_string()),
                room_type: Some(room),
                number_of_guests: guests,
            }
        })
        .collect()
}
