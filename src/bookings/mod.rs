//! Booking records and where they come from

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use http::HttpBookingSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RoomType {
    Single,
    Double,
    Suite,
}

/// One row of the bookings table.
///
/// The server omits null fields, so everything that is not needed to tell
/// rows apart is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub booking_number: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub check_in_date: Option<NaiveDate>,
    #[serde(default)]
    pub check_out_date: Option<NaiveDate>,
    #[serde(default)]
    pub booking_status: Option<BookingStatus>,
    #[serde(default)]
    pub hotel_name: Option<String>,
    #[serde(default)]
    pub room_type: Option<RoomType>,
    #[serde(default)]
    pub number_of_guests: u32,
}

impl BookingRecord {
    pub fn is_confirmed(&self) -> bool {
        self.booking_status == Some(BookingStatus::Confirmed)
    }

    pub fn guest_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Read-only access to the current bookings.
///
/// `None` entries stand for records the source could not produce (null or
/// malformed on the wire); callers drop them instead of failing the fetch.
#[async_trait]
pub trait BookingSource: Send + Sync {
    async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>>;
}

/// Result of one issued fetch, tagged with the order it was issued in
#[derive(Debug, Clone)]
pub struct BookingUpdate {
    pub generation: u64,
    pub records: Vec<BookingRecord>,
}

/// The booking list currently on screen. Each refresh replaces it wholesale.
#[derive(Debug, Default)]
pub struct BookingBoard {
    records: Vec<BookingRecord>,
    generation: u64,
}

impl BookingBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list, unless `update` was issued before the one already shown.
    pub fn apply(&mut self, update: BookingUpdate) -> bool {
        if update.generation < self.generation {
            tracing::debug!(
                stale = update.generation,
                current = self.generation,
                "ignoring out-of-order booking refresh"
            );
            return false;
        }

        self.generation = update.generation;
        self.records = update.records;
        true
    }

    pub fn records(&self) -> &[BookingRecord] {
        &self.records
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: &str) -> BookingRecord {
        BookingRecord {
            booking_number: number.to_string(),
            first_name: Some("Ana".into()),
            last_name: Some("Petrović".into()),
            check_in_date: None,
            check_out_date: None,
            booking_status: Some(BookingStatus::Confirmed),
            hotel_name: None,
            room_type: None,
            number_of_guests: 2,
        }
    }

    #[test]
    fn decodes_server_json() {
        let json = r#"{
            "bookingNumber": "101",
            "firstName": "John",
            "lastName": "Doe",
            "checkInDate": "2025-07-01",
            "checkOutDate": "2025-07-04",
            "bookingStatus": "CONFIRMED",
            "hotelName": "Great Hotel Belgrade",
            "roomType": "SUITE",
            "numberOfGuests": 3
        }"#;

        let record: BookingRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.booking_number, "101");
        assert_eq!(record.room_type, Some(RoomType::Suite));
        assert_eq!(record.check_in_date, NaiveDate::from_ymd_opt(2025, 7, 1));
        assert!(record.is_confirmed());
        assert_eq!(record.guest_name(), "John Doe");
    }

    #[test]
    fn missing_optional_fields_are_tolerated() {
        let record: BookingRecord = serde_json::from_str(r#"{"bookingNumber":"7"}"#).unwrap();
        assert_eq!(record.guest_name(), "");
        assert!(!record.is_confirmed());
        assert_eq!(record.number_of_guests, 0);
    }

    #[test]
    fn room_type_parses_case_insensitively() {
        assert_eq!("suite".parse::<RoomType>().unwrap(), RoomType::Suite);
        assert_eq!(RoomType::Double.to_string(), "DOUBLE");
    }

    #[test]
    fn board_ignores_stale_generations() {
        let mut board = BookingBoard::new();

        assert!(board.apply(BookingUpdate { generation: 2, records: vec![record("2")] }));
        assert!(!board.apply(BookingUpdate { generation: 1, records: vec![record("1")] }));

        assert_eq!(board.generation(), 2);
        assert_eq!(board.records()[0].booking_number, "2");
    }
}
