//! HTTP booking source.
//!
//! Speaks the console's own REST contract, `GET {api_url}/api/bookings`
//! answering a JSON array of booking objects. This is not the RPC surface of
//! the hotel's web front end; a backend has to expose this route for the
//! console (or run with `--demo`).

use super::{BookingRecord, BookingSource};
use crate::error::ServiceError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Fetches bookings from `GET {api_url}/api/bookings`
#[derive(Clone)]
pub struct HttpBookingSource {
    client: reqwest::Client,
    url: String,
}

impl HttpBookingSource {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for bookings")?;

        Ok(Self {
            client,
            url: format!("{}/api/bookings", api_url.trim_end_matches('/')),
        })
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, ServiceError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                endpoint: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl BookingSource for HttpBookingSource {
    async fn fetch_bookings(&self) -> Result<Vec<Option<BookingRecord>>> {
        let entries = self
            .fetch()
            .await
            .with_context(|| format!("Failed to fetch bookings from {}", self.url))?;
        Ok(decode_entries(entries))
    }
}

/// Decode each element on its own so one bad row cannot sink the whole list
fn decode_entries(entries: Vec<serde_json::Value>) -> Vec<Option<BookingRecord>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.is_null() {
                return None;
            }
            match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(index, error = %e, "skipping malformed booking entry");
                    None
                }
            }
        })
        .collect()
}
