//! # Tide Extremes Fetching
//!
//! This module handles the network side of the pipeline: requesting predicted
//! extremes for the configured station over HTTPS and turning the body into a typed
//! [`FetchResponse`]. Nothing here interprets timestamps; that happens in
//! [`crate::ingest`], which owns the timezone contract.
//!
//! ## Service Contract
//!
//! ### Request
//! `GET {endpoint}?stationId=…&startDateTime=…&endDateTime=…` where both bounds are
//! station-local wall-clock times formatted `%Y-%m-%dT%H:%M:%S`.
//!
//! ### Response
//! ```json
//! {
//!   "tideType": "RISING",
//!   "waterLevel": 0.62,
//!   "extremes": [
//!     { "timestamp": 1737460800000, "height": 1.12, "type": "HIGH" },
//!     { "timestamp": 1737483300000, "height": 0.05, "type": "LOW" }
//!   ]
//! }
//! ```
//! `timestamp` is milliseconds since the epoch. A body without an `extremes` field
//! parses fine; ingestion is what rejects it.
//!
//! ## Error Handling
//! - **Network timeouts**: the client carries a whole-request timeout
//! - **Server errors**: any non-2xx status is a fetch failure
//! - **Parse failures**: wrong JSON types fail with the serde message (missing vs
//!   malformed field is preserved in that message)
//!
//! All errors propagate through [`TideError`] for consistent handling.

use crate::traits::RemoteFetcher;
use crate::StationOffset;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::{io, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while fetching extremes from the service.
#[derive(Error, Debug)]
pub enum TideError {
    /// No endpoint configured; fetching is disabled
    #[error("no extremes endpoint configured")]
    NotConfigured,

    /// HTTP request failed (network, timeout, TLS or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Server answered with an empty body
    #[error("empty response body")]
    EmptyBody,

    /// Body was not the expected JSON shape
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Station offset or window produced an unrepresentable date
    #[error("cannot format request window at {0}")]
    Window(i64),

    /// Async runtime could not be created
    #[error("runtime: {0}")]
    Runtime(#[from] io::Error),
}

/// Typed service response.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    /// Station trend tag, e.g. "RISING"
    pub tide_type: Option<String>,
    /// Current water level
    pub water_level: Option<f32>,
    /// Predicted extremes; `None` when the field is absent
    pub extremes: Option<Vec<RawExtreme>>,
}

/// One extreme exactly as the service sends it.
#[derive(Clone, Debug, Deserialize)]
pub struct RawExtreme {
    /// Milliseconds since the epoch, in the service's time convention
    pub timestamp: f64,
    pub height: f32,
    /// Type tag; anything containing "HIGH" is high water
    #[serde(rename = "type")]
    pub kind: String,
}

impl RawExtreme {
    pub fn is_high(&self) -> bool {
        self.kind.contains("HIGH")
    }
}

/// Parse a response body.
pub fn parse_response(body: &str) -> Result<FetchResponse, TideError> {
    if body.trim().is_empty() {
        return Err(TideError::EmptyBody);
    }
    Ok(serde_json::from_str(body)?)
}

/// Format an epoch timestamp as station-local wall-clock time for the query string.
pub fn station_local_datetime(timestamp: i64, offset: StationOffset) -> Result<String, TideError> {
    let zone = i32::try_from(offset.total_secs())
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or(TideError::Window(timestamp))?;
    let utc = DateTime::from_timestamp(timestamp, 0).ok_or(TideError::Window(timestamp))?;
    Ok(utc
        .with_timezone(&zone)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string())
}

/// Query parameters for one request window.
pub fn build_query(
    station_id: &str,
    window_start: i64,
    window_end: i64,
    offset: StationOffset,
) -> Result<Vec<(&'static str, String)>, TideError> {
    Ok(vec![
        ("stationId", station_id.to_string()),
        ("startDateTime", station_local_datetime(window_start, offset)?),
        ("endDateTime", station_local_datetime(window_end, offset)?),
    ])
}

/// [`RemoteFetcher`] talking to the extremes service over HTTPS.
///
/// Owns a private current-thread Tokio runtime so the rest of the engine can stay
/// synchronous; each fetch blocks for at most the configured timeout.
pub struct HttpFetcher {
    endpoint: String,
    offset: StationOffset,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpFetcher {
    pub fn new(endpoint: &str, timeout: Duration, offset: StationOffset) -> Result<Self, TideError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = {
            let _guard = runtime.enter();
            reqwest::Client::builder().timeout(timeout).build()?
        };

        Ok(Self {
            endpoint: endpoint.to_string(),
            offset,
            client,
            runtime,
        })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(
        &self,
        station_id: &str,
        window_start: i64,
        window_end: i64,
    ) -> Result<FetchResponse, TideError> {
        if self.endpoint.is_empty() {
            return Err(TideError::NotConfigured);
        }

        let query = build_query(station_id, window_start, window_end, self.offset)?;
        debug!(endpoint = %self.endpoint, ?query, "requesting tide extremes");

        let body = self.runtime.block_on(async {
            let response = self.client.get(&self.endpoint).query(&query).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TideError::Status(status.as_u16()));
            }
            Ok::<_, TideError>(response.text().await?)
        })?;

        let parsed = parse_response(&body)?;
        info!(
            bytes = body.len(),
            extremes = parsed.extremes.as_ref().map_or(0, Vec::len),
            "fetched tide extremes"
        );
        Ok(parsed)
    }
}
