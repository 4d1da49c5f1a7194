//! # Extremes Ingestion
//!
//! Turns a [`FetchResponse`] into a fresh [`TideDataset`] relative to a reference
//! time `now`:
//!
//! 1. Convert every raw millisecond timestamp to UTC epoch seconds
//!    (`floor(ms / 1000)`, minus the station offset when the service reports
//!    station-local time).
//! 2. The latest extreme at or before `now` becomes `current`. When there is none,
//!    the previous dataset's `current` is carried over.
//! 3. Extremes after `now` are sorted and the earliest [`MAX_EXTREMES`] kept.
//! 4. `last_update_time = now`.
//!
//! Ingestion either returns a complete new dataset or an error; the previous dataset
//! is only ever read.
//!
//! [`MAX_EXTREMES`]: crate::MAX_EXTREMES

use crate::tide_data::{FetchResponse, RawExtreme};
use crate::{
    select_future, DatasetError, StationOffset, TideDataset, TideExtreme, TideTrend,
    TIMESTAMP_LIMIT_SECS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Time convention of the raw timestamps sent by the service.
///
/// The service this was built against stamps extremes with station-local wall-clock
/// time expressed as epoch milliseconds, so `StationLocal` is the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampConvention {
    #[default]
    StationLocal,
    Utc,
}

#[derive(Error, Debug, PartialEq)]
pub enum IngestError {
    #[error("response has no extremes field")]
    MissingExtremes,

    #[error("response extremes list is empty")]
    NoExtremes,

    #[error("extreme {index} is malformed: {reason}")]
    Malformed { index: usize, reason: &'static str },
}

/// Convert one raw millisecond timestamp to UTC epoch seconds.
pub fn to_utc_seconds(
    raw_millis: f64,
    convention: TimestampConvention,
    offset: StationOffset,
) -> Option<i64> {
    if !raw_millis.is_finite() {
        return None;
    }
    let seconds = (raw_millis / 1000.0).floor();
    // Reject anything that would saturate the cast
    if seconds.abs() > TIMESTAMP_LIMIT_SECS as f64 {
        return None;
    }
    let seconds = seconds as i64;
    let utc = match convention {
        TimestampConvention::StationLocal => seconds.checked_sub(offset.total_secs())?,
        TimestampConvention::Utc => seconds,
    };
    (utc.unsigned_abs() <= TIMESTAMP_LIMIT_SECS as u64).then_some(utc)
}

fn convert(
    index: usize,
    raw: &RawExtreme,
    convention: TimestampConvention,
    offset: StationOffset,
) -> Result<TideExtreme, IngestError> {
    let timestamp = to_utc_seconds(raw.timestamp, convention, offset).ok_or(IngestError::Malformed {
        index,
        reason: "timestamp out of range",
    })?;
    if !raw.height.is_finite() {
        return Err(IngestError::Malformed {
            index,
            reason: "height is not finite",
        });
    }

    Ok(TideExtreme {
        timestamp,
        height: raw.height,
        is_high: raw.is_high(),
    })
}

/// Build a replacement dataset from a fetch response.
pub fn ingest(
    previous: &TideDataset,
    response: &FetchResponse,
    now: i64,
    convention: TimestampConvention,
    offset: StationOffset,
) -> Result<TideDataset, IngestError> {
    let raw = response.extremes.as_ref().ok_or(IngestError::MissingExtremes)?;
    if raw.is_empty() {
        return Err(IngestError::NoExtremes);
    }

    let converted = raw
        .iter()
        .enumerate()
        .map(|(index, extreme)| convert(index, extreme, convention, offset))
        .collect::<Result<Vec<_>, _>>()?;

    let current = converted
        .iter()
        .filter(|extreme| extreme.timestamp <= now)
        .max_by_key(|extreme| extreme.timestamp)
        .copied()
        .unwrap_or_else(|| {
            debug!("no past extreme in response, keeping previous current extreme");
            *previous.current()
        });

    let future: Vec<_> = converted
        .into_iter()
        .filter(|extreme| extreme.timestamp > now)
        .collect();
    let offered = future.len();
    let future = select_future(future, current.timestamp);
    if future.len() < offered {
        debug!(offered, kept = future.len(), "trimmed future extremes");
    }

    let trend = response
        .tide_type
        .as_deref()
        .map_or(TideTrend::Unknown, TideTrend::from_tag);
    let height = match response.water_level {
        Some(level) if !level.is_finite() => {
            warn!("water level is not a finite number, treating as absent");
            0.0
        }
        level => level.unwrap_or(0.0),
    };

    // select_future guarantees the ordering and capacity invariants
    let dataset = TideDataset::new(current, future, now, trend, height).map_err(|err| {
        let reason = match err {
            DatasetError::TimestampOutOfRange { .. } => "timestamp out of range",
            DatasetError::NonFiniteHeight => "height is not finite",
            _ => "extremes do not form an ordered window",
        };
        IngestError::Malformed { index: 0, reason }
    })?;

    let breaks = dataset.alternation_breaks();
    if breaks > 0 {
        warn!(breaks, "extremes do not alternate between high and low");
    }

    Ok(dataset)
}
