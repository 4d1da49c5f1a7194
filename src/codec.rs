//! # Dataset Persistence Codec
//!
//! Serializes a [`TideDataset`] to a compact JSON blob and back. The blob is what the
//! [`PersistenceStore`](crate::traits::PersistenceStore) keeps between restarts:
//!
//! ```json
//! {
//!   "type": "RISING",
//!   "currentHeight": 0.62,
//!   "lastUpdateTime": 1737446400,
//!   "current": { "timestamp": 1737439200, "height": 0.05, "isHigh": false },
//!   "extremes": [ { "timestamp": 1737461700, "height": 1.12, "isHigh": true } ],
//!   "numExtremes": 1
//! }
//! ```
//!
//! Every timestamp in the blob is station-local (`utc + gmt + dst`); decoding
//! subtracts the same offset, so `decode(encode(d)) == d` exactly.

use crate::{DatasetError, StationOffset, TideDataset, TideExtreme, TideTrend};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// Not JSON, truncated, or a field missing / of the wrong type
    #[error("malformed dataset blob: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("blob declares {declared} extremes but holds {actual}")]
    CountMismatch { declared: usize, actual: usize },

    #[error("blob violates dataset invariants: {0}")]
    Invalid(#[from] DatasetError),

    #[error("timestamp {0} cannot be shifted by the station offset")]
    TimestampOverflow(i64),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredExtreme {
    timestamp: i64,
    height: f32,
    is_high: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDataset {
    #[serde(rename = "type")]
    trend: TideTrend,
    current_height: f32,
    last_update_time: i64,
    current: StoredExtreme,
    extremes: Vec<StoredExtreme>,
    num_extremes: usize,
}

fn shift(timestamp: i64, by: i64) -> Result<i64, CodecError> {
    timestamp
        .checked_add(by)
        .ok_or(CodecError::TimestampOverflow(timestamp))
}

fn store_extreme(extreme: &TideExtreme, offset: i64) -> Result<StoredExtreme, CodecError> {
    Ok(StoredExtreme {
        timestamp: shift(extreme.timestamp, offset)?,
        height: extreme.height,
        is_high: extreme.is_high,
    })
}

fn load_extreme(stored: &StoredExtreme, offset: i64) -> Result<TideExtreme, CodecError> {
    let timestamp = stored
        .timestamp
        .checked_sub(offset)
        .ok_or(CodecError::TimestampOverflow(stored.timestamp))?;
    Ok(TideExtreme {
        timestamp,
        height: stored.height,
        is_high: stored.is_high,
    })
}

/// Serialize a dataset with station-local timestamps.
pub fn encode(dataset: &TideDataset, offset: StationOffset) -> Result<Vec<u8>, CodecError> {
    let by = offset.total_secs();
    let extremes = dataset
        .future_extremes()
        .iter()
        .map(|extreme| store_extreme(extreme, by))
        .collect::<Result<Vec<_>, _>>()?;

    let stored = StoredDataset {
        trend: dataset.trend(),
        current_height: dataset.current_height(),
        last_update_time: shift(dataset.last_update_time(), by)?,
        current: store_extreme(dataset.current(), by)?,
        num_extremes: extremes.len(),
        extremes,
    };
    Ok(serde_json::to_vec(&stored)?)
}

/// Deserialize a blob produced by [`encode`] with the same offset.
///
/// Returns a new dataset; nothing the caller holds is touched on failure.
pub fn decode(bytes: &[u8], offset: StationOffset) -> Result<TideDataset, CodecError> {
    let stored: StoredDataset = serde_json::from_slice(bytes)?;
    if stored.num_extremes != stored.extremes.len() {
        return Err(CodecError::CountMismatch {
            declared: stored.num_extremes,
            actual: stored.extremes.len(),
        });
    }

    let by = offset.total_secs();
    let future = stored
        .extremes
        .iter()
        .map(|extreme| load_extreme(extreme, by))
        .collect::<Result<Vec<_>, _>>()?;
    let last_update_time = stored
        .last_update_time
        .checked_sub(by)
        .ok_or(CodecError::TimestampOverflow(stored.last_update_time))?;

    Ok(TideDataset::new(
        load_extreme(&stored.current, by)?,
        future,
        last_update_time,
        stored.trend,
        stored.current_height,
    )?)
}
