//! # Tide Glow Core Library
//!
//! This library provides the data model and the processing pipeline for the tide glow
//! application: a single RGB LED that shows where the local tide sits between its last
//! and next extreme (high or low water).
//!
//! ## Design Philosophy
//!
//! ### Bounded Working Set
//! - **Fixed capacity**: at most [`MAX_EXTREMES`] future extremes are kept, allocated
//!   up front with `Vec::with_capacity`
//! - **Near-term first**: when the service returns more than fits, the furthest-future
//!   entries are dropped so the extremes used for animation are never sacrificed
//! - **Wholesale replacement**: a dataset is never patched in place; every successful
//!   fetch builds a new one which the engine swaps in
//!
//! ### Time Handling
//! Every timestamp held in memory is **UTC epoch seconds**. Station-local time only
//! appears at the edges: in the raw service response (see [`ingest`]) and in the
//! persisted blob (see [`codec`]). Both edges convert with the same [`StationOffset`].
//!
//! ### Data Flow
//! 1. **Fetch**: [`tide_data::HttpFetcher`] pulls raw extremes for the station
//! 2. **Ingest**: [`ingest::ingest`] partitions them into past/future and builds a dataset
//! 3. **Persist**: [`codec::encode`] + [`storage::FileStore`] survive restarts
//! 4. **Schedule**: [`scheduler::UpdatePolicy`] decides when the window is stale
//! 5. **Animate**: [`animator::ProgressAnimator`] turns the bracket into a colour
//!
//! ## Core Types
//! - [`TideExtreme`]: one predicted high or low water event
//! - [`TideDataset`]: the most recent past extreme plus the bounded future window

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Module declarations
pub mod animator;
pub mod codec;
pub mod config;
pub mod display;
pub mod engine;
pub mod ingest;
pub mod scheduler;
pub mod storage;
pub mod tide_data;
pub mod traits;

/// Maximum number of future extremes held in a [`TideDataset`].
///
/// Four extremes a day means this covers roughly five days of lookahead, far more
/// than the animation ever needs before the next refresh.
pub const MAX_EXTREMES: usize = 20;

/// Largest magnitude accepted for any stored or ingested epoch-seconds timestamp.
///
/// Roughly 31,700 years either side of 1970. Keeping timestamps this far from
/// `i64` limits lets the scheduler and animator subtract them freely.
pub const TIMESTAMP_LIMIT_SECS: i64 = 1_000_000_000_000;

/// A predicted high or low water event.
///
/// `timestamp` is always UTC epoch seconds once inside the library.
///
/// # Example
/// ```
/// use tide_glow_lib::TideExtreme;
///
/// let high = TideExtreme { timestamp: 1_737_460_800, height: 3.4, is_high: true };
/// assert!(high.is_high);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TideExtreme {
    /// UTC epoch seconds
    pub timestamp: i64,
    /// Water height in the service's unit (meters for the default station)
    pub height: f32,
    /// True for high water, false for low water
    pub is_high: bool,
}

impl TideExtreme {
    /// Short label used in log lines.
    pub fn label(&self) -> &'static str {
        if self.is_high {
            "HIGH"
        } else {
            "LOW"
        }
    }
}

/// Direction the water is moving, as reported by the station.
///
/// Advisory telemetry only; nothing in the scheduler or the animator reads it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TideTrend {
    Rising,
    Falling,
    #[default]
    Unknown,
}

impl TideTrend {
    /// Parse the service's `tideType` tag. Anything unrecognised is `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "RISING" => TideTrend::Rising,
            "FALLING" => TideTrend::Falling,
            _ => TideTrend::Unknown,
        }
    }
}

/// Fixed UTC offset of the tide station, split the way the station reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationOffset {
    /// Standard offset from UTC in seconds (negative west of Greenwich)
    pub gmt_offset_secs: i64,
    /// Additional daylight saving offset in seconds
    pub daylight_offset_secs: i64,
}

impl StationOffset {
    /// Total seconds to add to UTC to get station-local time.
    pub fn total_secs(&self) -> i64 {
        self.gmt_offset_secs + self.daylight_offset_secs
    }
}

/// Reasons a set of extremes cannot form a [`TideDataset`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DatasetError {
    #[error("{count} future extremes exceed capacity of {max}", max = MAX_EXTREMES)]
    TooMany { count: usize },

    #[error("future extreme {index} is not after its predecessor")]
    OutOfOrder { index: usize },

    #[error("future extreme {index} is not after the current extreme")]
    NotAfterCurrent { index: usize },

    #[error("timestamp {timestamp} is outside the supported range")]
    TimestampOutOfRange { timestamp: i64 },

    #[error("height is not a finite number")]
    NonFiniteHeight,
}

/// The working set: most recent past extreme plus a bounded window of future ones.
///
/// Invariants, checked by [`TideDataset::new`]:
/// - `future_extremes` is strictly ascending by timestamp (no duplicates)
/// - every future timestamp is strictly greater than `current.timestamp`
/// - at most [`MAX_EXTREMES`] future extremes
/// - every timestamp within [`TIMESTAMP_LIMIT_SECS`] of the epoch
/// - every height finite
///
/// There is no mutation API. A refresh builds a new dataset and replaces the old one.
///
/// # Example
/// ```
/// use tide_glow_lib::{TideDataset, TideExtreme, TideTrend};
///
/// let current = TideExtreme { timestamp: 0, height: 0.2, is_high: false };
/// let future = vec![
///     TideExtreme { timestamp: 1000, height: 1.1, is_high: true },
///     TideExtreme { timestamp: 2000, height: 0.1, is_high: false },
/// ];
/// let dataset = TideDataset::new(current, future, 0, TideTrend::Rising, 0.4).unwrap();
/// assert_eq!(dataset.future_extremes().len(), 2);
///
/// let empty = TideDataset::empty();
/// assert!(empty.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TideDataset {
    current: TideExtreme,
    future_extremes: Vec<TideExtreme>,
    last_update_time: i64,
    trend: TideTrend,
    current_height: f32,
}

impl TideDataset {
    /// Dataset used at startup or after a failed load: no extremes, never updated.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a dataset, rejecting anything that breaks the ordering, capacity, range
    /// or height invariants.
    pub fn new(
        current: TideExtreme,
        future_extremes: Vec<TideExtreme>,
        last_update_time: i64,
        trend: TideTrend,
        current_height: f32,
    ) -> Result<Self, DatasetError> {
        if future_extremes.len() > MAX_EXTREMES {
            return Err(DatasetError::TooMany {
                count: future_extremes.len(),
            });
        }

        check_timestamp(last_update_time)?;
        check_extreme(&current)?;
        if !current_height.is_finite() {
            return Err(DatasetError::NonFiniteHeight);
        }

        for (index, extreme) in future_extremes.iter().enumerate() {
            check_extreme(extreme)?;
            if extreme.timestamp <= current.timestamp {
                return Err(DatasetError::NotAfterCurrent { index });
            }
            if index > 0 && extreme.timestamp <= future_extremes[index - 1].timestamp {
                return Err(DatasetError::OutOfOrder { index });
            }
        }

        Ok(Self {
            current,
            future_extremes,
            last_update_time,
            trend,
            current_height,
        })
    }

    /// Most recent extreme at or before the last ingestion's reference time.
    pub fn current(&self) -> &TideExtreme {
        &self.current
    }

    pub fn future_extremes(&self) -> &[TideExtreme] {
        &self.future_extremes
    }

    /// Furthest-future extreme held, i.e. the end of the usable window.
    pub fn last_future(&self) -> Option<&TideExtreme> {
        self.future_extremes.last()
    }

    pub fn last_update_time(&self) -> i64 {
        self.last_update_time
    }

    pub fn trend(&self) -> TideTrend {
        self.trend
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    /// True when there are no future extremes to animate towards.
    pub fn is_empty(&self) -> bool {
        self.future_extremes.is_empty()
    }

    /// Count adjacent extremes (starting from `current`) that share the same type.
    ///
    /// A well-formed series alternates high/low, so anything non-zero is a data
    /// quality problem upstream. Only the ingestor looks at this, and only to warn.
    pub fn alternation_breaks(&self) -> usize {
        std::iter::once(&self.current)
            .chain(self.future_extremes.iter())
            .collect::<Vec<_>>()
            .windows(2)
            .filter(|pair| pair[0].is_high == pair[1].is_high)
            .count()
    }
}

fn check_timestamp(timestamp: i64) -> Result<(), DatasetError> {
    if timestamp.unsigned_abs() > TIMESTAMP_LIMIT_SECS as u64 {
        return Err(DatasetError::TimestampOutOfRange { timestamp });
    }
    Ok(())
}

fn check_extreme(extreme: &TideExtreme) -> Result<(), DatasetError> {
    check_timestamp(extreme.timestamp)?;
    if !extreme.height.is_finite() {
        return Err(DatasetError::NonFiniteHeight);
    }
    Ok(())
}

/// Choose which future extremes to keep.
///
/// Sorts by timestamp, drops duplicates and anything at or before `after`, then keeps
/// the earliest [`MAX_EXTREMES`]. The result always satisfies [`TideDataset::new`].
pub fn select_future(mut candidates: Vec<TideExtreme>, after: i64) -> Vec<TideExtreme> {
    candidates.retain(|extreme| extreme.timestamp > after);
    candidates.sort_by_key(|extreme| extreme.timestamp);
    candidates.dedup_by_key(|extreme| extreme.timestamp);
    candidates.truncate(MAX_EXTREMES);

    let mut selected = Vec::with_capacity(MAX_EXTREMES);
    selected.extend(candidates);
    selected
}
