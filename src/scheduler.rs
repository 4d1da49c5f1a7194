//! # Update Scheduling
//!
//! Pure decisions about when the dataset must be refreshed. Nothing here touches the
//! network or the clock; callers pass `now` in.
//!
//! A refresh is due when any of these hold:
//! - there are no future extremes
//! - `now` has reached the last future extreme (the window is consumed)
//! - the data is older than the staleness threshold, which bounds the age of the
//!   height/trend telemetry even while extremes remain

use crate::TideDataset;

/// Default maximum age of fetched data (6 hours)
pub const DEFAULT_STALENESS_SECS: i64 = 6 * 3600;

/// Default spacing between refresh attempts (15 minutes)
pub const DEFAULT_RETRY_INTERVAL_SECS: i64 = 15 * 60;

/// Refresh thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdatePolicy {
    /// Data older than this is refreshed regardless of remaining extremes
    pub staleness_secs: i64,
    /// Minimum gap between two refresh attempts
    pub retry_interval_secs: i64,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            staleness_secs: DEFAULT_STALENESS_SECS,
            retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
        }
    }
}

impl UpdatePolicy {
    /// True when at least one future extreme is still ahead of `now`.
    pub fn has_valid_future_extremes(&self, dataset: &TideDataset, now: i64) -> bool {
        dataset
            .last_future()
            .is_some_and(|last| now < last.timestamp)
    }

    pub fn needs_update(&self, dataset: &TideDataset, now: i64) -> bool {
        if !self.has_valid_future_extremes(dataset, now) {
            return true;
        }
        now.saturating_sub(dataset.last_update_time()) > self.staleness_secs
    }

    /// Earliest time a refresh will become necessary, never earlier than `now`.
    ///
    /// Lets a caller sleep until then instead of polling. When staleness is the
    /// deciding term, [`needs_update`](Self::needs_update) only turns true one second
    /// after the returned time, since the age must exceed the threshold.
    pub fn next_update_time(&self, dataset: &TideDataset, now: i64) -> i64 {
        match dataset.last_future() {
            None => now,
            Some(last) => {
                let stale_at = dataset.last_update_time().saturating_add(self.staleness_secs);
                stale_at.min(last.timestamp).max(now)
            }
        }
    }

    /// Rate limit for refresh attempts; the first attempt is always due.
    pub fn attempt_due(&self, last_attempt: Option<i64>, now: i64) -> bool {
        match last_attempt {
            None => true,
            Some(at) => now.saturating_sub(at) >= self.retry_interval_secs,
        }
    }
}
