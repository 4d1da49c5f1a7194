//! # Collaborator Interfaces
//!
//! The engine only talks to the outside world through these four traits: a clock,
//! the remote extremes service, a blob store and the LED. Production implementations
//! live in [`crate::tide_data`], [`crate::storage`] and [`crate::display`]; tests
//! substitute their own.

use crate::animator::Rgb;
use crate::storage::StoreError;
use crate::tide_data::{FetchResponse, TideError};
use std::time::Instant;

/// Wall-clock and animation time source.
pub trait Clock {
    /// Current UTC epoch seconds.
    fn now(&self) -> i64;

    /// Monotonic milliseconds since an arbitrary start, used only for animation.
    fn millis(&self) -> u64;
}

/// Source of raw tide extremes for a station.
///
/// Any failure (network, timeout, bad status, unparseable body) is a single
/// [`TideError`]; the caller treats them all as one failed refresh.
pub trait RemoteFetcher {
    fn fetch(
        &self,
        station_id: &str,
        window_start: i64,
        window_end: i64,
    ) -> Result<FetchResponse, TideError>;
}

/// Opaque named-slot blob storage.
pub trait PersistenceStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Fire-and-forget colour output.
pub trait DisplaySink {
    fn render(&mut self, rgb: Rgb);
}

/// [`Clock`] backed by the system clock.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
