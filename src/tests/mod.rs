//! Scenario tests for the engine driven through scripted collaborators.

mod engine_tests;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use tide_glow_lib::animator::Rgb;
use tide_glow_lib::storage::StoreError;
use tide_glow_lib::tide_data::{FetchResponse, RawExtreme, TideError};
use tide_glow_lib::traits::{Clock, DisplaySink, PersistenceStore, RemoteFetcher};

/// Clock the test moves by hand.
pub struct ManualClock {
    now: Cell<i64>,
    millis: Cell<u64>,
}

impl ManualClock {
    pub fn at(now: i64) -> Self {
        Self {
            now: Cell::new(now),
            millis: Cell::new(0),
        }
    }

    pub fn set(&self, now: i64) {
        let elapsed = (now - self.now.get()).max(0) as u64;
        self.millis.set(self.millis.get() + elapsed * 1000);
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.get()
    }

    fn millis(&self) -> u64 {
        self.millis.get()
    }
}

/// Fetcher that replays queued results and records every request window.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: RefCell<VecDeque<Result<FetchResponse, TideError>>>,
    calls: RefCell<Vec<(String, i64, i64)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<FetchResponse, TideError>) {
        self.responses.borrow_mut().push_back(response);
    }

    pub fn calls(&self) -> Vec<(String, i64, i64)> {
        self.calls.borrow().clone()
    }
}

impl RemoteFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        station_id: &str,
        window_start: i64,
        window_end: i64,
    ) -> Result<FetchResponse, TideError> {
        self.calls
            .borrow_mut()
            .push((station_id.to_string(), window_start, window_end));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(TideError::EmptyBody))
    }
}

/// Display that remembers every colour it was given.
#[derive(Default)]
pub struct RecordingSink {
    pub frames: Vec<Rgb>,
}

impl DisplaySink for RecordingSink {
    fn render(&mut self, rgb: Rgb) {
        self.frames.push(rgb);
    }
}

/// Store whose every operation fails.
pub struct BrokenStore;

impl PersistenceStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(io::Error::other("disk gone").into())
    }

    fn put(&mut self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
        Err(io::Error::other("disk gone").into())
    }
}

/// Raw service record with the timestamp expressed the way the service sends it
/// (station-local milliseconds at the given offset).
pub fn raw_extreme(utc_secs: i64, local_offset_secs: i64, is_high: bool) -> RawExtreme {
    RawExtreme {
        timestamp: ((utc_secs + local_offset_secs) * 1000) as f64,
        height: if is_high { 1.12 } else { 0.05 },
        kind: if is_high { "HIGH" } else { "LOW" }.to_string(),
    }
}

pub fn response(extremes: Vec<RawExtreme>) -> FetchResponse {
    FetchResponse {
        tide_type: Some("RISING".to_string()),
        water_level: Some(0.4),
        extremes: Some(extremes),
    }
}
