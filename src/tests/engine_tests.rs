//! # Engine Scenario Tests
//!
//! Drive [`Engine`] tick by tick with a hand-moved clock and scripted fetch results,
//! checking refresh policy, persistence and what reaches the display.

use super::*;
use tide_glow_lib::animator::{ColorPolicy, ProgressAnimator, WaveOscillator};
use tide_glow_lib::codec;
use tide_glow_lib::engine::{Engine, EngineSettings};
use tide_glow_lib::scheduler::{DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_STALENESS_SECS};
use tide_glow_lib::storage::MemoryStore;
use tide_glow_lib::{StationOffset, TideDataset, TideExtreme, TideTrend};

/// 2025-01-21T12:00:00Z
const T: i64 = 1_737_460_800;
const HOUR: i64 = 3600;
/// US Eastern with daylight saving, as in the default config
const LOCAL: i64 = -14_400;

fn settings() -> EngineSettings {
    EngineSettings::default()
}

fn offset() -> StationOffset {
    settings().offset
}

fn animator() -> ProgressAnimator {
    ProgressAnimator::new(
        ColorPolicy::default(),
        WaveOscillator::seeded(10_000, 20_000, 32, 1),
    )
}

fn extreme(timestamp: i64, is_high: bool) -> TideExtreme {
    TideExtreme {
        timestamp,
        height: if is_high { 1.12 } else { 0.05 },
        is_high,
    }
}

/// Saved dataset: low at T-3h, high at T+3h, low at T+9h.
fn saved_dataset(last_update: i64) -> TideDataset {
    TideDataset::new(
        extreme(T - 3 * HOUR, false),
        vec![extreme(T + 3 * HOUR, true), extreme(T + 9 * HOUR, false)],
        last_update,
        TideTrend::Rising,
        0.4,
    )
    .unwrap()
}

fn store_with(dataset: &TideDataset) -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .put("tidestate", &codec::encode(dataset, offset()).unwrap())
        .unwrap();
    store
}

type TestEngine<S> = Engine<ScriptedFetcher, S, ManualClock, RecordingSink>;

fn engine_with<S: PersistenceStore>(store: S, fetcher: ScriptedFetcher, now: i64) -> TestEngine<S> {
    Engine::start(
        settings(),
        animator(),
        fetcher,
        store,
        ManualClock::at(now),
        RecordingSink::default(),
    )
}

fn good_response() -> FetchResponse {
    response(vec![
        raw_extreme(T - 9 * HOUR, LOCAL, true),
        raw_extreme(T - 3 * HOUR, LOCAL, false),
        raw_extreme(T + 3 * HOUR, LOCAL, true),
        raw_extreme(T + 9 * HOUR, LOCAL, false),
    ])
}

#[test]
fn first_tick_fetches_persists_and_renders() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(good_response()));
    let mut engine = engine_with(MemoryStore::new(), fetcher, T);
    assert!(engine.dataset().is_empty());
    assert_eq!(engine.next_update_time(), T);

    let report = engine.tick();
    assert!(report.refreshed);
    assert_eq!(report.consecutive_failures, 0);
    assert!(!report.restart_advised);

    // Station-local service timestamps were corrected back to UTC
    let dataset = engine.dataset();
    assert_eq!(dataset.current().timestamp, T - 3 * HOUR);
    assert!(!dataset.current().is_high);
    let future: Vec<_> = dataset.future_extremes().iter().map(|e| e.timestamp).collect();
    assert_eq!(future, vec![T + 3 * HOUR, T + 9 * HOUR]);
    assert_eq!(dataset.last_update_time(), T);
    assert_eq!(dataset.trend(), TideTrend::Rising);

    // Requested window is 12h back, 48h ahead
    assert_eq!(
        engine.fetcher().calls(),
        vec![("8447504".to_string(), T - 12 * HOUR, T + 48 * HOUR)]
    );

    // Halfway from low to high: green fading out, red fading in, wave at zero
    let frame = report.frame.unwrap();
    assert!((frame.progress - 0.5).abs() < 1e-6);
    assert_eq!(frame.rgb, Rgb::new(128, 128, 0));
    assert_eq!(engine.display().frames, vec![frame.rgb]);
    assert_eq!(engine.last_color(), Some(frame.rgb));

    // The persisted blob decodes to exactly the live dataset
    let blob = engine.store().get("tidestate").unwrap().unwrap();
    assert_eq!(codec::decode(&blob, offset()).unwrap(), *engine.dataset());
}

#[test]
fn fresh_saved_data_skips_fetch() {
    let saved = saved_dataset(T - 60);
    let mut engine = engine_with(store_with(&saved), ScriptedFetcher::new(), T);
    assert_eq!(*engine.dataset(), saved);

    let report = engine.tick();
    assert!(!report.refreshed);
    assert!(engine.fetcher().calls().is_empty());
    assert!(report.frame.is_some());
    assert_eq!(engine.next_update_time(), T - 60 + DEFAULT_STALENESS_SECS);
}

#[test]
fn corrupt_saved_data_starts_empty_and_fetches() {
    let mut store = MemoryStore::new();
    store.put("tidestate", b"{\"type\":\"RISING\",\"extre").unwrap();
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(good_response()));

    let mut engine = engine_with(store, fetcher, T);
    assert!(engine.dataset().is_empty());

    let report = engine.tick();
    assert!(report.refreshed);
    assert_eq!(engine.dataset().future_extremes().len(), 2);
}

#[test]
fn failed_refresh_keeps_stale_data_animating() {
    let saved = saved_dataset(T - 7 * HOUR);
    let mut engine = engine_with(store_with(&saved), ScriptedFetcher::new(), T);

    let report = engine.tick();
    assert!(!report.refreshed);
    assert_eq!(report.consecutive_failures, 1);
    assert_eq!(engine.fetcher().calls().len(), 1);
    assert_eq!(*engine.dataset(), saved);
    assert!(report.frame.is_some(), "stale data should still drive the LED");
}

#[test]
fn missing_extremes_field_leaves_dataset_unchanged() {
    let saved = saved_dataset(T - 7 * HOUR);
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(FetchResponse {
        tide_type: Some("FALLING".to_string()),
        water_level: Some(9.9),
        extremes: None,
    }));
    let mut engine = engine_with(store_with(&saved), fetcher, T);

    let report = engine.tick();
    assert!(!report.refreshed);
    assert_eq!(report.consecutive_failures, 1);
    assert_eq!(*engine.dataset(), saved);
    assert_eq!(engine.dataset().trend(), TideTrend::Rising);
}

#[test]
fn retries_are_rate_limited_and_restart_is_advised() {
    let mut engine = engine_with(MemoryStore::new(), ScriptedFetcher::new(), T);

    let report = engine.tick();
    assert_eq!(report.consecutive_failures, 1);
    assert!(report.frame.is_none());
    assert!(engine.display().frames.is_empty());

    // Within the retry interval nothing is attempted
    engine.clock().set(T + 60);
    engine.tick();
    assert_eq!(engine.fetcher().calls().len(), 1);

    engine.clock().set(T + DEFAULT_RETRY_INTERVAL_SECS);
    let report = engine.tick();
    assert_eq!(engine.fetcher().calls().len(), 2);
    assert_eq!(report.consecutive_failures, 2);
    assert!(!report.restart_advised);

    engine.clock().set(T + 2 * DEFAULT_RETRY_INTERVAL_SECS);
    let report = engine.tick();
    assert_eq!(report.consecutive_failures, 3);
    assert!(report.restart_advised);
}

#[test]
fn success_resets_failure_count() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Err(TideError::Status(503)));
    fetcher.push(Ok(good_response()));
    let mut engine = engine_with(MemoryStore::new(), fetcher, T);

    assert_eq!(engine.tick().consecutive_failures, 1);

    engine.clock().set(T + DEFAULT_RETRY_INTERVAL_SECS);
    let report = engine.tick();
    assert!(report.refreshed);
    assert_eq!(report.consecutive_failures, 0);
    assert_eq!(engine.consecutive_failures(), 0);
}

#[test]
fn consumed_window_holds_last_colour() {
    let saved = saved_dataset(T - 60);
    let mut engine = engine_with(store_with(&saved), ScriptedFetcher::new(), T);

    let first = engine.tick().frame.unwrap();

    // Past the last extreme: refresh is attempted (and fails), no new frame
    engine.clock().set(T + 9 * HOUR);
    let report = engine.tick();
    assert!(report.frame.is_none());
    assert_eq!(engine.fetcher().calls().len(), 1);
    assert_eq!(engine.display().frames, vec![first.rgb]);
    assert_eq!(engine.last_color(), Some(first.rgb));
}

#[test]
fn staleness_forces_refresh_with_extremes_pending() {
    let far = TideDataset::new(
        extreme(T - HOUR, true),
        vec![extreme(T + 20 * HOUR, false), extreme(T + 26 * HOUR, true)],
        T,
        TideTrend::Falling,
        0.9,
    )
    .unwrap();
    let mut engine = engine_with(store_with(&far), ScriptedFetcher::new(), T);

    engine.clock().set(T + DEFAULT_STALENESS_SECS - 1);
    engine.tick();
    assert!(engine.fetcher().calls().is_empty());

    engine.clock().set(T + DEFAULT_STALENESS_SECS + 1);
    engine.tick();
    assert_eq!(engine.fetcher().calls().len(), 1);
}

#[test]
fn broken_store_does_not_block_refresh() {
    let fetcher = ScriptedFetcher::new();
    fetcher.push(Ok(good_response()));
    let mut engine = engine_with(BrokenStore, fetcher, T);
    assert!(engine.dataset().is_empty());

    let report = engine.tick();
    assert!(report.refreshed);
    assert_eq!(engine.dataset().future_extremes().len(), 2);
    assert!(report.frame.is_some());
}

#[test]
fn bracket_between_future_extremes_through_engine() {
    // current@0 (low), high@1000, low@2000, now=1500
    let dataset = TideDataset::new(
        TideExtreme {
            timestamp: 0,
            height: 0.0,
            is_high: false,
        },
        vec![extreme(1000, true), extreme(2000, false)],
        1400,
        TideTrend::Unknown,
        0.0,
    )
    .unwrap();
    let mut engine = engine_with(store_with(&dataset), ScriptedFetcher::new(), 1500);

    let report = engine.tick();
    assert!(!report.refreshed);
    let frame = report.frame.unwrap();
    assert_eq!(frame.bracket.current.timestamp, 1000);
    assert_eq!(frame.bracket.next.timestamp, 2000);
    assert!((frame.progress - 0.5).abs() < 1e-6);
    // Departing a high: red fading out
    assert_eq!((frame.rgb.r, frame.rgb.g), (128, 128));
}
