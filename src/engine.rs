//! # Tide Engine
//!
//! Owns everything that changes over the life of the process: the current
//! [`TideDataset`], the animator's wave phase and the refresh bookkeeping, plus the
//! four collaborators it drives. One call to [`Engine::tick`] is one cooperative
//! step:
//!
//! 1. Read the clock
//! 2. If the dataset needs an update and an attempt is due: fetch → ingest → swap → persist
//! 3. Compute a frame and hand it to the display
//!
//! The dataset is swapped, never edited, so a frame always sees either the old or the
//! new dataset in full. Failures never reach the display: a failed refresh keeps the
//! old data, and a tick without a bracket simply leaves the last colour showing.

use crate::animator::{format_countdown, Frame, ProgressAnimator, Rgb, WaveOscillator};
use crate::codec;
use crate::config::Config;
use crate::ingest::{ingest, IngestError, TimestampConvention};
use crate::scheduler::UpdatePolicy;
use crate::tide_data::TideError;
use crate::traits::{Clock, DisplaySink, PersistenceStore, RemoteFetcher};
use crate::{StationOffset, TideDataset};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a refresh did not replace the dataset.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] TideError),

    #[error("ingest failed: {0}")]
    Ingest(#[from] IngestError),
}

/// Engine knobs, normally derived from [`Config`].
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub station_id: String,
    pub offset: StationOffset,
    pub convention: TimestampConvention,
    pub policy: UpdatePolicy,
    pub lookback_secs: i64,
    pub lookahead_secs: i64,
    /// Zero disables the restart advice
    pub max_consecutive_failures: u32,
    pub store_key: String,
    pub status_interval_ms: u64,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            station_id: config.station.id.clone(),
            offset: config.station.offset(),
            convention: config.station.timestamps,
            policy: config.schedule.update_policy(),
            lookback_secs: config.api.lookback_hours * 3600,
            lookahead_secs: config.api.lookahead_hours * 3600,
            max_consecutive_failures: config.schedule.max_consecutive_failures,
            store_key: config.storage.key.clone(),
            status_interval_ms: config.led.status_interval_secs * 1000,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Build the animator described by the LED section of the config.
pub fn animator_from_config(config: &Config) -> ProgressAnimator {
    ProgressAnimator::new(
        config.led.color_policy(),
        WaveOscillator::new(
            config.led.wave_min_interval_ms,
            config.led.wave_max_interval_ms,
            config.led.wave_max_blue,
        ),
    )
}

/// Outcome of one [`Engine::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub now: i64,
    /// A refresh ran and replaced the dataset
    pub refreshed: bool,
    /// Frame rendered this tick, if there was a bracket
    pub frame: Option<Frame>,
    pub consecutive_failures: u32,
    /// Too many refreshes in a row have failed; the supervisor should restart us
    pub restart_advised: bool,
}

pub struct Engine<F, S, C, D> {
    fetcher: F,
    store: S,
    clock: C,
    display: D,
    settings: EngineSettings,
    animator: ProgressAnimator,
    dataset: TideDataset,
    last_attempt: Option<i64>,
    consecutive_failures: u32,
    last_status_ms: Option<u64>,
    last_color: Option<Rgb>,
}

impl<F, S, C, D> Engine<F, S, C, D>
where
    F: RemoteFetcher,
    S: PersistenceStore,
    C: Clock,
    D: DisplaySink,
{
    /// Create the engine, seeding it with whatever dataset was persisted last.
    ///
    /// A missing or corrupt blob leaves the dataset empty, which forces a refresh on
    /// the first tick.
    pub fn start(
        settings: EngineSettings,
        animator: ProgressAnimator,
        fetcher: F,
        store: S,
        clock: C,
        display: D,
    ) -> Self {
        let dataset = load_persisted(&store, &settings);

        let now = clock.now();
        if dataset.is_empty() {
            info!("no usable saved tide data, will fetch");
        } else if settings.policy.needs_update(&dataset, now) {
            info!("saved tide data is too old or expired, will fetch");
        } else {
            info!(
                extremes = dataset.future_extremes().len(),
                "using saved tide data"
            );
        }

        Self {
            fetcher,
            store,
            clock,
            display,
            settings,
            animator,
            dataset,
            last_attempt: None,
            consecutive_failures: 0,
            last_status_ms: None,
            last_color: None,
        }
    }

    pub fn dataset(&self) -> &TideDataset {
        &self.dataset
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Last colour sent to the display.
    pub fn last_color(&self) -> Option<Rgb> {
        self.last_color
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// When the current dataset will next need refreshing.
    pub fn next_update_time(&self) -> i64 {
        self.settings
            .policy
            .next_update_time(&self.dataset, self.clock.now())
    }

    /// Fetch, ingest and persist a new dataset relative to `now`.
    ///
    /// On error the current dataset is untouched. A persistence failure is logged but
    /// does not undo the swap.
    pub fn refresh(&mut self, now: i64) -> Result<(), RefreshError> {
        let window_start = now - self.settings.lookback_secs;
        let window_end = now + self.settings.lookahead_secs;
        let response = self
            .fetcher
            .fetch(&self.settings.station_id, window_start, window_end)?;

        let fresh = ingest(
            &self.dataset,
            &response,
            now,
            self.settings.convention,
            self.settings.offset,
        )?;
        info!(
            current = fresh.current().label(),
            future = fresh.future_extremes().len(),
            trend = ?fresh.trend(),
            height = fresh.current_height(),
            "tide data updated"
        );
        self.dataset = fresh;
        self.persist();
        Ok(())
    }

    fn persist(&mut self) {
        let blob = match codec::encode(&self.dataset, self.settings.offset) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "failed to encode tide data");
                return;
            }
        };
        match self.store.put(&self.settings.store_key, &blob) {
            Ok(()) => debug!(bytes = blob.len(), "tide data saved"),
            Err(e) => warn!(error = %e, "failed to save tide data"),
        }
    }

    /// Run one step: maybe refresh, then render a frame if there is a bracket.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let millis = self.clock.millis();
        let policy = self.settings.policy;

        let mut refreshed = false;
        if policy.needs_update(&self.dataset, now) && policy.attempt_due(self.last_attempt, now) {
            self.last_attempt = Some(now);
            match self.refresh(now) {
                Ok(()) => {
                    self.consecutive_failures = 0;
                    refreshed = true;
                }
                Err(e) => {
                    self.consecutive_failures += 1;
                    warn!(
                        error = %e,
                        failures = self.consecutive_failures,
                        "failed to update tide data"
                    );
                }
            }
        }

        let frame = self.animator.frame(&self.dataset, now, millis);
        if let Some(frame) = &frame {
            self.display.render(frame.rgb);
            self.last_color = Some(frame.rgb);
            self.log_status(frame, now, millis);
        }

        let max = self.settings.max_consecutive_failures;
        TickReport {
            now,
            refreshed,
            frame,
            consecutive_failures: self.consecutive_failures,
            restart_advised: max > 0 && self.consecutive_failures >= max,
        }
    }

    fn log_status(&mut self, frame: &Frame, now: i64, millis: u64) {
        let due = self
            .last_status_ms
            .map_or(true, |at| millis.saturating_sub(at) >= self.settings.status_interval_ms);
        if !due {
            return;
        }
        self.last_status_ms = Some(millis);
        info!(
            "Time until {}: {} | progress {:.2} | colour {}",
            frame.bracket.next.label(),
            format_countdown(frame.bracket.next.timestamp - now),
            frame.progress,
            frame.rgb
        );
    }
}

fn load_persisted<S: PersistenceStore>(store: &S, settings: &EngineSettings) -> TideDataset {
    let blob = match store.get(&settings.store_key) {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            debug!("no saved tide data found");
            return TideDataset::empty();
        }
        Err(e) => {
            warn!(error = %e, "failed to read saved tide data");
            return TideDataset::empty();
        }
    };

    match codec::decode(&blob, settings.offset) {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!(error = %e, "saved tide data is corrupt, starting empty");
            TideDataset::empty()
        }
    }
}
