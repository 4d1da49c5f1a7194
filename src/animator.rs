//! # Tide Progress Animation
//!
//! Maps "where are we between the last and the next extreme" to a single LED colour.
//!
//! ## Colour Model
//! - **Red/green**: carry the tide phase. The channel of the extreme being departed
//!   fades out while the channel of the extreme being approached fades in:
//!   ```text
//!   outgoing = 255 * (1 - progress)
//!   incoming = 255 * progress
//!   ```
//!   Which channel means "high water" is a [`ColorPolicy`] setting (red by default).
//! - **Blue**: purely decorative wave. A free-running oscillator with a randomised
//!   period draws one half sine per cycle:
//!   ```text
//!   blue = max_blue * sin(pi * phase)
//!   ```
//!   It never influences progress or the red/green channels.
//!
//! ## Bracket Selection
//! The bracket is the pair of extremes surrounding `now`. Before the first future
//! extreme it is `(current, future[0])`; later it is the last future extreme at or
//! before `now` and its successor. Once `now` reaches the last future extreme there
//! is no bracket and no frame: the display keeps whatever it showed last rather
//! than extrapolating past the known window.

use crate::{TideDataset, TideExtreme};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 24-bit colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack as `0xRRGGBB`.
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06X}", self.to_u32())
    }
}

/// Colour channel assigned to an extreme type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremeChannel {
    #[default]
    Red,
    Green,
}

impl ExtremeChannel {
    pub fn other(self) -> Self {
        match self {
            ExtremeChannel::Red => ExtremeChannel::Green,
            ExtremeChannel::Green => ExtremeChannel::Red,
        }
    }
}

/// Which channel stands for high water; low water gets the other one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorPolicy {
    pub high: ExtremeChannel,
}

impl ColorPolicy {
    pub fn channel_for(&self, is_high: bool) -> ExtremeChannel {
        if is_high {
            self.high
        } else {
            self.high.other()
        }
    }

    /// Red/green base colour for `progress` away from an extreme of type `departing_high`.
    ///
    /// Blue is always zero; it belongs to the wave overlay.
    pub fn base_color(&self, progress: f32, departing_high: bool) -> Rgb {
        let progress = progress.clamp(0.0, 1.0);
        let outgoing = (255.0 * (1.0 - progress)).round() as u8;
        let incoming = (255.0 * progress).round() as u8;

        match self.channel_for(departing_high) {
            ExtremeChannel::Red => Rgb::new(outgoing, incoming, 0),
            ExtremeChannel::Green => Rgb::new(incoming, outgoing, 0),
        }
    }
}

/// The extremes on either side of the current time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bracket {
    pub current: TideExtreme,
    pub next: TideExtreme,
}

impl Bracket {
    /// Fraction of the way from `current` to `next`, clamped to `[0, 1]`.
    ///
    /// A zero-width (or inverted) bracket yields 0.
    pub fn progress(&self, now: i64) -> f32 {
        let total = self.next.timestamp.saturating_sub(self.current.timestamp);
        if total <= 0 {
            return 0.0;
        }
        let remaining = self.next.timestamp.saturating_sub(now);
        (1.0 - remaining as f64 / total as f64).clamp(0.0, 1.0) as f32
    }
}

/// Locate the bracket around `now`, or `None` once the window is empty or consumed.
pub fn find_bracket(dataset: &TideDataset, now: i64) -> Option<Bracket> {
    let future = dataset.future_extremes();
    let last = future.last()?;
    if now >= last.timestamp {
        return None;
    }

    let first = future[0];
    if now < first.timestamp {
        return Some(Bracket {
            current: *dataset.current(),
            next: first,
        });
    }

    // first <= now < last, so 1 <= idx < len
    let idx = future.partition_point(|extreme| extreme.timestamp <= now);
    Some(Bracket {
        current: future[idx - 1],
        next: future[idx],
    })
}

/// Free-running blue wave with a randomised period per cycle.
#[derive(Debug)]
pub struct WaveOscillator {
    min_interval_ms: u64,
    max_interval_ms: u64,
    max_blue: u8,
    cycle_start_ms: Option<u64>,
    cycle_ms: u64,
    rng: StdRng,
}

impl WaveOscillator {
    pub fn new(min_interval_ms: u64, max_interval_ms: u64, max_blue: u8) -> Self {
        Self::with_rng(min_interval_ms, max_interval_ms, max_blue, StdRng::from_entropy())
    }

    /// Deterministic oscillator for reproducible animation.
    pub fn seeded(min_interval_ms: u64, max_interval_ms: u64, max_blue: u8, seed: u64) -> Self {
        Self::with_rng(min_interval_ms, max_interval_ms, max_blue, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min_interval_ms: u64, max_interval_ms: u64, max_blue: u8, rng: StdRng) -> Self {
        Self {
            min_interval_ms: min_interval_ms.max(1),
            max_interval_ms,
            max_blue,
            cycle_start_ms: None,
            cycle_ms: min_interval_ms.max(1),
            rng,
        }
    }

    fn roll_period(&mut self) -> u64 {
        if self.max_interval_ms <= self.min_interval_ms {
            self.min_interval_ms
        } else {
            self.rng.gen_range(self.min_interval_ms..self.max_interval_ms)
        }
    }

    /// Length of the cycle in progress, in milliseconds.
    pub fn cycle_ms(&self) -> u64 {
        self.cycle_ms
    }

    /// Blue intensity at `millis`, starting a new cycle when the current one has ended.
    pub fn sample(&mut self, millis: u64) -> u8 {
        let start = match self.cycle_start_ms {
            Some(start) if millis >= start && millis - start < self.cycle_ms => start,
            _ => {
                self.cycle_ms = self.roll_period();
                self.cycle_start_ms = Some(millis);
                millis
            }
        };

        let phase = (millis - start) as f32 / self.cycle_ms as f32;
        (f32::from(self.max_blue) * (PI * phase).sin())
            .round()
            .clamp(0.0, f32::from(self.max_blue)) as u8
    }
}

/// One computed animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub rgb: Rgb,
    pub progress: f32,
    pub bracket: Bracket,
}

/// Turns the dataset into LED frames.
///
/// The dataset is only borrowed; the wave phase is the only state this owns.
#[derive(Debug)]
pub struct ProgressAnimator {
    policy: ColorPolicy,
    wave: WaveOscillator,
}

impl ProgressAnimator {
    pub fn new(policy: ColorPolicy, wave: WaveOscillator) -> Self {
        Self { policy, wave }
    }

    /// Compute the frame for `now`, or `None` when there is no bracket.
    pub fn frame(&mut self, dataset: &TideDataset, now: i64, millis: u64) -> Option<Frame> {
        let bracket = find_bracket(dataset, now)?;
        let progress = bracket.progress(now);
        let base = self.policy.base_color(progress, bracket.current.is_high);
        let blue = self.wave.sample(millis);

        Some(Frame {
            rgb: Rgb { b: blue, ..base },
            progress,
            bracket,
        })
    }
}

/// Render a countdown as `"{h}h {m}m"`.
///
/// Values over a year are folded into a single day; that only happens with a bogus
/// clock and keeps the status line readable.
pub fn format_countdown(seconds: i64) -> String {
    let mut seconds = seconds.max(0);
    if seconds > 31_536_000 {
        seconds %= 86_400;
    }
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}
