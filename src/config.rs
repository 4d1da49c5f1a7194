//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the tide-config.toml file.
//! It provides a centralized way to configure the tide station, the extremes service,
//! refresh scheduling, the LED animation and where state is persisted.

use crate::animator::{ColorPolicy, ExtremeChannel};
use crate::ingest::TimestampConvention;
use crate::scheduler::UpdatePolicy;
use crate::StationOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "tide-config.toml";

/// Application configuration loaded from tide-config.toml
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tide station configuration
    pub station: StationConfig,
    /// Extremes service configuration
    pub api: ApiConfig,
    /// Refresh scheduling and retry policy
    pub schedule: ScheduleConfig,
    /// LED colour and wave animation
    pub led: LedConfig,
    /// Persisted state location
    pub storage: StorageConfig,
}

/// Tide station configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StationConfig {
    /// Station ID understood by the extremes service (e.g. "8447504")
    pub id: String,
    /// Human-readable station name for reference
    pub name: String,
    /// Standard offset from UTC in seconds (-18000 for US Eastern)
    pub gmt_offset_secs: i64,
    /// Daylight saving offset in seconds, added on top of `gmt_offset_secs`
    pub daylight_offset_secs: i64,
    /// Whether the service reports station-local or true UTC timestamps
    pub timestamps: TimestampConvention,
}

/// Extremes service configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoint returning `{ tideType, waterLevel, extremes: [...] }`; empty disables fetching
    pub endpoint: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Hours before now to request (the most recent past extreme lives here)
    pub lookback_hours: i64,
    /// Hours after now to request
    pub lookahead_hours: i64,
}

/// Refresh scheduling and retry policy
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Maximum age of fetched data before a refresh is forced
    pub staleness_hours: i64,
    /// Minimum spacing between refresh attempts
    pub check_interval_minutes: i64,
    /// Consecutive failed refreshes before a restart is advised
    pub max_consecutive_failures: u32,
}

/// LED colour and wave animation configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LedConfig {
    /// Channel that represents high water; the other of red/green represents low water
    pub high_channel: ExtremeChannel,
    /// Shortest decorative wave cycle in milliseconds
    pub wave_min_interval_ms: u64,
    /// Longest decorative wave cycle in milliseconds
    pub wave_max_interval_ms: u64,
    /// Peak blue intensity of the wave overlay (0-255)
    pub wave_max_blue: u8,
    /// Delay between animation frames in milliseconds
    pub frame_interval_ms: u64,
    /// How often to log the tide status line, in seconds
    pub status_interval_secs: u64,
}

/// Persisted state configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted dataset
    pub dir: PathBuf,
    /// Slot name of the serialized dataset
    pub key: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            id: "8447504".to_string(),
            name: "South Yarmouth, Bass River".to_string(),
            gmt_offset_secs: -18_000,   // US Eastern, UTC-5
            daylight_offset_secs: 3_600, // EDT
            timestamps: TimestampConvention::StationLocal,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            endpoint: String::new(),
            timeout_secs: 5,
            lookback_hours: 12,
            lookahead_hours: 48,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            staleness_hours: 6,
            check_interval_minutes: 15,
            max_consecutive_failures: 3,
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        LedConfig {
            high_channel: ExtremeChannel::Red,
            wave_min_interval_ms: 10_000,
            wave_max_interval_ms: 20_000,
            wave_max_blue: 32,
            frame_interval_ms: 20,
            status_interval_secs: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            dir: PathBuf::from("/var/tmp/tide-glow"),
            key: "tidestate".to_string(),
        }
    }
}

impl StationConfig {
    pub fn offset(&self) -> StationOffset {
        StationOffset {
            gmt_offset_secs: self.gmt_offset_secs,
            daylight_offset_secs: self.daylight_offset_secs,
        }
    }
}

impl ScheduleConfig {
    pub fn update_policy(&self) -> UpdatePolicy {
        UpdatePolicy {
            staleness_secs: self.staleness_hours * 3600,
            retry_interval_secs: self.check_interval_minutes * 60,
        }
    }
}

impl LedConfig {
    pub fn color_policy(&self) -> ColorPolicy {
        ColorPolicy {
            high: self.high_channel,
        }
    }
}

impl Config {
    /// Load configuration from tide-config.toml file
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(station = %config.station.name, "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "invalid config file format, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(
                    path = %path.as_ref().display(),
                    "no config file found, using default configuration"
                );
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
