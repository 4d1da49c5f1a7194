//! # Tide Glow Application Entry Point
//!
//! This binary wires the library's engine to real collaborators (system clock, HTTPS
//! fetcher, file store, terminal or log output) and runs the tick loop. It maps the
//! engine's restart advice to a non-zero exit so the process supervisor (systemd on
//! the Pi) can restart it.
//!
//! ## Flags
//! - `--stdout`: draw the LED colour as a terminal swatch instead of logging it
//! - `--once`: run a single tick and exit
//! - `--ephemeral`: keep state in memory only
//! - `--config <path>`: read configuration from `path` instead of `tide-config.toml`

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use std::{env, thread, time::Duration};
use tide_glow_lib::config::Config;
use tide_glow_lib::display::{LogSink, TerminalSink};
use tide_glow_lib::engine::{animator_from_config, Engine, EngineSettings};
use tide_glow_lib::storage::{FileStore, MemoryStore};
use tide_glow_lib::tide_data::HttpFetcher;
use tide_glow_lib::traits::{DisplaySink, PersistenceStore, SystemClock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command line options.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Development mode: terminal swatch output
    pub stdout: bool,
    pub once: bool,
    pub ephemeral: bool,
    pub config: Option<String>,
}

/// Parse flags; unknown arguments are ignored with a warning.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Options {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stdout" => options.stdout = true,
            "--once" => options.once = true,
            "--ephemeral" => options.ephemeral = true,
            "--config" => options.config = args.next(),
            other => warn!(argument = other, "ignoring unknown argument"),
        }
    }
    options
}

fn run<S, D>(config: &Config, options: &Options, store: S, display: D) -> anyhow::Result<()>
where
    S: PersistenceStore,
    D: DisplaySink,
{
    let fetcher = HttpFetcher::new(
        &config.api.endpoint,
        Duration::from_secs(config.api.timeout_secs),
        config.station.offset(),
    )
    .context("creating HTTP client")?;

    let mut engine = Engine::start(
        EngineSettings::from_config(config),
        animator_from_config(config),
        fetcher,
        store,
        SystemClock::new(),
        display,
    );

    let frame_interval = Duration::from_millis(config.led.frame_interval_ms.max(1));
    loop {
        let report = engine.tick();

        if report.restart_advised {
            error!(
                failures = report.consecutive_failures,
                "too many failed tide updates, exiting for restart"
            );
            return Err(anyhow::anyhow!(
                "{} consecutive tide update failures",
                report.consecutive_failures
            ));
        }

        if options.once {
            match report.frame {
                Some(frame) => info!(
                    progress = frame.progress,
                    colour = %frame.rgb,
                    next_update = engine.next_update_time(),
                    "single tick complete"
                ),
                None => info!("single tick complete, no tide window to display"),
            }
            if options.stdout {
                println!();
            }
            return Ok(());
        }

        thread::sleep(frame_interval);
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args(env::args().skip(1));
    let config = match &options.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    info!(
        station = %config.station.name,
        id = %config.station.id,
        "tide glow starting"
    );
    if config.api.endpoint.is_empty() {
        warn!("api.endpoint is not set; tide data can only come from saved state");
    }

    match (options.stdout, options.ephemeral) {
        (true, true) => run(&config, &options, MemoryStore::new(), TerminalSink::stdout()),
        (true, false) => run(
            &config,
            &options,
            FileStore::new(&config.storage.dir),
            TerminalSink::stdout(),
        ),
        (false, true) => run(&config, &options, MemoryStore::new(), LogSink::new()),
        (false, false) => run(
            &config,
            &options,
            FileStore::new(&config.storage.dir),
            LogSink::new(),
        ),
    }
}
