//! # LED Output Sinks
//!
//! This module provides [`DisplaySink`] implementations for hosts without the LED
//! attached: a terminal swatch for development (`--stdout`) and a log-only sink for
//! headless runs. Both are fire-and-forget; neither can fail the caller.

use crate::animator::Rgb;
use crate::traits::DisplaySink;
use std::io::Write;
use tracing::{debug, warn};

/// Draws the colour as a 24-bit ANSI swatch, rewriting one terminal line in place.
pub struct TerminalSink<W: Write> {
    out: W,
    last: Option<Rgb>,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    /// Last colour drawn, if any.
    pub fn last(&self) -> Option<Rgb> {
        self.last
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One swatch line, without the trailing carriage return.
pub fn swatch_line(rgb: Rgb) -> String {
    format!(
        "\x1b[48;2;{};{};{}m        \x1b[0m {}",
        rgb.r, rgb.g, rgb.b, rgb
    )
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn render(&mut self, rgb: Rgb) {
        if self.last == Some(rgb) {
            return;
        }
        self.last = Some(rgb);

        let written = write!(self.out, "\r{}", swatch_line(rgb)).and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "terminal sink write failed");
        }
    }
}

/// Logs colour changes at debug level; for hosts with nothing to light up.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<Rgb>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Rgb> {
        self.last
    }
}

impl DisplaySink for LogSink {
    fn render(&mut self, rgb: Rgb) {
        if self.last != Some(rgb) {
            debug!(color = %rgb, "LED colour");
            self.last = Some(rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swatch_line() {
        let line = swatch_line(Rgb::new(255, 16, 0));
        assert!(line.starts_with("\x1b[48;2;255;16;0m"));
        assert!(line.ends_with("#FF1000"));
    }

    #[test]
    fn test_terminal_sink_skips_repeats() {
        let mut sink = TerminalSink::new(Vec::new());
        sink.render(Rgb::new(1, 2, 3));
        sink.render(Rgb::new(1, 2, 3));
        sink.render(Rgb::new(4, 5, 6));
        assert_eq!(sink.last(), Some(Rgb::new(4, 5, 6)));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output.matches('\r').count(), 2);
        assert!(output.contains("#010203"));
        assert!(output.contains("#040506"));
    }

    #[test]
    fn test_log_sink_tracks_last() {
        let mut sink = LogSink::new();
        assert_eq!(sink.last(), None);
        sink.render(Rgb::OFF);
        assert_eq!(sink.last(), Some(Rgb::OFF));
    }
}
