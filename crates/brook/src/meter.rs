#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

/// Throughput sampling window.
pub const SAMPLE_WINDOW: Duration = Duration::from_millis(1000);

/// Throughput accumulator.
///
/// Byte counts are recorded on every payload arrival; once per sampling
/// window the accumulated count is converted to bytes per second and the
/// accumulator resets. Purely observational — never steers control flow.
#[derive(Debug)]
pub struct RateMeter {
    window: Duration,
    accumulated: u64,
    window_start: Instant,
}

impl RateMeter {
    pub fn new() -> Self {
        Self::with_window(SAMPLE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            accumulated: 0,
            window_start: Instant::now(),
        }
    }

    /// Record a payload's byte count.
    ///
    /// Returns the bytes-per-second figure when a sampling window closes,
    /// `None` otherwise.
    pub fn record(&mut self, bytes: usize) -> Option<u64> {
        self.accumulated = self.accumulated.saturating_add(bytes as u64);

        let elapsed = self.window_start.elapsed();
        if elapsed < self.window {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            (self.accumulated as f64 / secs).round() as u64
        } else {
            self.accumulated
        };

        self.accumulated = 0;
        self.window_start = Instant::now();
        Some(rate)
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}
