//! Clock and timing utilities for the effect loop.
//!
//! The session loop anchors its statistics to a monotonic epoch recorded
//! when the loop starts, and reports the achieved frame rate once per
//! reporting window.

use std::time::{Duration, Instant};

/// A loop clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment the loop started).
#[derive(Debug, Clone)]
pub struct LoopClock {
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl LoopClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get nanoseconds elapsed since loop start.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Wall-clock time at loop start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Snapshot emitted by [`FpsMeter`] at the end of each window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    /// Iterations completed in the window.
    pub frames: u64,
    /// Window length in seconds.
    pub window_secs: f64,
}

impl FpsReport {
    pub fn fps(&self) -> f64 {
        if self.window_secs <= 0.0 {
            return 0.0;
        }
        self.frames as f64 / self.window_secs
    }
}

/// Counts loop iterations and yields a report once per window.
#[derive(Debug)]
pub struct FpsMeter {
    window_ns: u64,
    window_start_ns: Option<u64>,
    frames: u64,
}

impl FpsMeter {
    /// Create a meter reporting once per `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            window_ns: window.as_nanos().max(1) as u64,
            window_start_ns: None,
            frames: 0,
        }
    }

    /// Record one iteration completed at `current_ns`.
    ///
    /// The first call opens the window. Returns a report when the window
    /// has elapsed, then starts a new one.
    pub fn tick(&mut self, current_ns: u64) -> Option<FpsReport> {
        let start = *self.window_start_ns.get_or_insert(current_ns);
        self.frames += 1;

        let elapsed = current_ns.saturating_sub(start);
        if elapsed < self.window_ns {
            return None;
        }

        let report = FpsReport {
            frames: self.frames,
            window_secs: elapsed as f64 / 1_000_000_000.0,
        };
        self.window_start_ns = Some(current_ns);
        self.frames = 0;
        Some(report)
    }
}
