//! The real-time effect loop.

use std::time::Duration;

use afterimage_common::clock::{FpsMeter, LoopClock};
use afterimage_common::error::AfterimageResult;
use afterimage_effects::Effect;

use crate::pipeline::{DisplaySink, FrameSource};

/// Loop settings that are not part of any effect.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display wait per iteration; also how often the quit key is polled.
    /// Zero waits for a key on every frame.
    pub frame_interval: Duration,

    /// Key that ends the loop.
    pub quit_key: char,

    /// Stop on their own after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            quit_key: 'q',
            max_frames: None,
        }
    }
}

/// Why the loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub reason: StopReason,
}

/// Drives capture → effect → display until the quit key arrives.
///
/// Every stage runs in order on the calling thread. Errors from any stage
/// end the loop immediately; nothing is retried.
pub struct EffectSession {
    config: SessionConfig,
    source: Box<dyn FrameSource>,
    effect: Box<dyn Effect>,
    display: Box<dyn DisplaySink>,
}

impl EffectSession {
    pub fn new(
        config: SessionConfig,
        source: Box<dyn FrameSource>,
        effect: Box<dyn Effect>,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            config,
            source,
            effect,
            display,
        }
    }

    pub fn run(&mut self) -> AfterimageResult<SessionSummary> {
        let clock = LoopClock::start();
        let mut meter = FpsMeter::new(Duration::from_secs(1));
        let mut frames = 0u64;
        tracing::info!(
            effect = self.effect.name(),
            started = clock.epoch_wall(),
            quit_key = %self.config.quit_key,
            "Effect loop running"
        );

        loop {
            let live = self.source.next_frame()?;
            let output = self.effect.render(&live)?;
            self.display.show(&output)?;
            frames += 1;

            if let Some(report) = meter.tick(clock.elapsed_ns()) {
                tracing::debug!(fps = report.fps(), frames, "Loop rate");
            }

            let key = self.display.wait_key(self.config.frame_interval)?;
            if key == Some(self.config.quit_key) {
                tracing::info!(frames, "Quit requested");
                return Ok(SessionSummary {
                    frames,
                    reason: StopReason::QuitKey,
                });
            }
            if self.config.max_frames.is_some_and(|limit| frames >= limit) {
                tracing::info!(frames, "Frame limit reached");
                return Ok(SessionSummary {
                    frames,
                    reason: StopReason::FrameLimit,
                });
            }
        }
    }
}
