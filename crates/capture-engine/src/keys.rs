//! Key presses read from a line-buffered input on a background thread.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Per-frame wait used in step mode once no more keys can arrive.
pub const CLOSED_INPUT_STEP: Duration = Duration::from_millis(33);

/// Forwards every non-whitespace character typed on the input.
///
/// Only the channel crosses threads; the effect loop itself stays on the
/// main thread.
pub struct KeyWatcher {
    rx: Receiver<char>,
    closed: bool,
}

impl KeyWatcher {
    /// Watch standard input.
    pub fn stdin() -> Self {
        Self::spawn(std::io::BufReader::new(std::io::stdin()))
    }

    pub fn spawn<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("key-watcher".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    for key in line.chars().filter(|c| !c.is_whitespace()) {
                        if tx.send(key).is_err() {
                            return;
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Key watcher unavailable; quit with Ctrl-C");
        }
        Self { rx, closed: false }
    }

    /// Wait up to `interval` for the next key. Zero waits until a key
    /// arrives or the input closes.
    ///
    /// Once the input has closed no key can arrive, so a zero interval
    /// falls back to [`CLOSED_INPUT_STEP`] instead of spinning.
    pub fn wait(&mut self, interval: Duration) -> Option<char> {
        if self.closed {
            std::thread::sleep(Self::closed_interval(interval));
            return None;
        }

        let received = if interval.is_zero() {
            self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            self.rx.recv_timeout(interval)
        };

        match received {
            Ok(key) => Some(key),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                if interval.is_zero() {
                    tracing::warn!(
                        step_ms = CLOSED_INPUT_STEP.as_millis() as u64,
                        "Key input closed in step mode; advancing on a timer"
                    );
                } else {
                    tracing::debug!("Key input closed");
                }
                std::thread::sleep(Self::closed_interval(interval));
                None
            }
        }
    }

    fn closed_interval(interval: Duration) -> Duration {
        if interval.is_zero() {
            CLOSED_INPUT_STEP
        } else {
            interval
        }
    }
}
