//! The frame delay buffer.

use std::collections::VecDeque;

use afterimage_common::error::{AfterimageError, AfterimageResult};

/// Construction parameters for a [`FrameDelayBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayConfig {
    /// Maximum number of retained frames.
    pub capacity: usize,

    /// Only every `input_stride`-th admission attempt is stored.
    pub input_stride: usize,

    /// Read cursor step per fetch. Negative values replay backwards.
    pub output_stride: isize,
}

impl DelayConfig {
    pub fn new(capacity: usize, input_stride: usize, output_stride: isize) -> Self {
        Self {
            capacity,
            input_stride,
            output_stride,
        }
    }

    /// Reject zero capacity and zero strides.
    pub fn validate(&self) -> AfterimageResult<()> {
        if self.capacity == 0 {
            return Err(AfterimageError::invalid_configuration(
                "delay buffer capacity must be >0",
            ));
        }
        if self.input_stride == 0 {
            return Err(AfterimageError::invalid_configuration(
                "input stride must be >0",
            ));
        }
        if self.output_stride == 0 {
            return Err(AfterimageError::invalid_configuration(
                "output stride must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Bounded FIFO of frames with a decimating write side and a striding,
/// wrapping read side.
///
/// The output cursor is signed and may sit outside `[0, len)` between
/// calls: negative strides and eviction corrections push it around freely,
/// and [`fetch`](Self::fetch) folds it back with Euclidean modulo.
#[derive(Debug, Clone)]
pub struct FrameDelayBuffer<F> {
    config: DelayConfig,

    /// Oldest frame at the front.
    storage: VecDeque<F>,

    /// Number of admission attempts so far.
    input_cursor: u64,

    /// Read position, normalized lazily. Wider than the stride so that
    /// `index + stride` and eviction corrections never overflow.
    output_cursor: i128,
}

impl<F> FrameDelayBuffer<F> {
    /// Create an empty buffer.
    ///
    /// Fails with `InvalidConfiguration` when any of the three parameters is zero.
    pub fn new(capacity: usize, input_stride: usize, output_stride: isize) -> AfterimageResult<Self> {
        Self::from_config(DelayConfig::new(capacity, input_stride, output_stride))
    }

    pub fn from_config(config: DelayConfig) -> AfterimageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            storage: VecDeque::with_capacity(config.capacity),
            input_cursor: 0,
            output_cursor: 0,
        })
    }

    /// Admit a frame produced on demand.
    ///
    /// The supplier runs only when this attempt survives decimation, so
    /// expensive derived frames are never computed just to be dropped.
    /// Returns whether a frame was stored.
    pub fn admit_with<S>(&mut self, supplier: S) -> bool
    where
        S: FnOnce() -> F,
    {
        match self.try_admit_with(|| Ok::<F, std::convert::Infallible>(supplier())) {
            Ok(stored) => stored,
            Err(never) => match never {},
        }
    }

    /// Admit a frame produced by a fallible supplier.
    ///
    /// A supplier error is returned unchanged; the attempt still counts
    /// toward decimation but nothing is evicted or stored.
    pub fn try_admit_with<S, E>(&mut self, supplier: S) -> Result<bool, E>
    where
        S: FnOnce() -> Result<F, E>,
    {
        let attempt = self.input_cursor;
        self.input_cursor += 1;
        if attempt % self.config.input_stride as u64 != 0 {
            return Ok(false);
        }

        let frame = supplier()?;
        if self.storage.len() >= self.config.capacity {
            self.storage.pop_front();
            self.output_cursor -= 1;
            tracing::trace!(cursor = %self.output_cursor, "evicted oldest frame");
        }
        self.storage.push_back(frame);
        Ok(true)
    }

    /// Read the frame under the output cursor, then advance the cursor.
    ///
    /// The returned reference is only valid until the next mutation; callers
    /// that keep the frame across iterations must clone it.
    pub fn fetch(&mut self) -> AfterimageResult<&F> {
        let Some(index) = self.peek_index() else {
            return Err(AfterimageError::EmptyBuffer);
        };
        tracing::trace!(index, len = self.storage.len(), "fetching delayed frame");

        self.output_cursor = index as i128 + self.config.output_stride as i128;
        Ok(&self.storage[index])
    }

    /// Index the next [`fetch`](Self::fetch) will read, or `None` when empty.
    pub fn peek_index(&self) -> Option<usize> {
        if self.storage.is_empty() {
            return None;
        }
        Some(self.output_cursor.rem_euclid(self.storage.len() as i128) as usize)
    }

    /// Drop all frames and reset both cursors.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.input_cursor = 0;
        self.output_cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.storage.len() == self.config.capacity
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn input_stride(&self) -> usize {
        self.config.input_stride
    }

    pub fn output_stride(&self) -> isize {
        self.config.output_stride
    }

    pub fn config(&self) -> DelayConfig {
        self.config
    }

    /// Number of admission attempts, stored or decimated.
    pub fn admissions(&self) -> u64 {
        self.input_cursor
    }

    /// Stored frames, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.storage.iter()
    }
}

impl<F: Clone> FrameDelayBuffer<F> {
    /// Admit a ready-made frame, cloning it only when it will be stored.
    pub fn admit(&mut self, frame: &F) -> bool {
        self.admit_with(|| frame.clone())
    }
}
