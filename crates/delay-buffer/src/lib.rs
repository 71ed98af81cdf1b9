//! Afterimage Delay Buffer
//!
//! A bounded, single-producer/single-consumer ring of frames that decouples
//! the rate at which frames are admitted from the rate and direction at
//! which they are replayed:
//! - **Decimation:** only every `input_stride`-th admission attempt is stored
//! - **Striding:** the read cursor moves by a signed `output_stride` per fetch
//! - **Eviction:** the oldest frame is dropped when full, and the read cursor
//!   is pulled back by one to follow the shift
//!
//! The buffer is agnostic to the frame payload. It is not synchronized and
//! is meant to be driven from a single loop that alternates `admit` and
//! `fetch`.

pub mod buffer;

pub use buffer::{DelayConfig, FrameDelayBuffer};
