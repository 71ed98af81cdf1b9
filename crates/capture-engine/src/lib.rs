//! Afterimage Capture Engine
//!
//! Runs the real-time effect loop: one camera frame in, one composited
//! frame out, per iteration, on a single thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                EffectSession                  │
//! │  ┌──────────┐   ┌──────────────┐   ┌────────┐ │
//! │  │ Camera   │──▶│ Effect       │──▶│Display │ │
//! │  │ (appsink)│   │ delay buffer │   │(appsrc)│ │
//! │  └──────────┘   └──────────────┘   └───┬────┘ │
//! │                                        │      │
//! │                         quit key ◀─────┘      │
//! └──────────────────────────────────────────────┘
//! ```

pub mod keys;
pub mod pipeline;
pub mod session;

pub use keys::KeyWatcher;
pub use pipeline::{CameraSource, DisplaySink, FrameSource, GstDisplay};
pub use session::*;
