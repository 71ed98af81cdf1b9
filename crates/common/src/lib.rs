//! Afterimage Common Utilities
//!
//! Shared infrastructure for all Afterimage crates:
//! - Error types and result aliases
//! - Loop clock and frame-rate statistics
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
