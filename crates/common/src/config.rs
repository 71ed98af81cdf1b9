//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AfterimageError, AfterimageResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default pipeline settings, overridden by command-line flags.
    pub pipeline: PipelineDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    /// Number of frames held by the delay buffer.
    pub queue_size: usize,

    /// Keep only every Nth captured frame.
    pub skip_in: usize,

    /// Read cursor step per displayed frame (can be negative).
    pub skip_out: isize,

    /// Diameter of the elliptical closing kernel applied to the foreground mask.
    pub morph_size: usize,

    /// Display wait per iteration in milliseconds. Zero waits for a key.
    pub frame_interval_ms: u64,

    /// Camera index (`/dev/video{device}`).
    pub device: u32,

    /// Background model used by the masking effect.
    pub subtractor: BackgroundModelKind,

    /// Motion estimator used by the flow effect.
    pub flow: FlowMethod,
}

/// Which background model produces the foreground mask.
///
/// Resolved once at startup and injected into the mask effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundModelKind {
    /// Per-pixel running mean and variance.
    #[default]
    Gaussian,
    /// Exponential running average with a fixed difference threshold.
    RunningAverage,
    /// OpenCV Gaussian mixture (MOG2). Needs the `opencv` feature.
    Mog2,
    /// OpenCV K-nearest-neighbours. Needs the `opencv` feature.
    Knn,
}

/// Which estimator computes the dense motion field for the flow effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowMethod {
    /// Block matching on luma, pure Rust.
    #[default]
    BlockMatching,
    /// OpenCV Farneback polynomial expansion. Needs the `opencv` feature.
    Farneback,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "afterimage=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            queue_size: 30,
            skip_in: 1,
            skip_out: 3,
            morph_size: 5,
            frame_interval_ms: 33,
            device: 0,
            subtractor: BackgroundModelKind::default(),
            flow: FlowMethod::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Parsed from this file.
    File(PathBuf),
    /// No file at this path; built-in defaults apply.
    Defaults(PathBuf),
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults(path) => write!(f, "defaults (no {})", path.display()),
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults
    /// when no file exists.
    ///
    /// Runs before logging is set up, so the origin is returned for the
    /// caller to log once a subscriber exists.
    pub fn load() -> AfterimageResult<(Self, ConfigOrigin)> {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`. A missing file yields defaults; an
    /// unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> AfterimageResult<(Self, ConfigOrigin)> {
        if !path.exists() {
            return Ok((Self::default(), ConfigOrigin::Defaults(path.to_path_buf())));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            AfterimageError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&content)
            .map_err(|e| AfterimageError::config(format!("failed to parse {}: {e}", path.display())))?;
        Ok((config, ConfigOrigin::File(path.to_path_buf())))
    }

    /// Parse a config document. Missing fields take their defaults.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("afterimage").join("config.json")
}
