//! Error types shared across Afterimage crates.

/// Top-level error type for Afterimage operations.
#[derive(Debug, thiserror::Error)]
pub enum AfterimageError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Delay buffer is empty: fetch called before any frame was admitted")]
    EmptyBuffer,

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Display error: {message}")]
    Display { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Configuration file error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AfterimageError.
pub type AfterimageResult<T> = Result<T, AfterimageError>;

impl AfterimageError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn display(msg: impl Into<String>) -> Self {
        Self::Display {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error comes from bad user input rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. } | Self::Config { .. })
    }
}
