//! Layered error definitions
//!
//! Categorized by source: frame / config / snapshot / acquisition.

use thiserror::Error;

/// A frame buffer that cannot be read as an RGBA grid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame has zero-sized dimensions {width}x{height}")]
    Empty { width: u32, height: u32 },

    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Configuration parse or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Saving or restoring a session snapshot failed.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The camera could not be opened. Fatal to detection only.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AcquisitionError {
    #[error("camera permission denied")]
    Denied,

    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// The driver task is gone; the command or request was not delivered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("lap timer task has stopped")]
pub struct DriverClosed;

/// Unified error type
#[derive(Debug, Error)]
pub enum TimerError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Driver(#[from] DriverClosed),
}
