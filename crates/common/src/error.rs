//! Error types shared across Adsight crates.

use std::path::PathBuf;

/// Top-level error type for Adsight operations.
///
/// Session-level failures (`Input`, `Config`, `NoValidDetections`) end an
/// analysis. `FrameUnavailable` is recovered per track and only surfaces here
/// when a caller converts it explicitly.
#[derive(Debug, thiserror::Error)]
pub enum AdsightError {
    #[error("Input error: {message}")]
    Input { message: String },

    #[error("Frame {frame_index} unavailable: {reason}")]
    FrameUnavailable { frame_index: u64, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No valid detections: all {total} detections were rejected by the validator")]
    NoValidDetections { total: usize },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AdsightError.
pub type AdsightResult<T> = Result<T, AdsightError>;

impl AdsightError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn frame_unavailable(frame_index: u64, reason: impl Into<String>) -> Self {
        Self::FrameUnavailable {
            frame_index,
            reason: reason.into(),
        }
    }

    /// Whether this error ends the whole analysis session.
    ///
    /// Frame failures only cost the owning track.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, Self::FrameUnavailable { .. })
    }
}
