//! PrintVoice Error Types
//!
//! Centralized error handling for the announcement plugin.

use thiserror::Error;

/// Central error type for PrintVoice
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Renderer error: {0}")]
    Renderer(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for PrintVoice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for VoiceError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        VoiceError::Lock(err.to_string())
    }
}
