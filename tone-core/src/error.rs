//! # Error Module
//!
//! Errors surfaced by the tone core. A missing pitch is not an error:
//! the estimator and the note mapper report it as `None`.

/// Errors produced by synthesis, encoding and playback.
#[derive(Debug, thiserror::Error)]
pub enum ToneError {
    /// A caller supplied a value outside the accepted domain
    /// (non-positive frequency, unknown instrument, unknown pitch class, ...).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A tone is already in flight; the new request was dropped.
    #[error("A tone is already playing")]
    PlaybackBusy,

    /// The platform audio resource failed to open, play or release.
    #[error("Platform playback failed: {0}")]
    PlatformPlayback(String),
}

impl ToneError {
    /// Shorthand for building an `InvalidParameter` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        ToneError::InvalidParameter(message.into())
    }
}

impl From<anyhow::Error> for ToneError {
    fn from(err: anyhow::Error) -> Self {
        ToneError::PlatformPlayback(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ToneError>;
