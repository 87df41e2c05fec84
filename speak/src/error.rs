//! Error types for speech sessions

use thiserror::Error;

/// Errors that can end a speech session
#[derive(Error, Debug)]
pub enum SpeakError {
    /// A required setting is missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backend failed to produce audio (transport, HTTP, or platform failure)
    #[error("Provider error: {0}")]
    Provider(String),

    /// The local audio resource failed to play
    #[error("Playback error: {0}")]
    Playback(String),

    /// The session was stopped on purpose
    #[error("Speech cancelled")]
    Cancelled,
}

impl SpeakError {
    /// Whether this error should be surfaced to the user as a failure
    pub fn is_failure(&self) -> bool {
        !matches!(self, SpeakError::Cancelled)
    }
}

impl From<reqwest::Error> for SpeakError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SpeakError::Provider(format!("Request timed out: {}", err.without_url()))
        } else {
            SpeakError::Provider(format!("Request failed: {}", err.without_url()))
        }
    }
}

/// Result type alias for speech operations
pub type Result<T> = std::result::Result<T, SpeakError>;
