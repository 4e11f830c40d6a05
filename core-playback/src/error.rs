//! # Playback Error Types
//!
//! Errors raised by the download cache and the playback driver.
//!
//! `PlaybackError` is `Clone`: a single in-flight download hands the same
//! final result to every caller that joined it.

use bridge_traits::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

/// Errors that can occur while resolving or playing queue entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The extractor failed (provider, network, transcode or timeout).
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The extractor reported success but the file is missing or too small.
    #[error("Downloaded file failed validation: {0}")]
    Validation(String),

    /// The provider had nothing for the request. Never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Every download attempt for a locator failed.
    #[error("Giving up on {locator} after {attempts} attempts: {source}")]
    RetriesExhausted {
        locator: String,
        attempts: u32,
        #[source]
        source: Box<PlaybackError>,
    },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// The audio sink rejected a command or failed mid-stream.
    #[error("Audio sink error: {0}")]
    Sink(String),

    /// Reading or writing a durable store failed.
    #[error("Store error: {0}")]
    Store(String),

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// Transition requested in a state that does not allow it.
    #[error("Nothing is playing")]
    NotPlaying,

    /// The driver task has shut down.
    #[error("Playback driver is not running")]
    DriverUnavailable,

    /// Rejected cache configuration.
    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Whether a download attempt that failed this way may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlaybackError::Extraction(_) | PlaybackError::Validation(_)
        )
    }

    /// Map an extractor-side bridge error.
    pub fn from_extractor(error: BridgeError) -> Self {
        match error {
            BridgeError::NoResults(message) => PlaybackError::NotFound(message),
            other => PlaybackError::Extraction(other.to_string()),
        }
    }

    /// Map a sink-side bridge error.
    pub fn from_sink(error: BridgeError) -> Self {
        PlaybackError::Sink(error.to_string())
    }
}

impl From<LibraryError> for PlaybackError {
    fn from(error: LibraryError) -> Self {
        PlaybackError::Store(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
