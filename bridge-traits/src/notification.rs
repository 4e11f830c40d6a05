//! Notification bridge.
//!
//! Receives the driver's user-facing events (now playing, error, queue empty)
//! and renders them in whatever presentation layer the host owns.

use serde::{Deserialize, Serialize};

use crate::{error::Result, platform::PlatformSendSync};

/// Where a surfaced error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// Download/extraction gave up on a locator.
    Resolution,
    /// The audio sink failed while playing.
    Sink,
    /// A durable store could not be written.
    Store,
}

/// User-facing notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    NowPlaying {
        locator: String,
        title: String,
        requester: u64,
        duration_seconds: u64,
        thumbnail: Option<String>,
    },
    Error {
        locator: Option<String>,
        message: String,
        origin: ErrorOrigin,
    },
    QueueEmpty,
}

impl Notification {
    /// Plain-text rendering for hosts without rich formatting.
    pub fn to_text(&self) -> String {
        match self {
            Notification::NowPlaying { title, .. } => format!("Now playing: {title}"),
            Notification::Error { message, .. } => format!("Error: {message}"),
            Notification::QueueEmpty => "Queue is empty.".to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait NotificationSink: PlatformSendSync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}
