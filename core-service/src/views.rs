//! Read-only values handed to the presentation layer.

use core_library::{format_duration, AssetRecord, Locator, RequesterId};
use core_playback::EnqueueReceipt;
use serde::Serialize;

/// Shown for queued entries whose asset has not been downloaded yet.
pub const LOADING_TITLE: &str = "Loading...";

/// Result of [`MediaQueueService::play`](crate::MediaQueueService::play).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    pub locator: Locator,
    /// Title from search metadata; `None` when a locator was given directly.
    pub title: Option<String>,
    pub receipt: EnqueueReceipt,
}

/// One pending queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    /// 1-based playback position.
    pub position: usize,
    pub title: String,
    pub locator: Locator,
    pub requester: RequesterId,
}

/// The head of the queue plus the full pending count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuePage {
    pub items: Vec<QueueItem>,
    pub total: usize,
}

impl QueuePage {
    /// Entries beyond the page.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.items.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentTrack {
    pub record: AssetRecord,
    pub requester: RequesterId,
    pub is_paused: bool,
}

impl CurrentTrack {
    /// `m:ss`
    pub fn duration(&self) -> String {
        format_duration(self.record.duration_seconds)
    }
}

/// A playlist rendered as an export document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPlaylist {
    /// Suggested file name, e.g. `Road_Trip_playlist.json`.
    pub file_name: String,
    pub json: String,
}
