//! Driver state and the values it reports back to callers.

use core_library::{AssetRecord, QueueEntry};
use serde::Serialize;
use std::fmt;

/// Per-context playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing is being resolved or played.
    Idle,
    /// The head entry was popped and is being resolved.
    Resolving,
    /// An asset is held by the audio sink.
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Resolving => "resolving",
            PlaybackState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// The track currently held by the sink and who asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub entry: QueueEntry,
    pub record: AssetRecord,
}

/// Point-in-time view of a driver.
#[derive(Debug, Clone, Serialize)]
pub struct DriverSnapshot {
    pub state: PlaybackState,
    /// Set only while `state` is [`PlaybackState::Playing`].
    pub current: Option<NowPlaying>,
    /// Entry being resolved, set only while `state` is
    /// [`PlaybackState::Resolving`].
    pub resolving: Option<QueueEntry>,
    /// Pending entries in playback order.
    pub queue: Vec<QueueEntry>,
    pub paused: bool,
}

impl DriverSnapshot {
    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }
}

/// Result of an accepted enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    /// 1-based position in the pending queue right after the append.
    pub position: usize,
    /// Whether the driver was idle and started advancing because of it.
    pub started: bool,
}
