//! # Event Bus System
//!
//! Event-driven plumbing for the media queue core using `tokio::sync::broadcast`.
//! The playback driver, the download cache and the queue store publish typed
//! events; the service layer and hosts subscribe independently.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit   ┌───────────┐
//! │ Download Cache ├─────────>│           │   subscribe   ┌───────────────────────┐
//! └────────────────┘          │ EventBus  ├──────────────>│ Notification forwarder│
//! ┌────────────────┐   emit   │ (broadcast│               └───────────────────────┘
//! │ Playback Driver├─────────>│  channel) │   subscribe   ┌────────────┐
//! └────────────────┘          │           ├──────────────>│ Host / UI  │
//!                             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Playback(PlaybackEvent::QueueEmpty)).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Queue is empty");
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Playback Events
//! - `NowPlaying`: A track was handed to the audio sink
//! - `TrackFinished`: The sink reported the end of a track
//! - `Error`: A locator could not be resolved, or the sink/store failed
//! - `QueueEmpty`: The driver went idle because nothing is left to play
//! - `Paused` / `Resumed` / `Skipped` / `Stopped`: Operator transitions
//!
//! ### Cache Events
//! - `DownloadStarted`, `DownloadRetrying`, `DownloadCompleted`, `DownloadFailed`
//! - `StaleEvicted`: A record pointed to a missing or undersized file
//!
//! ### Queue Events
//! - `Enqueued`: An entry was appended and persisted
//! - `Cleared`: The queue was emptied by `stop`
//!
//! A subscriber that falls behind gets `RecvError::Lagged(n)` and keeps
//! going; `RecvError::Closed` means every publisher is gone. Emitting with
//! no subscribers fails, and publishers ignore that.

use bridge_traits::notification::ErrorOrigin;
use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Per-subscriber backlog used by [`EventBus::default`].
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Driver transitions and user-facing notifications
    Playback(PlaybackEvent),
    /// Download cache activity
    Cache(CacheEvent),
    /// Durable queue mutations
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::DownloadFailed { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::DownloadRetrying { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::StaleEvicted { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::NowPlaying { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::QueueEmpty) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Stopped { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Whether this event belongs to the user-facing notification stream.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            CoreEvent::Playback(
                PlaybackEvent::NowPlaying { .. }
                    | PlaybackEvent::Error { .. }
                    | PlaybackEvent::QueueEmpty
            )
        )
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events published by the playback driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A resolved asset was handed to the audio sink.
    NowPlaying {
        locator: String,
        title: String,
        /// Opaque id of whoever enqueued the entry.
        requester: u64,
        duration_seconds: u64,
        thumbnail: Option<String>,
    },
    /// The sink signalled completion for the current asset.
    TrackFinished {
        locator: String,
        /// Whether the sink reported a failure instead of a clean finish.
        failed: bool,
    },
    /// Something went wrong; the driver keeps going.
    Error {
        /// The locator involved, if any.
        locator: Option<String>,
        /// Human-readable error message.
        message: String,
        origin: ErrorOrigin,
    },
    /// Nothing left to play; the driver is idle.
    QueueEmpty,
    Paused {
        locator: String,
    },
    Resumed {
        locator: String,
    },
    Skipped {
        locator: String,
    },
    /// Operator stop; the queue was cleared.
    Stopped {
        /// Number of pending entries discarded.
        cleared: usize,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::NowPlaying { .. } => "Now playing",
            PlaybackEvent::TrackFinished { .. } => "Track finished",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::QueueEmpty => "Queue is empty",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Skipped { .. } => "Track skipped",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events published by the download cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    DownloadStarted {
        locator: String,
    },
    /// An attempt failed and another one is scheduled.
    DownloadRetrying {
        locator: String,
        /// The attempt that just failed (1-based).
        attempt: u32,
        max_attempts: u32,
        message: String,
    },
    DownloadCompleted {
        locator: String,
        title: String,
        size_bytes: u64,
    },
    /// All attempts exhausted, or a non-retryable failure.
    DownloadFailed {
        locator: String,
        message: String,
    },
    /// A record pointing to a missing or undersized file was purged.
    StaleEvicted {
        locator: String,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::DownloadStarted { .. } => "Download started",
            CacheEvent::DownloadRetrying { .. } => "Download retrying",
            CacheEvent::DownloadCompleted { .. } => "Download completed",
            CacheEvent::DownloadFailed { .. } => "Download failed",
            CacheEvent::StaleEvicted { .. } => "Stale asset evicted",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events published when the durable queue changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    Enqueued {
        locator: String,
        requester: u64,
        /// 1-based position in the pending queue after the append.
        position: usize,
    },
    Cleared {
        removed: usize,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Enqueued { .. } => "Entry enqueued",
            QueueEvent::Cleared { .. } => "Queue cleared",
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Broadcast hub shared by every publisher in the core.
///
/// Cloning is cheap and every clone publishes into the same channel. Each
/// [`subscribe`](Self::subscribe) call gets its own cursor starting at the
/// next event; a subscriber more than `capacity` events behind sees
/// `RecvError::Lagged` and then continues from the oldest retained event.
///
/// Notification events (see [`CoreEvent::is_notification`]) are also copied
/// into every [`notifications`](Self::notifications) receiver. Those are
/// unbounded, so a slow consumer never loses a now-playing or error event to
/// lag, however many cache and queue events pass in between.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
    notification_taps: Arc<Mutex<Vec<mpsc::UnboundedSender<CoreEvent>>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
            notification_taps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Publish to every live subscriber.
    ///
    /// Fails only when nobody is subscribed on the broadcast side; publishers
    /// treat that as a no-op. Notification receivers are fed either way.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        if event.is_notification() {
            self.notification_taps
                .lock()
                .retain(|tap| tap.send(event.clone()).is_ok());
        }
        self.tx.send(event)
    }

    /// Lossless receiver of notification events only.
    ///
    /// Yields `None` once every clone of the bus is dropped.
    pub fn notifications(&self) -> mpsc::UnboundedReceiver<CoreEvent> {
        let (tap, receiver) = mpsc::unbounded_channel();
        self.notification_taps.lock().push(tap);
        receiver
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// [`subscribe`](Self::subscribe), wrapped for filtering.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("notification_receivers", &self.notification_taps.lock().len())
            .finish()
    }
}

// ============================================================================
// Filtered subscription
// ============================================================================

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A subscription that silently drops events rejected by its predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let notifications = bus.stream().filter(CoreEvent::is_notification);
/// ```
pub struct EventStream {
    rx: Receiver<CoreEvent>,
    predicate: Option<Predicate>,
}

impl EventStream {
    pub fn new(rx: Receiver<CoreEvent>) -> Self {
        Self { rx, predicate: None }
    }

    /// Keep only events for which `predicate` returns true. Replaces any
    /// earlier filter.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.predicate.as_ref().map_or(true, |keep| keep(event))
    }

    /// Wait for the next accepted event.
    ///
    /// Lag and closure surface as the underlying [`RecvError`]; after
    /// `Lagged` the stream is still usable.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next accepted event already buffered, or `None` when there is none.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.accepts(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
