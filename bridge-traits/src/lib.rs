//! # Host Bridge Traits
//!
//! Collaborator seams the media queue core depends on but does not implement.
//!
//! ## Overview
//!
//! The core owns the durable queue, the download cache and the playback state
//! machine. Everything that touches the outside world goes through one of the
//! traits below so hosts (a chat bot, a desktop daemon, a test harness) can
//! supply their own adapters.
//!
//! ## Traits
//!
//! ### Media
//! - [`Extractor`](extractor::Extractor) - Search, playlist expansion, download + transcode
//! - [`AudioSink`](playback::AudioSink) - Real-time output with a one-shot completion signal
//!
//! ### Presentation
//! - [`NotificationSink`](notification::NotificationSink) - Now-playing, error and queue-empty events
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Host    | Implementation Crate | Extractor | Audio sink |
//! |---------|----------------------|-----------|------------|
//! | Desktop | `bridge-desktop`     | yt-dlp    | ffplay     |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let extractor = config.extractor.clone().ok_or_else(|| Error::CapabilityMissing {
//!     capability: "Extractor".to_string(),
//!     message: "No extractor provided. Desktop: enable the desktop-shims feature.".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should report "nothing found" as `BridgeError::NoResults` and keep
//! `OperationFailed` for transient or hard failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared across
//! tokio tasks.

pub mod error;
pub mod extractor;
pub mod notification;
pub mod platform;
pub mod playback;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use extractor::{is_locator, ExtractedMedia, Extractor, SearchHit};
pub use notification::{ErrorOrigin, Notification, NotificationSink};
pub use playback::{
    completion_channel, AudioSink, CompletionSender, CompletionSignal, PlaybackOutcome,
};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
