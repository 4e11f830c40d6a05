//! Media queue umbrella crate.
//!
//! Hosts that just want the desktop build depend on `media-queue-workspace`
//! with the default `desktop-shims` feature and get the service façade,
//! backed by yt-dlp and ffplay, without naming the individual crates.

#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap_desktop, CoreError, MediaQueueService, Result};
