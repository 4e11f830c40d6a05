//! # Playback Module
//!
//! Download cache and sequential playback driver.
//!
//! ## Overview
//!
//! This crate handles:
//! - Resolving locators to validated local audio files ([`cache`])
//! - Playing queue entries one at a time through the host audio sink
//!   ([`driver`])
//! - Auto-advancing on completion, resolution failure and sink failure

pub mod cache;
pub mod driver;
pub mod error;

pub use cache::{CacheConfig, DownloadCache};
pub use driver::{
    DriverSnapshot, EnqueueReceipt, NowPlaying, PlaybackDriver, PlaybackHandle, PlaybackState,
};
pub use error::{PlaybackError, Result};
