//! # Download Cache Module
//!
//! Turns locators into validated local audio files.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     DownloadCache                      │
//! │  - resolve()        (single-flight)    │
//! │  - cached()         (fast path only)   │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> AssetRepository (library.json)
//!          ├──> Extractor       (download + transcode)
//!          └──> EventBus        (CacheEvent)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, DownloadCache};
//!
//! let cache = DownloadCache::new(CacheConfig::new("/srv/bot/media"), assets, extractor)?
//!     .with_event_bus(bus.clone());
//!
//! let record = cache.resolve(&"https://youtube.com/watch?v=abc".into()).await?;
//! println!("{} -> {}", record.title, record.filepath.display());
//! ```

pub mod config;
pub mod manager;

pub use config::CacheConfig;
pub use manager::DownloadCache;
