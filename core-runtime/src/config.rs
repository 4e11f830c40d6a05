//! # Core Configuration Module
//!
//! Provides configuration management for the media queue core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every bridge and tunable the core needs. Validation is fail-fast:
//! missing bridges and nonsensical limits are rejected before anything is
//! spawned.
//!
//! ## Required Dependencies
//!
//! - `Extractor` - search, playlist expansion, download + transcode
//! - `AudioSink` - real-time output
//!
//! ## Optional Dependencies
//!
//! - `NotificationSink` - receives now-playing / error / queue-empty events
//!
//! When the `desktop-shims` feature is enabled, the yt-dlp extractor, the
//! ffplay sink and the platform data directory are injected automatically if
//! not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/srv/bot/data")
//!     .media_dir("/srv/bot/YTmusic")
//!     .retry_attempts(5)
//!     .retry_delay(Duration::from_secs(1))
//!     .extractor(Arc::new(MyExtractor))
//!     .audio_sink(Arc::new(MySink))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AudioSink, Extractor, NotificationSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// File name of the durable queue inside `data_dir`.
pub const QUEUE_FILE_NAME: &str = "queue.json";
/// File name of the asset store inside `data_dir`.
pub const LIBRARY_FILE_NAME: &str = "library.json";
/// File name of the saved playlist store inside `data_dir`.
pub const PLAYLISTS_FILE_NAME: &str = "playlists.json";

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_MIN_ASSET_SIZE_BYTES: u64 = 1024;
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;

/// Core configuration for the media queue.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory holding the queue, library and playlist JSON stores
    pub data_dir: PathBuf,

    /// Directory the extractor writes transcoded audio into
    pub media_dir: PathBuf,

    /// Download attempts per resolution before giving up
    pub retry_attempts: u32,

    /// Fixed delay between download attempts
    pub retry_delay: Duration,

    /// Upper bound for a single download attempt (`None` = unbounded)
    pub attempt_timeout: Option<Duration>,

    /// Files smaller than this are treated as missing
    pub min_asset_size_bytes: u64,

    /// Concurrent extractor downloads across all locators
    pub max_concurrent_downloads: usize,

    /// Event bus buffer per subscriber
    pub event_buffer_size: usize,

    /// Start downloading as soon as an entry is enqueued
    pub prefetch_on_enqueue: bool,

    pub extractor: Arc<dyn Extractor>,

    pub audio_sink: Arc<dyn AudioSink>,

    pub notification_sink: Option<Arc<dyn NotificationSink>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("media_dir", &self.media_dir)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("min_asset_size_bytes", &self.min_asset_size_bytes)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("prefetch_on_enqueue", &self.prefetch_on_enqueue)
            .field("extractor", &"Extractor { ... }")
            .field("audio_sink", &"AudioSink { ... }")
            .field(
                "notification_sink",
                &self
                    .notification_sink
                    .as_ref()
                    .map(|_| "NotificationSink { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join(QUEUE_FILE_NAME)
    }

    pub fn library_path(&self) -> PathBuf {
        self.data_dir.join(LIBRARY_FILE_NAME)
    }

    pub fn playlists_path(&self) -> PathBuf {
        self.data_dir.join(PLAYLISTS_FILE_NAME)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Directories are not empty
    /// - At least one download attempt is allowed
    /// - Concurrency and buffer sizes are non-zero
    /// - The per-attempt timeout, when set, is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.media_dir.as_os_str().is_empty() {
            return Err(Error::Config("Media directory cannot be empty".to_string()));
        }

        if self.retry_attempts == 0 {
            return Err(Error::Config(
                "Retry attempts must be at least 1".to_string(),
            ));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "Max concurrent downloads must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.attempt_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::Config(
                "Attempt timeout must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the bundled default. \
             Other hosts: inject an implementation through the builder.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_extractor() -> Result<Arc<dyn Extractor>> {
    use bridge_desktop::YtDlpExtractor;

    let extractor: Arc<dyn Extractor> = Arc::new(YtDlpExtractor::new());
    Ok(extractor)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_extractor() -> Result<Arc<dyn Extractor>> {
    Err(capability_missing("Extractor", "resolving and downloading tracks"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_sink() -> Result<Arc<dyn AudioSink>> {
    use bridge_desktop::ProcessAudioSink;

    let sink: Arc<dyn AudioSink> = Arc::new(ProcessAudioSink::new());
    Ok(sink)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_sink() -> Result<Arc<dyn AudioSink>> {
    Err(capability_missing("AudioSink", "playing resolved assets"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_data_dir() -> Result<PathBuf> {
    bridge_desktop::default_data_dir().ok_or_else(|| {
        Error::Config(
            "Could not determine a platform data directory. Use .data_dir() to set it."
                .to_string(),
        )
    })
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_data_dir() -> Result<PathBuf> {
    Err(Error::Config(
        "Data directory is required. Use .data_dir() to set it.".to_string(),
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    media_dir: Option<PathBuf>,
    retry_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    attempt_timeout: Option<Option<Duration>>,
    min_asset_size_bytes: Option<u64>,
    max_concurrent_downloads: Option<usize>,
    event_buffer_size: Option<usize>,
    prefetch_on_enqueue: Option<bool>,
    extractor: Option<Arc<dyn Extractor>>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
}

impl CoreConfigBuilder {
    /// Sets the directory holding the JSON stores.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().data_dir("/srv/bot/data");
    /// ```
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the media directory. Defaults to `<data_dir>/media`.
    pub fn media_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.media_dir = Some(path.into());
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the per-attempt timeout. `None` disables it.
    pub fn attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn min_asset_size_bytes(mut self, bytes: u64) -> Self {
        self.min_asset_size_bytes = Some(bytes);
        self
    }

    pub fn max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = Some(limit);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn prefetch_on_enqueue(mut self, enabled: bool) -> Self {
        self.prefetch_on_enqueue = Some(enabled);
        self
    }

    /// Sets the extractor implementation (required without desktop shims).
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Sets the audio sink implementation (required without desktop shims).
    pub fn audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    /// Sets the notification sink (optional).
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Required bridges are missing (Extractor, AudioSink)
    /// - No data directory was given and none can be derived
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => provide_default_data_dir()?,
        };

        let media_dir = self.media_dir.unwrap_or_else(|| data_dir.join("media"));

        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => provide_default_extractor()?,
        };

        let audio_sink = match self.audio_sink {
            Some(sink) => sink,
            None => provide_default_audio_sink()?,
        };

        let config = CoreConfig {
            data_dir,
            media_dir,
            retry_attempts: self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            attempt_timeout: self
                .attempt_timeout
                .unwrap_or(Some(DEFAULT_ATTEMPT_TIMEOUT)),
            min_asset_size_bytes: self
                .min_asset_size_bytes
                .unwrap_or(DEFAULT_MIN_ASSET_SIZE_BYTES),
            max_concurrent_downloads: self
                .max_concurrent_downloads
                .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            prefetch_on_enqueue: self.prefetch_on_enqueue.unwrap_or(true),
            extractor,
            audio_sink,
            notification_sink: self.notification_sink,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{CompletionSignal, ExtractedMedia, SearchHit};
    use std::path::Path;

    struct NullExtractor;

    #[async_trait]
    impl Extractor for NullExtractor {
        async fn search(&self, _query: &str) -> BridgeResult<Option<SearchHit>> {
            Ok(None)
        }

        async fn expand_playlist(&self, _locator: &str) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn download(&self, locator: &str, _output_dir: &Path) -> BridgeResult<ExtractedMedia> {
            Err(bridge_traits::BridgeError::OperationFailed(locator.to_string()))
        }
    }

    struct NullSink;

    #[async_trait]
    impl AudioSink for NullSink {
        async fn play(&self, _path: &Path) -> BridgeResult<CompletionSignal> {
            Err(bridge_traits::BridgeError::NotAvailable("null sink".into()))
        }

        async fn stop(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn resume(&self) -> BridgeResult<()> {
            Ok(())
        }

        fn is_active(&self) -> bool {
            false
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .data_dir("/srv/bot/data")
            .extractor(Arc::new(NullExtractor))
            .audio_sink(Arc::new(NullSink))
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.media_dir, PathBuf::from("/srv/bot/data/media"));
        assert_eq!(config.retry_attempts, 10);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.attempt_timeout, Some(DEFAULT_ATTEMPT_TIMEOUT));
        assert_eq!(config.min_asset_size_bytes, 1024);
        assert_eq!(config.max_concurrent_downloads, 2);
        assert!(config.prefetch_on_enqueue);
        assert!(config.notification_sink.is_none());
    }

    #[test]
    fn test_store_paths() {
        let config = builder().build().unwrap();

        assert_eq!(config.queue_path(), PathBuf::from("/srv/bot/data/queue.json"));
        assert_eq!(
            config.library_path(),
            PathBuf::from("/srv/bot/data/library.json")
        );
        assert_eq!(
            config.playlists_path(),
            PathBuf::from("/srv/bot/data/playlists.json")
        );
    }

    #[test]
    fn test_builder_overrides() {
        let config = builder()
            .media_dir("/srv/bot/YTmusic")
            .retry_attempts(3)
            .retry_delay(Duration::from_millis(10))
            .attempt_timeout(None)
            .min_asset_size_bytes(4096)
            .max_concurrent_downloads(4)
            .prefetch_on_enqueue(false)
            .build()
            .unwrap();

        assert_eq!(config.media_dir, PathBuf::from("/srv/bot/YTmusic"));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.attempt_timeout, None);
        assert_eq!(config.min_asset_size_bytes, 4096);
        assert_eq!(config.max_concurrent_downloads, 4);
        assert!(!config.prefetch_on_enqueue);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let err = builder().retry_attempts(0).build().unwrap_err();
        assert!(err.to_string().contains("Retry attempts"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let err = builder().max_concurrent_downloads(0).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let err = builder()
            .attempt_timeout(Some(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Attempt timeout"));
    }

    #[test]
    fn test_validate_rejects_empty_data_dir() {
        let err = builder().data_dir("").build().unwrap_err();
        assert!(err.to_string().contains("Data directory"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_extractor() {
        let err = CoreConfig::builder()
            .data_dir("/srv/bot/data")
            .audio_sink(Arc::new(NullSink))
            .build()
            .unwrap_err();

        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "Extractor"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_audio_sink() {
        let err = CoreConfig::builder()
            .data_dir("/srv/bot/data")
            .extractor(Arc::new(NullExtractor))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { .. }));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .data_dir(std::env::temp_dir().join("media-queue-config-test"))
            .build()
            .expect("desktop defaults should succeed");

        assert!(!config.audio_sink.is_active());
    }
}
