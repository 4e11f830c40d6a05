//! Download cache configuration

use core_runtime::config::{
    CoreConfig, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_CONCURRENT_DOWNLOADS,
    DEFAULT_MIN_ASSET_SIZE_BYTES, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the download cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory the extractor writes into
    pub media_dir: PathBuf,

    /// Download attempts per resolution (default: 10)
    pub max_retry_attempts: u32,

    /// Fixed delay between attempts (default: 2s)
    pub retry_delay: Duration,

    /// Timeout for a single attempt (default: 600s, `None` = unbounded)
    pub attempt_timeout: Option<Duration>,

    /// Files below this size are treated as missing (default: 1024 bytes)
    pub min_asset_size_bytes: u64,

    /// Number of concurrent downloads allowed (default: 2)
    pub max_concurrent_downloads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            max_retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
            min_asset_size_bytes: DEFAULT_MIN_ASSET_SIZE_BYTES,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
            ..Self::default()
        }
    }

    /// Take the cache tunables from the core configuration.
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            media_dir: config.media_dir.clone(),
            max_retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
            attempt_timeout: config.attempt_timeout,
            min_asset_size_bytes: config.min_asset_size_bytes,
            max_concurrent_downloads: config.max_concurrent_downloads,
        }
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_min_asset_size(mut self, bytes: u64) -> Self {
        self.min_asset_size_bytes = bytes;
        self
    }

    /// Set maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retry_attempts == 0 {
            return Err("max_retry_attempts must be at least 1".to_string());
        }

        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.attempt_timeout == Some(Duration::ZERO) {
            return Err("attempt_timeout must be greater than 0".to_string());
        }

        if self.media_dir.as_os_str().is_empty() {
            return Err("media_dir cannot be empty".to_string());
        }

        Ok(())
    }
}
