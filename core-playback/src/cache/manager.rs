//! # Download Cache
//!
//! Resolves a locator to a validated local asset.
//!
//! - Fast path: a stored record whose file exists and is at least
//!   `min_asset_size_bytes` is returned without touching the extractor.
//! - Single-flight: concurrent resolutions of one locator share a single
//!   background download and observe the same record or the same error.
//! - Stale records (file missing or undersized) are purged together with the
//!   file before a fresh download.
//! - Downloads are throttled by a semaphore, bounded by a per-attempt timeout
//!   and retried a fixed number of times with a fixed delay.

use crate::cache::config::CacheConfig;
use crate::error::{PlaybackError, Result};
use bridge_traits::Extractor;
use core_library::{AssetRecord, AssetRepository, Locator};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

type Flight = Shared<BoxFuture<'static, Result<AssetRecord>>>;

/// Locator-keyed download cache backed by an [`AssetRepository`].
///
/// Cloning is cheap; clones share the in-flight table and the download
/// limiter.
#[derive(Clone)]
pub struct DownloadCache {
    config: Arc<CacheConfig>,
    assets: Arc<dyn AssetRepository>,
    extractor: Arc<dyn Extractor>,
    event_bus: Option<EventBus>,
    download_semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<Locator, Flight>>>,
}

impl DownloadCache {
    /// Create a new download cache.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Config`] if `config` fails validation.
    pub fn new(
        config: CacheConfig,
        assets: Arc<dyn AssetRepository>,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;
        let download_semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads));

        Ok(Self {
            config: Arc::new(config),
            assets,
            extractor,
            event_bus: None,
            download_semaphore,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Set event bus for download events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Resolve `locator` to a valid local asset, downloading it if needed.
    ///
    /// Joins an in-flight download for the same locator instead of starting
    /// a second one.
    #[instrument(skip(self, locator), fields(locator = %locator))]
    pub async fn resolve(&self, locator: &Locator) -> Result<AssetRecord> {
        if let Some(record) = self.cached(locator).await? {
            debug!("cache hit");
            return Ok(record);
        }

        self.join_or_start(locator).await
    }

    /// The stored record for `locator` if its file is currently valid.
    ///
    /// Never downloads and never purges.
    pub async fn cached(&self, locator: &Locator) -> Result<Option<AssetRecord>> {
        match self.assets.find(locator).await? {
            Some(record) if self.is_valid_file(&record.filepath).await => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// Whether a download for `locator` is running right now.
    pub fn is_in_flight(&self, locator: &Locator) -> bool {
        self.in_flight.lock().contains_key(locator)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn join_or_start(&self, locator: &Locator) -> Flight {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = in_flight.get(locator) {
            debug!("joining in-flight download");
            return flight.clone();
        }

        // The task clears its own entry; it cannot get there before the
        // insert below because the table lock is still held.
        let cache = self.clone();
        let key = locator.clone();
        let task = tokio::spawn(async move {
            let _entry = InFlightEntry {
                table: Arc::clone(&cache.in_flight),
                locator: key.clone(),
            };
            cache.download_with_retry(&key).await
        });

        let flight: Flight = async move {
            task.await.unwrap_or_else(|join_error| {
                Err(PlaybackError::Extraction(format!(
                    "download task aborted: {join_error}"
                )))
            })
        }
        .boxed()
        .shared();

        in_flight.insert(locator.clone(), flight.clone());
        flight
    }

    /// Download with automatic retry logic.
    async fn download_with_retry(&self, locator: &Locator) -> Result<AssetRecord> {
        let max_attempts = self.config.max_retry_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            // Another writer may have produced the file since the last check.
            if let Some(record) = self.take_valid_or_purge(locator).await? {
                debug!(attempt, "asset became valid while waiting");
                return Ok(record);
            }

            if attempt == 1 {
                info!(locator = %locator, "downloading asset");
                self.emit(CacheEvent::DownloadStarted {
                    locator: locator.to_string(),
                });
            }

            debug!(
                "Download attempt {}/{} for {}",
                attempt, max_attempts, locator
            );

            // The slot is held for the attempt only, never across the retry sleep.
            let outcome = {
                let _permit = self.download_semaphore.acquire().await.map_err(|_| {
                    PlaybackError::Extraction("download limiter closed".to_string())
                })?;
                self.attempt_download(locator).await
            };

            match outcome {
                Ok((record, size_bytes)) => {
                    info!(
                        locator = %locator,
                        title = %record.title,
                        size_bytes,
                        attempt,
                        "asset cached"
                    );
                    self.emit(CacheEvent::DownloadCompleted {
                        locator: locator.to_string(),
                        title: record.title.clone(),
                        size_bytes,
                    });
                    return Ok(record);
                }
                Err(error) if !error.is_retryable() => {
                    warn!(locator = %locator, error = %error, "download failed, not retrying");
                    self.emit(CacheEvent::DownloadFailed {
                        locator: locator.to_string(),
                        message: error.to_string(),
                    });
                    return Err(error);
                }
                Err(error) => {
                    warn!(
                        locator = %locator,
                        attempt,
                        max_attempts,
                        error = %error,
                        "download attempt failed"
                    );
                    if attempt < max_attempts {
                        self.emit(CacheEvent::DownloadRetrying {
                            locator: locator.to_string(),
                            attempt,
                            max_attempts,
                            message: error.to_string(),
                        });
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        let source = last_error.unwrap_or_else(|| {
            PlaybackError::Extraction("download failed after all retries".to_string())
        });
        let error = PlaybackError::RetriesExhausted {
            locator: locator.to_string(),
            attempts: max_attempts,
            source: Box::new(source),
        };
        self.emit(CacheEvent::DownloadFailed {
            locator: locator.to_string(),
            message: error.to_string(),
        });
        Err(error)
    }

    /// One extractor invocation plus validation and persistence.
    async fn attempt_download(&self, locator: &Locator) -> Result<(AssetRecord, u64)> {
        tokio::fs::create_dir_all(&self.config.media_dir)
            .await
            .map_err(|e| {
                PlaybackError::Extraction(format!("cannot create media directory: {e}"))
            })?;

        let download = self
            .extractor
            .download(locator.as_str(), &self.config.media_dir);
        let media = match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, download).await.map_err(|_| {
                PlaybackError::Extraction(format!(
                    "download timed out after {}s",
                    limit.as_secs()
                ))
            })?,
            None => download.await,
        }
        .map_err(PlaybackError::from_extractor)?;

        if media.canonical_locator != locator.as_str() {
            debug!(canonical = %media.canonical_locator, "provider returned a different canonical locator");
        }

        let size_bytes = match file_size(&media.file_path).await {
            Some(size) if size >= self.config.min_asset_size_bytes => size,
            Some(size) => {
                remove_file_quietly(&media.file_path).await;
                return Err(PlaybackError::Validation(format!(
                    "{} is only {} bytes",
                    media.file_path.display(),
                    size
                )));
            }
            None => {
                return Err(PlaybackError::Validation(format!(
                    "{} was not written",
                    media.file_path.display()
                )));
            }
        };

        let record = AssetRecord {
            locator: locator.clone(),
            title: media.title,
            filepath: media.file_path,
            duration_seconds: media.duration_seconds,
            thumbnail: media.thumbnail,
        };
        self.assets.upsert(&record).await?;

        Ok((record, size_bytes))
    }

    /// Fast path inside a flight: return a valid record, or purge a stale one.
    async fn take_valid_or_purge(&self, locator: &Locator) -> Result<Option<AssetRecord>> {
        let Some(record) = self.assets.find(locator).await? else {
            return Ok(None);
        };

        if self.is_valid_file(&record.filepath).await {
            return Ok(Some(record));
        }

        warn!(
            locator = %locator,
            path = %record.filepath.display(),
            "cached asset is missing or undersized, purging"
        );
        remove_file_quietly(&record.filepath).await;
        self.assets.delete(locator).await?;
        self.emit(CacheEvent::StaleEvicted {
            locator: locator.to_string(),
        });
        Ok(None)
    }

    async fn is_valid_file(&self, path: &Path) -> bool {
        file_size(path)
            .await
            .is_some_and(|size| size >= self.config.min_asset_size_bytes)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine.
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

/// Removes a locator from the in-flight table when its download task ends,
/// including by panic.
struct InFlightEntry {
    table: Arc<Mutex<HashMap<Locator, Flight>>>,
    locator: Locator,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        self.table.lock().remove(&self.locator);
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
}

async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}
