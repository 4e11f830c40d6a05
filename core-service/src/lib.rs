//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (extractor, audio
//! sink, notification sink) into the shared Rust core. Desktop hosts
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so the yt-dlp extractor and ffplay sink are injected
//! when none are given.
//!
//! [`MediaQueueService`] is the surface a command layer talks to: it turns
//! queries and playlist links into queue entries, exposes queue and
//! now-playing views, forwards notifications, and manages saved playlists.

pub mod error;
pub mod notifications;
mod playlists;
pub mod views;

pub use error::{CoreError, Result};
pub use views::{CurrentTrack, Enqueued, ExportedPlaylist, QueueItem, QueuePage, LOADING_TITLE};

use std::sync::Arc;

use bridge_traits::{is_locator, Clock, Extractor, SearchHit, SystemClock};
use core_library::{
    AssetRepository, JsonAssetRepository, JsonPlaylistRepository, Locator, PlaylistRepository,
    QueueEntry, QueueStore, RequesterId,
};
use core_playback::{
    CacheConfig, DownloadCache, DriverSnapshot, EnqueueReceipt, PlaybackDriver, PlaybackError,
    PlaybackHandle,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const NO_RESULTS_MESSAGE: &str = "No results found!";
const NOT_A_PLAYLIST_MESSAGE: &str = "This doesn't appear to be a valid playlist.";

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the same driver, stores and event bus.
#[derive(Clone)]
pub struct MediaQueueService {
    inner: Arc<Inner>,
}

struct Inner {
    extractor: Arc<dyn Extractor>,
    assets: Arc<dyn AssetRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    clock: Arc<dyn Clock>,
    cache: DownloadCache,
    driver: PlaybackHandle,
    events: EventBus,
    forwarder: Option<JoinHandle<()>>,
    prefetch_on_enqueue: bool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

impl MediaQueueService {
    /// Open the stores under `config.data_dir` and start the playback driver.
    ///
    /// A persisted queue is loaded but not played; call
    /// [`resume_queue`](Self::resume_queue) to pick it up.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        Self::bootstrap_with_clock(config, Arc::new(SystemClock)).await
    }

    /// [`bootstrap`](Self::bootstrap) with an explicit clock for playlist
    /// timestamps.
    pub async fn bootstrap_with_clock(config: CoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| {
                CoreError::InitializationFailed(format!(
                    "cannot create data directory {}: {e}",
                    config.data_dir.display()
                ))
            })?;

        let assets: Arc<dyn AssetRepository> =
            Arc::new(JsonAssetRepository::open(config.library_path()).await?);
        let playlists: Arc<dyn PlaylistRepository> = Arc::new(
            JsonPlaylistRepository::open(config.playlists_path(), Arc::clone(&clock)).await?,
        );
        let queue = QueueStore::open(config.queue_path()).await?;
        let pending = queue.len();

        let events = EventBus::new(config.event_buffer_size);
        let cache = DownloadCache::new(
            CacheConfig::from_core_config(&config),
            Arc::clone(&assets),
            Arc::clone(&config.extractor),
        )?
        .with_event_bus(events.clone());

        // Subscribe before the driver can emit anything.
        let forwarder = config
            .notification_sink
            .as_ref()
            .map(|sink| notifications::spawn_forwarder(&events, Arc::clone(sink)));

        let driver = PlaybackDriver::spawn(
            queue,
            cache.clone(),
            Arc::clone(&config.audio_sink),
            events.clone(),
        );

        info!(
            data_dir = %config.data_dir.display(),
            media_dir = %config.media_dir.display(),
            pending,
            "media queue service started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                extractor: Arc::clone(&config.extractor),
                assets,
                playlists,
                clock,
                cache,
                driver,
                events,
                forwarder,
                prefetch_on_enqueue: config.prefetch_on_enqueue,
            }),
        })
    }

    // ========================================================================
    // Enqueueing
    // ========================================================================

    /// Enqueue a locator or the first search hit for a free-text query.
    ///
    /// # Errors
    /// [`CoreError::NotFound`] when the search matches nothing. Nothing is
    /// retried on this path.
    #[instrument(skip(self))]
    pub async fn play(&self, query: &str, requester: RequesterId) -> Result<Enqueued> {
        let (locator, hit) = self.resolve_query(query).await?;
        let receipt = self.enqueue(locator.clone(), requester).await?;
        Ok(Enqueued {
            locator,
            title: hit.map(|hit| hit.title),
            receipt,
        })
    }

    /// Expand a playlist link and enqueue every member in listed order.
    #[instrument(skip(self))]
    pub async fn play_playlist(
        &self,
        locator: &str,
        requester: RequesterId,
    ) -> Result<Vec<EnqueueReceipt>> {
        let members = match self.inner.extractor.expand_playlist(locator.trim()).await {
            Ok(members) => members,
            Err(bridge_traits::BridgeError::NoResults(_)) => Vec::new(),
            Err(e) => return Err(PlaybackError::from_extractor(e).into()),
        };
        if members.is_empty() {
            return Err(CoreError::NotFound(NOT_A_PLAYLIST_MESSAGE.to_string()));
        }

        info!(count = members.len(), "enqueueing playlist");
        let mut receipts = Vec::with_capacity(members.len());
        for member in members {
            receipts.push(self.enqueue(Locator::new(member), requester).await?);
        }
        Ok(receipts)
    }

    /// Start downloading `locator` in the background.
    ///
    /// Joins any in-flight resolution for the same locator.
    pub fn prefetch(&self, locator: &Locator) {
        let cache = self.inner.cache.clone();
        let locator = locator.clone();
        tokio::spawn(async move {
            match cache.resolve(&locator).await {
                Ok(_) => debug!(%locator, "prefetched"),
                Err(e) => warn!(%locator, error = %e, "prefetch failed"),
            }
        });
    }

    async fn enqueue(&self, locator: Locator, requester: RequesterId) -> Result<EnqueueReceipt> {
        let receipt = self
            .inner
            .driver
            .enqueue(QueueEntry::new(locator.clone(), requester))
            .await?;
        // The driver is already resolving the head when it just started.
        if self.inner.prefetch_on_enqueue && !receipt.started {
            self.prefetch(&locator);
        }
        Ok(receipt)
    }

    /// Turn user input into a locator, searching when it is not one.
    async fn resolve_query(&self, query: &str) -> Result<(Locator, Option<SearchHit>)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidInput("query cannot be empty".to_string()));
        }
        if is_locator(query) {
            return Ok((Locator::new(query), None));
        }
        let hit = self.search(query).await?;
        Ok((Locator::new(hit.locator.clone()), Some(hit)))
    }

    /// First search hit, or [`CoreError::NotFound`].
    async fn search(&self, query: &str) -> Result<SearchHit> {
        match self.inner.extractor.search(query).await {
            Ok(Some(hit)) => Ok(hit),
            Ok(None) | Err(bridge_traits::BridgeError::NoResults(_)) => {
                Err(CoreError::NotFound(NO_RESULTS_MESSAGE.to_string()))
            }
            Err(e) => Err(PlaybackError::from_extractor(e).into()),
        }
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Every pending entry in playback order.
    pub async fn peek_queue(&self) -> Result<Vec<QueueItem>> {
        let snapshot = self.inner.driver.snapshot().await?;
        self.queue_items(snapshot.queue.iter()).await
    }

    /// The first `limit` pending entries and the total count.
    pub async fn peek_queue_page(&self, limit: usize) -> Result<QueuePage> {
        let snapshot = self.inner.driver.snapshot().await?;
        let items = self.queue_items(snapshot.queue.iter().take(limit)).await?;
        Ok(QueuePage {
            items,
            total: snapshot.queue.len(),
        })
    }

    async fn queue_items<'a>(
        &self,
        entries: impl Iterator<Item = &'a QueueEntry>,
    ) -> Result<Vec<QueueItem>> {
        let mut items = Vec::new();
        for (index, entry) in entries.enumerate() {
            let title = self
                .inner
                .assets
                .find(&entry.locator)
                .await?
                .map(|record| record.title)
                .unwrap_or_else(|| LOADING_TITLE.to_string());
            items.push(QueueItem {
                position: index + 1,
                title,
                locator: entry.locator.clone(),
                requester: entry.requester,
            });
        }
        Ok(items)
    }

    /// The track held by the sink, if any.
    pub async fn current_track(&self) -> Result<Option<CurrentTrack>> {
        let snapshot = self.inner.driver.snapshot().await?;
        let paused = snapshot.paused;
        Ok(snapshot.current.map(|now| CurrentTrack {
            record: now.record,
            requester: now.entry.requester,
            is_paused: paused,
        }))
    }

    pub async fn snapshot(&self) -> Result<DriverSnapshot> {
        Ok(self.inner.driver.snapshot().await?)
    }

    /// Subscribe to every core event.
    pub fn events(&self) -> EventStream {
        self.inner.events.stream()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub async fn skip(&self) -> Result<Locator> {
        Ok(self.inner.driver.skip().await?)
    }

    /// Clear the queue and stop. Returns the number of entries discarded.
    pub async fn stop(&self) -> Result<usize> {
        Ok(self.inner.driver.stop().await?)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.inner.driver.pause().await?)
    }

    pub async fn resume(&self) -> Result<()> {
        Ok(self.inner.driver.resume().await?)
    }

    /// Play a queue left over from a previous run.
    pub async fn resume_queue(&self) -> Result<bool> {
        Ok(self.inner.driver.resume_queue().await?)
    }

    /// Stop the driver. The persisted queue is kept.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.driver.shutdown().await?;
        info!("media queue service stopped");
        Ok(())
    }

    /// The underlying driver handle.
    pub fn driver(&self) -> &PlaybackHandle {
        &self.inner.driver
    }

    pub fn cache(&self) -> &DownloadCache {
        &self.inner.cache
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the platform data directory and the bundled yt-dlp extractor and
/// ffplay sink.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_library::RequesterId;
///
/// let service = core_service::bootstrap_desktop().await?;
/// service.play("never gonna give you up", RequesterId(42)).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop() -> Result<MediaQueueService> {
    let config = CoreConfig::builder().build()?;
    MediaQueueService::bootstrap(config).await
}
