//! Hand-written collaborator fakes shared by the cache and driver tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    completion_channel, AudioSink, BridgeError, CompletionSender, CompletionSignal,
    ExtractedMedia, Extractor, PlaybackOutcome, SearchHit,
};
use core_library::{JsonAssetRepository, Locator, QueueStore};
use core_playback::{CacheConfig, DownloadCache, PlaybackDriver, PlaybackHandle};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, PlaybackEvent, Receiver};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const ASSET_BYTES: usize = 4096;

// ============================================================================
// Extractor
// ============================================================================

/// Writes `ASSET_BYTES` of filler per download and counts invocations.
pub struct FakeExtractor {
    calls: AtomicUsize,
    calls_per_locator: Mutex<HashMap<String, usize>>,
    remaining_failures: Mutex<HashMap<String, usize>>,
    not_found: Mutex<HashSet<String>>,
    undersized: Mutex<HashSet<String>>,
    gate: Semaphore,
    delay: Duration,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            calls_per_locator: Mutex::new(HashMap::new()),
            remaining_failures: Mutex::new(HashMap::new()),
            not_found: Mutex::new(HashSet::new()),
            undersized: Mutex::new(HashSet::new()),
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
            delay: Duration::ZERO,
        }
    }

    /// Downloads block until [`open_gate`](Self::open_gate) is called.
    pub fn gated() -> Self {
        Self {
            gate: Semaphore::new(0),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn open_gate(&self) {
        self.gate.add_permits(1024);
    }

    pub fn fail_times(&self, locator: &str, times: usize) {
        self.remaining_failures
            .lock()
            .insert(locator.to_string(), times);
    }

    pub fn always_fail(&self, locator: &str) {
        self.fail_times(locator, usize::MAX);
    }

    pub fn not_found(&self, locator: &str) {
        self.not_found.lock().insert(locator.to_string());
    }

    pub fn undersized(&self, locator: &str) {
        self.undersized.lock().insert(locator.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, locator: &str) -> usize {
        self.calls_per_locator
            .lock()
            .get(locator)
            .copied()
            .unwrap_or(0)
    }

    pub fn title_for(locator: &str) -> String {
        format!("Track {locator}")
    }

    pub fn path_for(output_dir: &Path, locator: &str) -> PathBuf {
        let safe: String = locator
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        output_dir.join(format!("{safe}.mp3"))
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn search(&self, query: &str) -> bridge_traits::error::Result<Option<SearchHit>> {
        Ok(Some(SearchHit {
            locator: format!("https://example.com/{query}"),
            title: Self::title_for(query),
            duration_seconds: 60,
        }))
    }

    async fn expand_playlist(&self, _locator: &str) -> bridge_traits::error::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn download(
        &self,
        locator: &str,
        output_dir: &Path,
    ) -> bridge_traits::error::Result<ExtractedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_per_locator
            .lock()
            .entry(locator.to_string())
            .or_default() += 1;

        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.not_found.lock().contains(locator) {
            return Err(BridgeError::NoResults(format!("nothing at {locator}")));
        }
        {
            let mut failures = self.remaining_failures.lock();
            if let Some(remaining) = failures.get_mut(locator) {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Err(BridgeError::OperationFailed("HTTP Error 403".to_string()));
                }
            }
        }

        let size = if self.undersized.lock().contains(locator) {
            16
        } else {
            ASSET_BYTES
        };
        let file_path = Self::path_for(output_dir, locator);
        tokio::fs::write(&file_path, vec![0u8; size]).await?;

        Ok(ExtractedMedia {
            title: Self::title_for(locator),
            canonical_locator: locator.to_string(),
            file_path,
            duration_seconds: 185,
            thumbnail: None,
        })
    }
}

// ============================================================================
// Audio sink
// ============================================================================

/// Holds the completion sender of the current stream so tests decide when a
/// track ends.
#[derive(Default)]
pub struct FakeSink {
    played: Mutex<Vec<PathBuf>>,
    current: Mutex<Option<CompletionSender>>,
    reject_next: Mutex<bool>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().clone()
    }

    pub fn reject_next_play(&self) {
        *self.reject_next.lock() = true;
    }

    /// Complete the current stream normally.
    pub fn finish_current(&self) -> bool {
        self.complete(PlaybackOutcome::Finished)
    }

    /// Complete the current stream with a sink failure.
    pub fn fail_current(&self, message: &str) -> bool {
        self.complete(PlaybackOutcome::Failed(message.to_string()))
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn complete(&self, outcome: PlaybackOutcome) -> bool {
        match self.current.lock().take() {
            Some(sender) => {
                sender.complete(outcome);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, path: &Path) -> bridge_traits::error::Result<CompletionSignal> {
        if std::mem::take(&mut *self.reject_next.lock()) {
            return Err(BridgeError::OperationFailed("device busy".to_string()));
        }
        self.played.lock().push(path.to_path_buf());
        let (sender, signal) = completion_channel();
        *self.current.lock() = Some(sender);
        Ok(signal)
    }

    async fn stop(&self) -> bridge_traits::error::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.complete(PlaybackOutcome::Finished);
        Ok(())
    }

    async fn pause(&self) -> bridge_traits::error::Result<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> bridge_traits::error::Result<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.current.lock().is_some()
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn cache_config(data_dir: &Path) -> CacheConfig {
    CacheConfig::new(data_dir.join("media"))
        .with_retry_attempts(3)
        .with_retry_delay(Duration::from_millis(10))
        .with_attempt_timeout(Some(Duration::from_secs(5)))
}

pub async fn build_cache(
    data_dir: &Path,
    config: CacheConfig,
    extractor: Arc<FakeExtractor>,
    bus: &EventBus,
) -> DownloadCache {
    let assets = JsonAssetRepository::open(data_dir.join("library.json"))
        .await
        .unwrap();
    DownloadCache::new(config, Arc::new(assets), extractor)
        .unwrap()
        .with_event_bus(bus.clone())
}

pub struct Harness {
    pub extractor: Arc<FakeExtractor>,
    pub sink: Arc<FakeSink>,
    pub bus: EventBus,
    pub events: Receiver<CoreEvent>,
    pub cache: DownloadCache,
    pub handle: PlaybackHandle,
    pub queue_path: PathBuf,
}

impl Harness {
    pub async fn start(data_dir: &Path, extractor: FakeExtractor) -> Self {
        let extractor = Arc::new(extractor);
        let sink = Arc::new(FakeSink::new());
        let bus = EventBus::new(512);
        let events = bus.subscribe();

        let cache = build_cache(data_dir, cache_config(data_dir), extractor.clone(), &bus).await;
        let queue_path = data_dir.join("queue.json");
        let queue = QueueStore::open(&queue_path).await.unwrap();
        let handle = PlaybackDriver::spawn(queue, cache.clone(), sink.clone(), bus.clone());

        Self {
            extractor,
            sink,
            bus,
            events,
            cache,
            handle,
            queue_path,
        }
    }

    pub fn media_path(data_dir: &Path, locator: &str) -> PathBuf {
        FakeExtractor::path_for(&data_dir.join("media"), locator)
    }

    /// Next playback event, skipping cache and queue events.
    pub async fn next_playback(&mut self) -> PlaybackEvent {
        loop {
            if let CoreEvent::Playback(event) = next_event(&mut self.events).await {
                return event;
            }
        }
    }

    /// Skip playback events until a `NowPlaying` arrives and return its locator.
    pub async fn next_now_playing(&mut self) -> String {
        loop {
            if let PlaybackEvent::NowPlaying { locator, .. } = self.next_playback().await {
                return locator;
            }
        }
    }

    pub async fn wait_for_cache<F>(&mut self, mut predicate: F) -> CacheEvent
    where
        F: FnMut(&CacheEvent) -> bool,
    {
        loop {
            if let CoreEvent::Cache(event) = next_event(&mut self.events).await {
                if predicate(&event) {
                    return event;
                }
            }
        }
    }

    /// Queue file contents as plain locators.
    pub fn persisted_locators(&self) -> Vec<String> {
        persisted_locators(&self.queue_path)
    }
}

pub async fn next_event(events: &mut Receiver<CoreEvent>) -> CoreEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event bus closed")
}

pub fn persisted_locators(queue_path: &Path) -> Vec<String> {
    let raw = std::fs::read_to_string(queue_path).unwrap();
    let pairs: Vec<(String, u64)> = serde_json::from_str(&raw).unwrap();
    pairs.into_iter().map(|(locator, _)| locator).collect()
}

pub fn locator(value: &str) -> Locator {
    Locator::from(value)
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
