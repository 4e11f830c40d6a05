//! Download cache behaviour against a fake extractor and a real JSON store.

mod support;

use core_library::{AssetRepository, JsonAssetRepository};
use core_playback::PlaybackError;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use support::{build_cache, cache_config, eventually, locator, FakeExtractor};

fn cache_events(events: &mut core_runtime::events::Receiver<CoreEvent>) -> Vec<CacheEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Cache(event) = event {
            collected.push(event);
        }
    }
    collected
}

#[tokio::test]
async fn valid_record_is_served_without_extractor() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let first = cache.resolve(&locator("L1")).await.unwrap();
    let second = cache.resolve(&locator("L1")).await.unwrap();

    assert_eq!(extractor.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.title, "Track L1");
    assert!(first.filepath.exists());
    assert!(cache.cached(&locator("L1")).await.unwrap().is_some());
}

#[tokio::test]
async fn resolution_is_persisted_to_asset_store() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor, &bus).await;

    let record = cache.resolve(&locator("L1")).await.unwrap();

    let reopened = JsonAssetRepository::open(dir.path().join("library.json"))
        .await
        .unwrap();
    assert_eq!(reopened.find(&locator("L1")).await.unwrap(), Some(record));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_share_one_download() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(100)));
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let target = locator("L1");
    let results = join_all((0..8).map(|_| {
        let cache = cache.clone();
        let target = target.clone();
        tokio::spawn(async move { cache.resolve(&target).await })
    }))
    .await;

    assert_eq!(extractor.calls(), 1);
    let records: Vec<_> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert!(records.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(cache.in_flight_count(), 0);
}

#[tokio::test]
async fn concurrent_resolutions_share_one_failure() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    extractor.always_fail("L1");
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let target = locator("L1");
    let results = join_all((0..4).map(|_| cache.resolve(&target))).await;

    // One flight, three attempts
    assert_eq!(extractor.calls(), 3);
    let first = results[0].clone().unwrap_err();
    assert!(matches!(first, PlaybackError::RetriesExhausted { attempts: 3, .. }));
    assert!(results.iter().all(|result| result.clone().unwrap_err() == first));
}

#[tokio::test]
async fn retries_until_success() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let extractor = Arc::new(FakeExtractor::new());
    extractor.fail_times("L1", 2);
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let record = cache.resolve(&locator("L1")).await.unwrap();

    assert_eq!(record.title, "Track L1");
    assert_eq!(extractor.calls(), 3);

    let events = cache_events(&mut events);
    let retries = events
        .iter()
        .filter(|event| matches!(event, CacheEvent::DownloadRetrying { .. }))
        .count();
    assert_eq!(retries, 2);
    assert!(matches!(events.first(), Some(CacheEvent::DownloadStarted { .. })));
    assert!(matches!(events.last(), Some(CacheEvent::DownloadCompleted { .. })));
}

#[tokio::test]
async fn gives_up_after_fixed_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let extractor = Arc::new(FakeExtractor::new());
    extractor.always_fail("L1");
    let config = cache_config(dir.path()).with_retry_attempts(5);
    let cache = build_cache(dir.path(), config, extractor.clone(), &bus).await;

    let error = cache.resolve(&locator("L1")).await.unwrap_err();

    assert_eq!(extractor.calls(), 5);
    match error {
        PlaybackError::RetriesExhausted {
            locator,
            attempts,
            source,
        } => {
            assert_eq!(locator, "L1");
            assert_eq!(attempts, 5);
            assert!(matches!(*source, PlaybackError::Extraction(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(cache.cached(&locator("L1")).await.unwrap().is_none());
    assert!(matches!(
        cache_events(&mut events).last(),
        Some(CacheEvent::DownloadFailed { .. })
    ));
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    extractor.not_found("L1");
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let error = cache.resolve(&locator("L1")).await.unwrap_err();

    assert!(matches!(error, PlaybackError::NotFound(_)));
    assert_eq!(extractor.calls(), 1);
}

#[tokio::test]
async fn undersized_download_fails_validation_and_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    extractor.undersized("L1");
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let error = cache.resolve(&locator("L1")).await.unwrap_err();

    match error {
        PlaybackError::RetriesExhausted { source, .. } => {
            assert!(matches!(*source, PlaybackError::Validation(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(extractor.calls(), 3);
    let path = FakeExtractor::path_for(&dir.path().join("media"), "L1");
    assert!(!path.exists());
}

#[tokio::test]
async fn missing_file_is_purged_and_downloaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let extractor = Arc::new(FakeExtractor::new());
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let first = cache.resolve(&locator("L1")).await.unwrap();
    std::fs::remove_file(&first.filepath).unwrap();
    assert!(cache.cached(&locator("L1")).await.unwrap().is_none());

    let second = cache.resolve(&locator("L1")).await.unwrap();

    assert_eq!(extractor.calls(), 2);
    assert!(second.filepath.exists());
    assert!(cache_events(&mut events)
        .iter()
        .any(|event| matches!(event, CacheEvent::StaleEvicted { locator } if locator == "L1")));
}

#[tokio::test]
async fn truncated_file_is_treated_as_stale() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    let cache = build_cache(dir.path(), cache_config(dir.path()), extractor.clone(), &bus).await;

    let record = cache.resolve(&locator("L1")).await.unwrap();
    std::fs::write(&record.filepath, b"partial").unwrap();

    cache.resolve(&locator("L1")).await.unwrap();

    assert_eq!(extractor.calls(), 2);
    assert_eq!(
        std::fs::metadata(&record.filepath).unwrap().len(),
        support::ASSET_BYTES as u64
    );
}

#[tokio::test]
async fn slow_attempts_time_out() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(500)));
    let config = cache_config(dir.path())
        .with_retry_attempts(2)
        .with_attempt_timeout(Some(Duration::from_millis(20)));
    let cache = build_cache(dir.path(), config, extractor.clone(), &bus).await;

    let error = cache.resolve(&locator("L1")).await.unwrap_err();

    assert_eq!(extractor.calls(), 2);
    assert!(error.to_string().contains("timed out"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retry_backoff_frees_the_download_slot() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(64);
    let extractor = Arc::new(FakeExtractor::new());
    extractor.fail_times("L1", 1);
    let config = cache_config(dir.path())
        .with_max_concurrent_downloads(1)
        .with_retry_attempts(2)
        .with_retry_delay(Duration::from_secs(2));
    let cache = build_cache(dir.path(), config, extractor.clone(), &bus).await;

    let backing_off = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.resolve(&locator("L1")).await })
    };
    eventually(|| extractor.calls_for("L1") == 1).await;

    // L1 is sleeping before its second attempt; L2 must not wait on it
    let other = tokio::time::timeout(Duration::from_secs(1), cache.resolve(&locator("L2")))
        .await
        .expect("second download blocked by a retry sleep")
        .unwrap();
    assert_eq!(other.title, "Track L2");

    backing_off.await.unwrap().unwrap();
    assert_eq!(extractor.calls_for("L1"), 2);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let assets = JsonAssetRepository::open(dir.path().join("library.json"))
        .await
        .unwrap();
    let result = core_playback::DownloadCache::new(
        cache_config(dir.path()).with_retry_attempts(0),
        Arc::new(assets),
        Arc::new(FakeExtractor::new()),
    );
    assert!(matches!(result, Err(PlaybackError::Config(_))));
}
