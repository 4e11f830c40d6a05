//! Playback driver behaviour: ordering, auto-advance, operator transitions
//! and restart recovery.

mod support;

use bridge_traits::ErrorOrigin;
use core_library::{QueueEntry, QueueStore, RequesterId};
use core_playback::{PlaybackError, PlaybackState};
use core_runtime::events::{CacheEvent, CoreEvent, PlaybackEvent};
use std::time::Duration;
use support::{eventually, locator, persisted_locators, FakeExtractor, Harness};

fn entry(value: &str) -> QueueEntry {
    QueueEntry::new(value, RequesterId(7))
}

#[tokio::test]
async fn plays_entries_in_enqueue_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    for value in ["L1", "L2", "L3"] {
        harness.handle.enqueue(entry(value)).await.unwrap();
    }

    let mut order = Vec::new();
    for _ in 0..3 {
        order.push(harness.next_now_playing().await);
        assert!(harness.sink.finish_current());
    }
    assert_eq!(order, vec!["L1", "L2", "L3"]);

    loop {
        match harness.next_playback().await {
            PlaybackEvent::QueueEmpty => break,
            PlaybackEvent::TrackFinished { failed, .. } => assert!(!failed),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.current.is_none());
    assert!(snapshot.queue.is_empty());
}

#[tokio::test]
async fn enqueue_receipt_reports_position_and_start() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::start(dir.path(), FakeExtractor::gated()).await;

    let first = harness.handle.enqueue(entry("L1")).await.unwrap();
    assert_eq!(first.position, 1);
    assert!(first.started);

    // L1 was popped for resolution, so L2 is first in line
    let second = harness.handle.enqueue(entry("L2")).await.unwrap();
    assert_eq!(second.position, 1);
    assert!(!second.started);

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Resolving);
    assert_eq!(snapshot.resolving.unwrap().locator, locator("L1"));
    assert_eq!(snapshot.queue.len(), 1);
}

#[tokio::test]
async fn failed_resolution_notifies_once_and_advances() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = FakeExtractor::new();
    extractor.always_fail("L1");
    let mut harness = Harness::start(dir.path(), extractor).await;

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.handle.enqueue(entry("L2")).await.unwrap();

    match harness.next_playback().await {
        PlaybackEvent::Error {
            locator, origin, ..
        } => {
            assert_eq!(locator.as_deref(), Some("L1"));
            assert_eq!(origin, ErrorOrigin::Resolution);
        }
        other => panic!("expected an error first, got {other:?}"),
    }
    match harness.next_playback().await {
        PlaybackEvent::NowPlaying { locator, .. } => assert_eq!(locator, "L2"),
        other => panic!("expected L2 to play, got {other:?}"),
    }

    assert_eq!(harness.sink.played().len(), 1);
    assert_eq!(harness.extractor.calls_for("L1"), 3);
}

#[tokio::test]
async fn sink_failure_advances_like_completion() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.handle.enqueue(entry("L2")).await.unwrap();
    assert_eq!(harness.next_now_playing().await, "L1");

    assert!(harness.sink.fail_current("device lost"));

    match harness.next_playback().await {
        PlaybackEvent::TrackFinished { locator, failed } => {
            assert_eq!(locator, "L1");
            assert!(failed);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match harness.next_playback().await {
        PlaybackEvent::Error { origin, message, .. } => {
            assert_eq!(origin, ErrorOrigin::Sink);
            assert!(message.contains("device lost"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(harness.next_now_playing().await, "L2");
}

#[tokio::test]
async fn rejected_play_moves_to_next_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;
    harness.sink.reject_next_play();

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.handle.enqueue(entry("L2")).await.unwrap();

    match harness.next_playback().await {
        PlaybackEvent::Error { locator, origin, .. } => {
            assert_eq!(locator.as_deref(), Some("L1"));
            assert_eq!(origin, ErrorOrigin::Sink);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(harness.next_now_playing().await, "L2");
}

#[tokio::test]
async fn cached_asset_plays_without_download() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    harness.cache.resolve(&locator("L1")).await.unwrap();
    harness.handle.enqueue(entry("L1")).await.unwrap();

    assert_eq!(harness.next_now_playing().await, "L1");
    assert_eq!(harness.extractor.calls(), 1);
    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.current.unwrap().record.title, "Track L1");
}

#[tokio::test]
async fn skip_stops_sink_and_plays_next() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.handle.enqueue(entry("L2")).await.unwrap();
    assert_eq!(harness.next_now_playing().await, "L1");

    let skipped = harness.handle.skip().await.unwrap();

    assert_eq!(skipped, locator("L1"));
    assert_eq!(harness.next_now_playing().await, "L2");
    assert_eq!(harness.sink.stops(), 1);
}

#[tokio::test]
async fn transitions_outside_playing_report_not_playing() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::start(dir.path(), FakeExtractor::gated()).await;

    assert_eq!(harness.handle.skip().await, Err(PlaybackError::NotPlaying));
    assert_eq!(harness.handle.stop().await, Err(PlaybackError::NotPlaying));
    assert_eq!(harness.handle.pause().await, Err(PlaybackError::NotPlaying));
    assert_eq!(harness.handle.resume().await, Err(PlaybackError::NotPlaying));

    // Resolving is not playing either, except for stop
    harness.handle.enqueue(entry("L1")).await.unwrap();
    assert_eq!(harness.handle.skip().await, Err(PlaybackError::NotPlaying));
    assert_eq!(harness.handle.pause().await, Err(PlaybackError::NotPlaying));
}

#[tokio::test]
async fn pause_and_resume_delegate_to_sink() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.next_now_playing().await;

    harness.handle.pause().await.unwrap();
    harness.handle.pause().await.unwrap();
    let snapshot = harness.handle.snapshot().await.unwrap();
    assert!(snapshot.paused);
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(harness.sink.pauses(), 1);

    harness.handle.resume().await.unwrap();
    assert!(!harness.handle.snapshot().await.unwrap().paused);
    assert_eq!(harness.sink.resumes(), 1);

    assert!(matches!(
        harness.next_playback().await,
        PlaybackEvent::Paused { .. }
    ));
    assert!(matches!(
        harness.next_playback().await,
        PlaybackEvent::Resumed { .. }
    ));
}

#[tokio::test]
async fn stop_while_playing_clears_queue() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    for value in ["L1", "L2", "L3"] {
        harness.handle.enqueue(entry(value)).await.unwrap();
    }
    harness.next_now_playing().await;

    assert_eq!(harness.handle.stop().await.unwrap(), 2);

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.current.is_none());
    assert!(harness.persisted_locators().is_empty());

    assert!(matches!(
        harness.next_playback().await,
        PlaybackEvent::Stopped { cleared: 2 }
    ));

    // The sink's completion for L1 must not restart anything
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.sink.played().len(), 1);
    assert!(harness.handle.snapshot().await.unwrap().is_idle());
}

#[tokio::test]
async fn stop_while_resolving_discards_late_result() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::gated()).await;

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.handle.enqueue(entry("L2")).await.unwrap();
    assert_eq!(
        harness.handle.snapshot().await.unwrap().state,
        PlaybackState::Resolving
    );

    assert_eq!(harness.handle.stop().await.unwrap(), 1);
    harness.extractor.open_gate();

    harness
        .wait_for_cache(|event| matches!(event, CacheEvent::DownloadCompleted { .. }))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.current.is_none());
    assert!(harness.sink.played().is_empty());

    // The download itself still landed in the cache
    assert!(harness.cache.cached(&locator("L1")).await.unwrap().is_some());
}

#[tokio::test]
async fn stop_while_resolving_discards_late_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::start(dir.path(), FakeExtractor::gated()).await;
    harness.extractor.always_fail("L1");

    harness.handle.enqueue(entry("L1")).await.unwrap();
    harness.handle.enqueue(entry("L2")).await.unwrap();
    assert_eq!(harness.handle.stop().await.unwrap(), 1);
    harness.extractor.open_gate();

    harness
        .wait_for_cache(|event| {
            matches!(event, CacheEvent::DownloadFailed { locator: failed, .. } if failed == "L1")
        })
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Nothing user-facing follows the failure of a cancelled resolution
    while let Ok(event) = harness.events.try_recv() {
        assert!(
            !matches!(
                event,
                CoreEvent::Playback(PlaybackEvent::Error { .. } | PlaybackEvent::QueueEmpty)
            ),
            "unexpected {event:?}"
        );
    }

    let snapshot = harness.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.queue.is_empty());
    assert!(harness.sink.played().is_empty());
}

#[tokio::test]
async fn crash_during_resolution_loses_only_head() {
    let dir = tempfile::tempdir().unwrap();

    let harness = Harness::start(dir.path(), FakeExtractor::gated()).await;
    for value in ["L1", "L2", "L3"] {
        harness.handle.enqueue(entry(value)).await.unwrap();
    }
    assert_eq!(harness.persisted_locators(), vec!["L2", "L3"]);
    harness.handle.shutdown().await.unwrap();
    drop(harness);

    // Restart with a fresh driver over the same directory
    let mut restarted = Harness::start(dir.path(), FakeExtractor::new()).await;
    let snapshot = restarted.handle.snapshot().await.unwrap();
    assert!(snapshot.is_idle());
    assert_eq!(snapshot.queue.len(), 2);

    assert!(restarted.handle.resume_queue().await.unwrap());
    assert_eq!(restarted.next_now_playing().await, "L2");
    restarted.sink.finish_current();
    assert_eq!(restarted.next_now_playing().await, "L3");

    // Busy drivers ignore resume requests
    assert!(!restarted.handle.resume_queue().await.unwrap());
}

#[tokio::test]
async fn resume_queue_on_empty_queue_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    assert!(!harness.handle.resume_queue().await.unwrap());
}

#[tokio::test]
async fn calls_after_shutdown_report_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::start(dir.path(), FakeExtractor::new()).await;

    harness.handle.shutdown().await.unwrap();
    eventually(|| !harness.handle.is_running()).await;

    assert_eq!(
        harness.handle.enqueue(entry("L1")).await,
        Err(PlaybackError::DriverUnavailable)
    );
    assert!(matches!(
        harness.handle.snapshot().await,
        Err(PlaybackError::DriverUnavailable)
    ));
}

#[tokio::test]
async fn driver_over_existing_queue_does_not_autoplay() {
    let dir = tempfile::tempdir().unwrap();
    let queue_path = dir.path().join("queue.json");
    {
        let mut queue = QueueStore::open(&queue_path).await.unwrap();
        queue.append(entry("L1")).await.unwrap();
    }

    let harness = Harness::start(dir.path(), FakeExtractor::new()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(harness.sink.played().is_empty());
    assert_eq!(persisted_locators(&queue_path), vec!["L1"]);
}
