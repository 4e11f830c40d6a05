//! Forwards the driver's user-facing events to the host notification sink.

use bridge_traits::{Notification, NotificationSink};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Map an event onto the notification stream.
///
/// Only now-playing, error and queue-empty events are notifications.
pub fn to_notification(event: &CoreEvent) -> Option<Notification> {
    let CoreEvent::Playback(event) = event else {
        return None;
    };
    match event {
        PlaybackEvent::NowPlaying {
            locator,
            title,
            requester,
            duration_seconds,
            thumbnail,
        } => Some(Notification::NowPlaying {
            locator: locator.clone(),
            title: title.clone(),
            requester: *requester,
            duration_seconds: *duration_seconds,
            thumbnail: thumbnail.clone(),
        }),
        PlaybackEvent::Error {
            locator,
            message,
            origin,
        } => Some(Notification::Error {
            locator: locator.clone(),
            message: message.clone(),
            origin: *origin,
        }),
        PlaybackEvent::QueueEmpty => Some(Notification::QueueEmpty),
        _ => None,
    }
}

/// Spawn a task delivering notifications from `bus` to `sink` in order.
///
/// The receiver is registered before this returns, so no event emitted
/// afterwards is missed, and it is unbounded, so a slow sink delays delivery
/// without dropping anything. The task ends when every bus clone is dropped.
pub fn spawn_forwarder(bus: &EventBus, sink: Arc<dyn NotificationSink>) -> JoinHandle<()> {
    let mut events = bus.notifications();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(notification) = to_notification(&event) else {
                continue;
            };
            if let Err(e) = sink.notify(notification).await {
                warn!(error = %e, "notification sink rejected a notification");
            }
        }
        debug!("notification forwarder finished");
    })
}
