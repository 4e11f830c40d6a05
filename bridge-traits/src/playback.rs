//! Audio sink bridge.
//!
//! The core never decodes audio itself. It hands a local file path to the
//! host's audio sink and waits on a [`CompletionSignal`] that resolves exactly
//! once, either when the stream finishes or when the sink gives up on it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{error::Result, platform::PlatformSendSync};

/// Terminal outcome of one handed-off asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum PlaybackOutcome {
    /// Stream played to the end or was stopped on request.
    Finished,
    /// The sink failed while playing.
    Failed(String),
}

impl PlaybackOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PlaybackOutcome::Failed(_))
    }
}

/// Sending half of a completion signal, held by the sink.
#[derive(Debug)]
pub struct CompletionSender {
    inner: oneshot::Sender<PlaybackOutcome>,
}

impl CompletionSender {
    /// Deliver the outcome. Consumes the sender so it can fire only once.
    pub fn complete(self, outcome: PlaybackOutcome) {
        // Receiver gone means nobody is waiting anymore.
        let _ = self.inner.send(outcome);
    }
}

/// Receiving half of a completion signal, returned from [`AudioSink::play`].
#[derive(Debug)]
pub struct CompletionSignal {
    inner: oneshot::Receiver<PlaybackOutcome>,
}

impl CompletionSignal {
    /// Wait for the outcome.
    ///
    /// A sink that drops its sender without completing is reported as a
    /// failure so the waiting side always observes a terminal outcome.
    pub async fn wait(self) -> PlaybackOutcome {
        self.inner.await.unwrap_or_else(|_| {
            PlaybackOutcome::Failed("audio sink dropped the stream without completing".to_string())
        })
    }
}

/// Create a linked completion sender/signal pair.
pub fn completion_channel() -> (CompletionSender, CompletionSignal) {
    let (tx, rx) = oneshot::channel();
    (
        CompletionSender { inner: tx },
        CompletionSignal { inner: rx },
    )
}

/// Real-time audio output.
///
/// At most one `play` is outstanding at a time. `stop` must cause the
/// outstanding signal to complete (normally with [`PlaybackOutcome::Finished`]).
#[async_trait::async_trait]
pub trait AudioSink: PlatformSendSync {
    /// Start playing the file at `path`.
    async fn play(&self, path: &Path) -> Result<CompletionSignal>;

    /// Stop the current stream.
    async fn stop(&self) -> Result<()>;

    /// Pause the current stream without releasing it.
    async fn pause(&self) -> Result<()>;

    /// Resume a paused stream.
    async fn resume(&self) -> Result<()>;

    /// Whether a stream is currently held by the sink.
    fn is_active(&self) -> bool;
}
