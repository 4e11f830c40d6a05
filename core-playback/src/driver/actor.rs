//! The driver task.
//!
//! Every transition runs on this task, one message at a time. Downloads and
//! sink completions run elsewhere and report back through the mailbox tagged
//! with the generation they were started under; a message from an older
//! generation is dropped.

use super::state::{DriverSnapshot, EnqueueReceipt, NowPlaying, PlaybackState};
use crate::cache::DownloadCache;
use crate::error::{PlaybackError, Result};
use bridge_traits::{AudioSink, CompletionSignal, ErrorOrigin, PlaybackOutcome};
use core_library::{AssetRecord, Locator, QueueEntry, QueueStore};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Reply<T> = oneshot::Sender<T>;

/// Operator requests.
pub(crate) enum Command {
    Enqueue {
        entry: QueueEntry,
        reply: Reply<Result<EnqueueReceipt>>,
    },
    Skip {
        reply: Reply<Result<Locator>>,
    },
    Stop {
        reply: Reply<Result<usize>>,
    },
    Pause {
        reply: Reply<Result<()>>,
    },
    Resume {
        reply: Reply<Result<()>>,
    },
    Snapshot {
        reply: Reply<DriverSnapshot>,
    },
    ResumeQueue {
        reply: Reply<Result<bool>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

pub(crate) enum Message {
    Command(Command),
    Resolved {
        generation: u64,
        entry: QueueEntry,
        result: Result<AssetRecord>,
    },
    Completed {
        generation: u64,
        outcome: PlaybackOutcome,
    },
}

/// Sequential playback state machine for one playback context.
///
/// Owns the durable queue, the state, the current track and the generation
/// counter. Obtain one with [`PlaybackDriver::spawn`] and talk to it through
/// the returned [`PlaybackHandle`](super::PlaybackHandle).
pub struct PlaybackDriver {
    queue: QueueStore,
    cache: DownloadCache,
    sink: Arc<dyn AudioSink>,
    events: EventBus,
    state: PlaybackState,
    current: Option<NowPlaying>,
    resolving: Option<QueueEntry>,
    paused: bool,
    generation: u64,
    mailbox: mpsc::WeakUnboundedSender<Message>,
}

impl PlaybackDriver {
    /// Start a driver task on the current tokio runtime.
    ///
    /// The driver starts `Idle` even when `queue` is not empty; call
    /// [`PlaybackHandle::resume_queue`](super::PlaybackHandle::resume_queue)
    /// to pick up a persisted queue.
    pub fn spawn(
        queue: QueueStore,
        cache: DownloadCache,
        sink: Arc<dyn AudioSink>,
        events: EventBus,
    ) -> super::PlaybackHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let driver = Self {
            queue,
            cache,
            sink,
            events,
            state: PlaybackState::Idle,
            current: None,
            resolving: None,
            paused: false,
            generation: 0,
            mailbox: sender.downgrade(),
        };

        tokio::spawn(driver.run(receiver));
        super::PlaybackHandle::new(sender)
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Message>) {
        info!(pending = self.queue.len(), "playback driver started");

        while let Some(message) = receiver.recv().await {
            match message {
                Message::Command(Command::Shutdown { reply }) => {
                    self.shutdown().await;
                    let _ = reply.send(());
                    break;
                }
                Message::Command(command) => self.handle_command(command).await,
                Message::Resolved {
                    generation,
                    entry,
                    result,
                } => self.handle_resolved(generation, entry, result).await,
                Message::Completed {
                    generation,
                    outcome,
                } => self.handle_completed(generation, outcome).await,
            }
        }

        info!("playback driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        // A dropped reply receiver just means the caller stopped waiting.
        match command {
            Command::Enqueue { entry, reply } => {
                let _ = reply.send(self.enqueue(entry).await);
            }
            Command::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::ResumeQueue { reply } => {
                let _ = reply.send(self.resume_queue().await);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // ========================================================================
    // Operator transitions
    // ========================================================================

    async fn enqueue(&mut self, entry: QueueEntry) -> Result<EnqueueReceipt> {
        let position = self.queue.append(entry.clone()).await?;
        debug!(locator = %entry.locator, position, "entry enqueued");
        self.emit(CoreEvent::Queue(QueueEvent::Enqueued {
            locator: entry.locator.to_string(),
            requester: entry.requester.0,
            position,
        }));

        let started = self.state == PlaybackState::Idle;
        if started {
            self.advance().await;
        }

        Ok(EnqueueReceipt { position, started })
    }

    async fn skip(&mut self) -> Result<Locator> {
        let Some(now) = self.playing() else {
            return Err(PlaybackError::NotPlaying);
        };
        let locator = now.entry.locator.clone();
        info!(locator = %locator, "skipping");
        self.emit_playback(PlaybackEvent::Skipped {
            locator: locator.to_string(),
        });

        // A successful stop completes the sink's signal, which advances
        // through `handle_completed`.
        if let Err(e) = self.sink.stop().await {
            warn!(error = %e, "audio sink refused to stop, advancing anyway");
            self.generation += 1;
            self.advance().await;
        }

        Ok(locator)
    }

    async fn stop(&mut self) -> Result<usize> {
        if self.state == PlaybackState::Idle {
            return Err(PlaybackError::NotPlaying);
        }

        let was_playing = self.state == PlaybackState::Playing;
        self.generation += 1;
        self.set_idle();

        if was_playing {
            if let Err(e) = self.sink.stop().await {
                warn!(error = %e, "audio sink failed to stop");
            }
        }

        let cleared = self.queue.clear().await?;
        info!(cleared, "playback stopped");
        self.emit_playback(PlaybackEvent::Stopped { cleared });
        self.emit(CoreEvent::Queue(QueueEvent::Cleared { removed: cleared }));
        Ok(cleared)
    }

    async fn pause(&mut self) -> Result<()> {
        let Some(now) = self.playing() else {
            return Err(PlaybackError::NotPlaying);
        };
        if self.paused {
            return Ok(());
        }
        let locator = now.entry.locator.to_string();

        self.sink.pause().await.map_err(PlaybackError::from_sink)?;
        self.paused = true;
        self.emit_playback(PlaybackEvent::Paused { locator });
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        let Some(now) = self.playing() else {
            return Err(PlaybackError::NotPlaying);
        };
        if !self.paused {
            return Ok(());
        }
        let locator = now.entry.locator.to_string();

        self.sink.resume().await.map_err(PlaybackError::from_sink)?;
        self.paused = false;
        self.emit_playback(PlaybackEvent::Resumed { locator });
        Ok(())
    }

    async fn resume_queue(&mut self) -> Result<bool> {
        if self.state != PlaybackState::Idle || self.queue.is_empty() {
            return Ok(false);
        }
        info!(pending = self.queue.len(), "resuming persisted queue");
        self.advance().await;
        Ok(true)
    }

    fn snapshot(&self) -> DriverSnapshot {
        DriverSnapshot {
            state: self.state,
            current: self.current.clone(),
            resolving: self.resolving.clone(),
            queue: self.queue.snapshot(),
            paused: self.paused,
        }
    }

    async fn shutdown(&mut self) {
        if self.state == PlaybackState::Playing {
            if let Err(e) = self.sink.stop().await {
                warn!(error = %e, "audio sink failed to stop during shutdown");
            }
        }
        self.generation += 1;
        self.set_idle();
    }

    // ========================================================================
    // Advancement
    // ========================================================================

    /// Pop entries until one is playing, one is handed off for resolution,
    /// or the queue runs dry.
    async fn advance(&mut self) {
        loop {
            self.current = None;
            self.paused = false;

            let entry = match self.queue.pop_front().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.set_idle();
                    info!("queue is empty, driver idle");
                    self.emit_playback(PlaybackEvent::QueueEmpty);
                    return;
                }
                Err(e) => {
                    // The head stays queued; the next enqueue or resume retries.
                    error!(error = %e, "failed to persist queue pop");
                    self.set_idle();
                    self.emit_error(
                        None,
                        format!("Failed to update the queue: {e}"),
                        ErrorOrigin::Store,
                    );
                    return;
                }
            };

            self.generation += 1;
            self.state = PlaybackState::Resolving;
            self.resolving = Some(entry.clone());
            debug!(locator = %entry.locator, generation = self.generation, "resolving");

            match self.cache.cached(&entry.locator).await {
                Ok(Some(record)) => {
                    if self.start_playback(entry, record).await {
                        return;
                    }
                }
                Ok(None) => {
                    self.spawn_resolution(entry);
                    return;
                }
                Err(e) => {
                    debug!(error = %e, "fast path lookup failed, resolving in background");
                    self.spawn_resolution(entry);
                    return;
                }
            }
        }
    }

    async fn handle_resolved(
        &mut self,
        generation: u64,
        entry: QueueEntry,
        result: Result<AssetRecord>,
    ) {
        if generation != self.generation || self.state != PlaybackState::Resolving {
            debug!(locator = %entry.locator, generation, "discarding stale resolution");
            return;
        }

        match result {
            Ok(record) => {
                if !self.start_playback(entry, record).await {
                    self.advance().await;
                }
            }
            Err(e) => {
                warn!(locator = %entry.locator, error = %e, "resolution failed, skipping entry");
                self.emit_error(
                    Some(&entry.locator),
                    format!("Failed to load {}: {e}", entry.locator),
                    ErrorOrigin::Resolution,
                );
                self.advance().await;
            }
        }
    }

    async fn handle_completed(&mut self, generation: u64, outcome: PlaybackOutcome) {
        if generation != self.generation || self.state != PlaybackState::Playing {
            debug!(generation, "discarding stale completion");
            return;
        }
        let Some(finished) = self.current.take() else {
            return;
        };
        let locator = finished.entry.locator;

        self.emit_playback(PlaybackEvent::TrackFinished {
            locator: locator.to_string(),
            failed: outcome.is_failure(),
        });
        if let PlaybackOutcome::Failed(message) = outcome {
            warn!(locator = %locator, error = %message, "audio sink failed mid-stream");
            self.emit_error(
                Some(&locator),
                format!("Playback failed: {message}"),
                ErrorOrigin::Sink,
            );
        } else {
            debug!(locator = %locator, "track finished");
        }

        self.advance().await;
    }

    /// Hand `record` to the sink. Returns `false` if the sink refused it.
    async fn start_playback(&mut self, entry: QueueEntry, record: AssetRecord) -> bool {
        let signal = match self.sink.play(&record.filepath).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(locator = %entry.locator, error = %e, "audio sink rejected asset");
                self.emit_error(
                    Some(&entry.locator),
                    format!("Failed to play {}: {e}", record.title),
                    ErrorOrigin::Sink,
                );
                return false;
            }
        };

        self.state = PlaybackState::Playing;
        self.resolving = None;
        self.watch_completion(signal);

        info!(locator = %entry.locator, title = %record.title, "now playing");
        self.emit_playback(PlaybackEvent::NowPlaying {
            locator: entry.locator.to_string(),
            title: record.title.clone(),
            requester: entry.requester.0,
            duration_seconds: record.duration_seconds,
            thumbnail: record.thumbnail.clone(),
        });
        self.current = Some(NowPlaying { entry, record });
        true
    }

    fn spawn_resolution(&self, entry: QueueEntry) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        let generation = self.generation;
        let cache = self.cache.clone();

        tokio::spawn(async move {
            let result = cache.resolve(&entry.locator).await;
            let _ = mailbox.send(Message::Resolved {
                generation,
                entry,
                result,
            });
        });
    }

    fn watch_completion(&self, signal: CompletionSignal) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        let generation = self.generation;

        tokio::spawn(async move {
            let outcome = signal.wait().await;
            let _ = mailbox.send(Message::Completed {
                generation,
                outcome,
            });
        });
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn playing(&self) -> Option<&NowPlaying> {
        match self.state {
            PlaybackState::Playing => self.current.as_ref(),
            _ => None,
        }
    }

    fn set_idle(&mut self) {
        self.state = PlaybackState::Idle;
        self.current = None;
        self.resolving = None;
        self.paused = false;
    }

    fn emit_error(&self, locator: Option<&Locator>, message: String, origin: ErrorOrigin) {
        self.emit_playback(PlaybackEvent::Error {
            locator: locator.map(Locator::to_string),
            message,
            origin,
        });
    }

    fn emit_playback(&self, event: PlaybackEvent) {
        self.emit(CoreEvent::Playback(event));
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine.
        let _ = self.events.emit(event);
    }
}
