use super::actor::{Command, Message};
use super::state::{DriverSnapshot, EnqueueReceipt};
use crate::error::{PlaybackError, Result};
use core_library::{Locator, QueueEntry};
use tokio::sync::{mpsc, oneshot};

/// Cloneable handle to a running [`PlaybackDriver`](super::PlaybackDriver).
///
/// Every method is a request to the driver task. Once the driver has shut
/// down, every method returns [`PlaybackError::DriverUnavailable`].
#[derive(Clone)]
pub struct PlaybackHandle {
    mailbox: mpsc::UnboundedSender<Message>,
}

impl PlaybackHandle {
    pub(crate) fn new(mailbox: mpsc::UnboundedSender<Message>) -> Self {
        Self { mailbox }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Message::Command(build(reply)))
            .map_err(|_| PlaybackError::DriverUnavailable)?;
        response.await.map_err(|_| PlaybackError::DriverUnavailable)
    }

    /// Append an entry (persisted before this returns) and start playback if
    /// the driver is idle.
    pub async fn enqueue(&self, entry: QueueEntry) -> Result<EnqueueReceipt> {
        self.request(|reply| Command::Enqueue { entry, reply }).await?
    }

    /// Stop the current track and move on to the next entry.
    ///
    /// Returns the skipped locator, or [`PlaybackError::NotPlaying`].
    pub async fn skip(&self) -> Result<Locator> {
        self.request(|reply| Command::Skip { reply }).await?
    }

    /// Clear the queue, stop the sink and go idle.
    ///
    /// Accepted while playing or resolving. Returns the number of pending
    /// entries discarded.
    pub async fn stop(&self) -> Result<usize> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<DriverSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Start playing a persisted queue. Returns `false` if the driver was
    /// busy or the queue is empty.
    pub async fn resume_queue(&self) -> Result<bool> {
        self.request(|reply| Command::ResumeQueue { reply }).await?
    }

    /// Stop the driver task. The persisted queue is left as it is.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed()
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("running", &self.is_running())
            .finish()
    }
}
