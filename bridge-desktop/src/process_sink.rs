//! Audio sink that plays each file in its own player process.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    AudioSink, CompletionSender, CompletionSignal, PlaybackOutcome,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

type KillRequest = oneshot::Sender<()>;

struct ActiveStream {
    id: u64,
    pid: Option<u32>,
    kill: oneshot::Sender<KillRequest>,
}

/// Plays files through `ffplay` (or any player that takes the path as its
/// last argument and exits when done).
///
/// A supervisor task owns the child. It completes the stream's
/// [`CompletionSignal`] when the process exits or is killed by
/// [`AudioSink::stop`].
pub struct ProcessAudioSink {
    program: PathBuf,
    args: Vec<String>,
    active: Arc<Mutex<Option<ActiveStream>>>,
    next_id: AtomicU64,
}

impl ProcessAudioSink {
    pub fn new() -> Self {
        Self::with_command(
            "ffplay",
            ["-nodisp", "-autoexit", "-loglevel", "error"],
        )
    }

    /// Use a different player. `args` go before the file path.
    pub fn with_command<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    fn active_pid(&self) -> Result<u32> {
        self.active
            .lock()
            .as_ref()
            .and_then(|stream| stream.pid)
            .ok_or_else(|| BridgeError::OperationFailed("nothing is playing".to_string()))
    }

    fn spawn_child(&self, path: &Path) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BridgeError::NotAvailable(format!(
                    "{} is not installed or not on PATH",
                    self.program.display()
                )),
                _ => BridgeError::Io(e),
            })
    }
}

impl Default for ProcessAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for ProcessAudioSink {
    #[instrument(skip(self))]
    async fn play(&self, path: &Path) -> Result<CompletionSignal> {
        if self.is_active() {
            self.stop().await?;
        }

        let child = self.spawn_child(path)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (kill_tx, kill_rx) = oneshot::channel();
        let (done, signal) = bridge_traits::completion_channel();

        *self.active.lock() = Some(ActiveStream {
            id,
            pid: child.id(),
            kill: kill_tx,
        });
        debug!(id, pid = ?child.id(), "player started");

        tokio::spawn(supervise(
            child,
            id,
            self.program.display().to_string(),
            kill_rx,
            done,
            Arc::clone(&self.active),
        ));

        Ok(signal)
    }

    async fn stop(&self) -> Result<()> {
        let Some(stream) = self.active.lock().take() else {
            return Ok(());
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if stream.kill.send(ack_tx).is_ok() {
            // Supervisor completes the signal before acknowledging.
            let _ = ack_rx.await;
        }
        debug!(id = stream.id, "player stopped");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let pid = self.active_pid()?;
        signal_process(pid, "-STOP").await
    }

    async fn resume(&self) -> Result<()> {
        let pid = self.active_pid()?;
        signal_process(pid, "-CONT").await
    }

    fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }
}

async fn supervise(
    mut child: Child,
    id: u64,
    program: String,
    kill_rx: oneshot::Receiver<KillRequest>,
    done: CompletionSender,
    active: Arc<Mutex<Option<ActiveStream>>>,
) {
    let stderr = tokio::spawn(read_tail(child.stderr.take()));

    let mut ack = None;
    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => PlaybackOutcome::Finished,
            Ok(status) => {
                let tail = stderr.await.unwrap_or_default();
                let reason = if tail.is_empty() { "no error output".to_string() } else { tail };
                PlaybackOutcome::Failed(format!("{program} exited with {status}: {reason}"))
            }
            Err(e) => PlaybackOutcome::Failed(format!("waiting on {program} failed: {e}")),
        },
        Ok(reply) = kill_rx => {
            if let Err(e) = child.kill().await {
                warn!(id, error = %e, "failed to kill player");
            }
            ack = Some(reply);
            PlaybackOutcome::Finished
        }
    };

    {
        let mut slot = active.lock();
        if slot.as_ref().is_some_and(|stream| stream.id == id) {
            *slot = None;
        }
    }

    debug!(id, ?outcome, "player exited");
    done.complete(outcome);
    if let Some(reply) = ack {
        let _ = reply.send(());
    }
}

async fn read_tail<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    if reader.read_to_end(&mut buf).await.is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(unix)]
async fn signal_process(pid: u32, signal: &str) -> Result<()> {
    let status = Command::new("kill")
        .arg(signal)
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(BridgeError::OperationFailed(format!(
            "kill {signal} {pid} exited with {status}"
        )))
    }
}

#[cfg(not(unix))]
async fn signal_process(_pid: u32, _signal: &str) -> Result<()> {
    Err(BridgeError::NotAvailable(
        "pausing a player process is only supported on Unix".to_string(),
    ))
}
