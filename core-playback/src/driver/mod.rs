//! # Playback Driver
//!
//! One driver per playback context. It owns the durable queue and walks
//! `Idle → Resolving → Playing → Idle`, auto-advancing after every
//! completion or failure.
//!
//! ## Flow
//!
//! ```text
//! enqueue ──> QueueStore.append ──> (idle?) advance
//!                                      │
//!               ┌──────────────────────┘
//!               v
//!   pop + persist ──> DownloadCache ──> AudioSink.play ──> CompletionSignal
//!        ^              (task)                                (task)
//!        └──────────── Resolved / Completed messages ──────────────┘
//! ```
//!
//! Skip, stop, pause and resume are only honoured in the states that allow
//! them and report [`PlaybackError::NotPlaying`](crate::PlaybackError::NotPlaying)
//! otherwise.

mod actor;
mod handle;
mod state;

pub use actor::PlaybackDriver;
pub use handle::PlaybackHandle;
pub use state::{DriverSnapshot, EnqueueReceipt, NowPlaying, PlaybackState};
