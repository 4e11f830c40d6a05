//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! Both implementations drive external programs that must be on `PATH`:
//! - `Extractor` using the `yt-dlp` command line (search, playlist
//!   expansion, download + mp3 transcode through ffmpeg)
//! - `AudioSink` using `ffplay` (one child process per track)
//!
//! Pause and resume suspend the player process with `SIGSTOP`/`SIGCONT` and
//! are only available on Unix.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{default_data_dir, ProcessAudioSink, YtDlpExtractor};
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .data_dir(default_data_dir().unwrap())
//!     .extractor(Arc::new(YtDlpExtractor::new()))
//!     .audio_sink(Arc::new(ProcessAudioSink::new()))
//!     .build()?;
//! ```

mod process_sink;
mod ytdlp;

pub use process_sink::ProcessAudioSink;
pub use ytdlp::YtDlpExtractor;

use std::path::PathBuf;

const APP_DIR_NAME: &str = "media-queue";

/// Platform data directory for the queue, library and playlist files.
///
/// `None` when the platform reports no data or home directory.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .map(|dir| dir.join(APP_DIR_NAME))
}
