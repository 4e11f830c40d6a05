//! # Library Module
//!
//! Durable state for the media queue.
//!
//! ## Overview
//!
//! This crate manages:
//! - The asset store mapping locators to cached audio files (`library.json`)
//! - The FIFO queue of pending playback entries (`queue.json`)
//! - Per-user saved playlists (`playlists.json`) with export/import and share codes
//!
//! Every store is a whole-file JSON document replaced atomically on each
//! mutation. Corrupt or missing files reset to an empty store instead of
//! failing startup.

pub mod error;
pub mod models;
pub mod repositories;
pub mod share;
pub mod store;

pub use error::{LibraryError, Result};
pub use models::{
    format_duration, AssetRecord, Locator, PlaylistId, PlaylistSong, QueueEntry, RequesterId,
    SavedPlaylist,
};
pub use repositories::{
    AssetRepository, JsonAssetRepository, JsonPlaylistRepository, PlaylistRepository, QueueStore,
};
pub use share::{decode_share_code, encode_share_code, export_file_name, PlaylistExport};
pub use store::JsonFileStore;
