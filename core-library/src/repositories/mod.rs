//! # Repository Implementations
//!
//! Durable stores backing the media queue. Each store keeps its contents in
//! memory and mirrors every mutation to a JSON document through
//! [`JsonFileStore`](crate::store::JsonFileStore) before the mutation returns.
//!
//! ## Available Repositories
//!
//! - `AssetRepository` - Locator to cached asset records (`library.json`)
//! - `QueueStore` - Ordered pending playback entries (`queue.json`)
//! - `PlaylistRepository` - Per-user saved playlists (`playlists.json`)

pub mod asset;
pub mod playlist;
pub mod queue;

pub use asset::{AssetRepository, JsonAssetRepository};
pub use playlist::{JsonPlaylistRepository, PlaylistRepository};
pub use queue::QueueStore;
