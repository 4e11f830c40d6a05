//! Media extraction bridge.
//!
//! The extractor is the only component that talks to the upstream media
//! provider. It turns free-text queries into canonical locators, expands
//! aggregate locators (playlists) into their member tracks, and downloads a
//! single locator into a normalized local audio file.

use std::path::{Path, PathBuf};

use crate::{error::Result, platform::PlatformSendSync};

/// Result of a successful [`Extractor::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    /// Human readable title reported by the provider.
    pub title: String,
    /// Canonical locator the provider resolved the request to.
    pub canonical_locator: String,
    /// Local path of the transcoded audio file.
    pub file_path: PathBuf,
    /// Duration in whole seconds (0 when unknown).
    pub duration_seconds: u64,
    /// Thumbnail reference, if the provider exposes one.
    pub thumbnail: Option<String>,
}

/// First match of a free-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub locator: String,
    pub title: String,
    pub duration_seconds: u64,
}

/// Returns `true` when `input` should be treated as a locator rather than a
/// free-text query.
pub fn is_locator(input: &str) -> bool {
    input.trim_start().starts_with("http")
}

/// Upstream provider adapter.
///
/// Implementations perform long-running network and disk I/O; callers are
/// expected to run them off any serialized control loop.
///
/// # Errors
///
/// "Nothing found" outcomes (empty search, not a playlist) must be reported
/// as [`BridgeError::NoResults`](crate::BridgeError::NoResults) so callers can
/// distinguish them from transient failures.
#[async_trait::async_trait]
pub trait Extractor: PlatformSendSync {
    /// Search the provider and return the first hit.
    ///
    /// `Ok(None)` means the search ran and matched nothing.
    async fn search(&self, query: &str) -> Result<Option<SearchHit>>;

    /// Expand an aggregate locator into member locators in listed order.
    async fn expand_playlist(&self, locator: &str) -> Result<Vec<String>>;

    /// Fetch and transcode `locator` into `output_dir`.
    ///
    /// The destination file name is derived from the resolved title, so the
    /// same track always lands on the same path.
    async fn download(&self, locator: &str, output_dir: &Path) -> Result<ExtractedMedia>;
}
