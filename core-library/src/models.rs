//! Domain models for the media queue
//!
//! Persisted shapes stay compatible with the JSON files a previous deployment
//! left behind: the queue is a flat array of `[locator, requester]` pairs and
//! the library maps each locator to `{title, filepath, duration, thumbnail}`.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Canonical key identifying a track at the upstream provider.
///
/// Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Locator {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque id of whoever requested a track. Used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub u64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a saved playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub Uuid);

impl PlaylistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PlaylistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Assets
// =============================================================================

/// A locally cached audio asset.
///
/// A record is only trustworthy while `filepath` exists and is larger than
/// the cache's minimum size; the download cache checks this on every lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub locator: Locator,
    pub title: String,
    pub filepath: PathBuf,
    pub duration_seconds: u64,
    pub thumbnail: Option<String>,
}

impl AssetRecord {
    /// Duration rendered as `m:ss`.
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_seconds)
    }
}

/// On-disk value of the library map (the key carries the locator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredAsset {
    pub title: String,
    pub filepath: PathBuf,
    #[serde(rename = "duration", default, deserialize_with = "seconds_from_number")]
    pub duration_seconds: u64,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl StoredAsset {
    pub(crate) fn into_record(self, locator: Locator) -> AssetRecord {
        AssetRecord {
            locator,
            title: self.title,
            filepath: self.filepath,
            duration_seconds: self.duration_seconds,
            thumbnail: self.thumbnail,
        }
    }
}

impl From<&AssetRecord> for StoredAsset {
    fn from(record: &AssetRecord) -> Self {
        Self {
            title: record.title.clone(),
            filepath: record.filepath.clone(),
            duration_seconds: record.duration_seconds,
            thumbnail: record.thumbnail.clone(),
        }
    }
}

// =============================================================================
// Queue
// =============================================================================

/// One pending playback request. Serialized as a `[locator, requester]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Locator, RequesterId)", into = "(Locator, RequesterId)")]
pub struct QueueEntry {
    pub locator: Locator,
    pub requester: RequesterId,
}

impl QueueEntry {
    pub fn new(locator: impl Into<Locator>, requester: RequesterId) -> Self {
        Self {
            locator: locator.into(),
            requester,
        }
    }
}

impl From<(Locator, RequesterId)> for QueueEntry {
    fn from((locator, requester): (Locator, RequesterId)) -> Self {
        Self { locator, requester }
    }
}

impl From<QueueEntry> for (Locator, RequesterId) {
    fn from(entry: QueueEntry) -> Self {
        (entry.locator, entry.requester)
    }
}

// =============================================================================
// Saved playlists
// =============================================================================

/// A track saved in a user playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSong {
    pub title: String,
    #[serde(rename = "url")]
    pub locator: Locator,
    #[serde(rename = "duration", default, deserialize_with = "seconds_from_number")]
    pub duration_seconds: u64,
    /// Unix epoch milliseconds
    #[serde(default)]
    pub added_at: i64,
}

/// Per-user named collection of tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPlaylist {
    pub id: PlaylistId,
    pub owner: RequesterId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub songs: Vec<PlaylistSong>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SavedPlaylist {
    /// Create an empty playlist. Timestamps are Unix epoch milliseconds.
    pub fn new(owner: RequesterId, name: impl Into<String>, now_millis: i64) -> Self {
        Self {
            id: PlaylistId::new(),
            owner,
            name: name.into().trim().to_string(),
            description: None,
            songs: Vec::new(),
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Normalize a name for lookups (lowercase, trimmed)
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        Self::normalize(&self.name) == Self::normalize(name)
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.songs.iter().any(|song| &song.locator == locator)
    }

    pub fn total_duration_seconds(&self) -> u64 {
        self.songs.iter().map(|song| song.duration_seconds).sum()
    }

    /// Validate playlist data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }

        if self.name.chars().count() > 100 {
            return Err("Playlist name cannot exceed 100 characters".to_string());
        }

        for (index, song) in self.songs.iter().enumerate() {
            if song.locator.as_str().is_empty() {
                return Err(format!("Song {} has an empty url", index + 1));
            }
            if self.songs[..index]
                .iter()
                .any(|earlier| earlier.locator == song.locator)
            {
                return Err(format!("Song {} is a duplicate of an earlier entry", index + 1));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Render whole seconds as `m:ss`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Accepts integer or fractional seconds (providers report either) and `null`.
pub(crate) fn seconds_from_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .map(|seconds| seconds as u64)
        .unwrap_or(0))
}
