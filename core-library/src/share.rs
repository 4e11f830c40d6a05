//! Playlist export, import and share codes.
//!
//! Exports are pretty-printed JSON documents meant to be attached to a
//! message. Share codes are standard base64 of a compact `{name, songs}`
//! document. Both are validated the same way on the way back in.

use crate::error::{LibraryError, Result};
use crate::models::{Locator, PlaylistSong, RequesterId, SavedPlaylist};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written into new exports.
pub const EXPORT_FORMAT_VERSION: f64 = 1.0;

/// Imports larger than this are rejected before parsing.
pub const MAX_IMPORT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSong {
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "crate::models::seconds_from_number")]
    pub duration: u64,
}

/// Portable playlist document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistExport {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub songs: Vec<SharedSong>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
}

impl PlaylistExport {
    /// Full export of a saved playlist.
    pub fn from_playlist(playlist: &SavedPlaylist, exported_at: DateTime<Utc>) -> Self {
        Self {
            name: playlist.name.clone(),
            description: playlist.description.clone(),
            songs: shared_songs(playlist),
            exported_at: Some(exported_at),
            version: Some(EXPORT_FORMAT_VERSION),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate an export document.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.len() > MAX_IMPORT_BYTES {
            return Err(LibraryError::invalid(
                "file",
                "File size too large (max 1MB)",
            ));
        }
        let value: Value = serde_json::from_str(json)
            .map_err(|err| LibraryError::invalid("file", format!("Invalid JSON: {err}")))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        validate_document(&value)?;
        let mut export: PlaylistExport = serde_json::from_value(value)
            .map_err(|err| LibraryError::invalid("file", format!("Invalid playlist format: {err}")))?;
        export.dedupe_songs();
        Ok(export)
    }

    /// Build a new playlist for `owner`.
    ///
    /// `rename` overrides the exported name. Without an exported description
    /// the playlist is described as imported from the original name.
    pub fn into_playlist(
        self,
        owner: RequesterId,
        rename: Option<&str>,
        now_millis: i64,
    ) -> SavedPlaylist {
        let name = rename
            .map(str::to_string)
            .unwrap_or_else(|| self.name.clone());
        let description = self
            .description
            .clone()
            .or_else(|| Some(format!("Imported from {}", self.name)));

        let mut playlist = SavedPlaylist::new(owner, name, now_millis).with_description(description);
        playlist.songs = self
            .songs
            .into_iter()
            .map(|song| PlaylistSong {
                title: song.title,
                locator: Locator::from(song.url),
                duration_seconds: song.duration,
                added_at: now_millis,
            })
            .collect();
        playlist
    }

    fn dedupe_songs(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.songs.retain(|song| seen.insert(song.url.clone()));
    }
}

/// File name suggested for an exported playlist.
pub fn export_file_name(playlist_name: &str) -> String {
    let safe: String = playlist_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{safe}_playlist.json")
}

#[derive(Serialize)]
struct ShareDocument<'a> {
    name: &'a str,
    songs: Vec<SharedSong>,
}

/// Encode a playlist into a share code.
pub fn encode_share_code(playlist: &SavedPlaylist) -> Result<String> {
    let document = ShareDocument {
        name: &playlist.name,
        songs: shared_songs(playlist),
    };
    let json = serde_json::to_vec(&document)?;
    Ok(STANDARD.encode(json))
}

/// Decode and validate a share code.
pub fn decode_share_code(code: &str) -> Result<PlaylistExport> {
    let bytes = STANDARD
        .decode(code.trim())
        .map_err(|_| LibraryError::invalid("code", "Invalid share code"))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|_| LibraryError::invalid("code", "Invalid share code"))?;
    PlaylistExport::from_value(value)
}

fn shared_songs(playlist: &SavedPlaylist) -> Vec<SharedSong> {
    playlist
        .songs
        .iter()
        .map(|song| SharedSong {
            title: song.title.clone(),
            url: song.locator.to_string(),
            duration: song.duration_seconds,
        })
        .collect()
}

fn validate_document(value: &Value) -> Result<()> {
    let Some(object) = value.as_object() else {
        return Err(LibraryError::invalid("file", "Playlist must be a JSON object"));
    };

    match object.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => {}
        _ => return Err(LibraryError::invalid("name", "Playlist name must be a non-empty string")),
    }

    let Some(songs) = object.get("songs").and_then(Value::as_array) else {
        return Err(LibraryError::invalid("songs", "Playlist songs must be an array"));
    };

    for (index, song) in songs.iter().enumerate() {
        let non_empty = |key: &str| {
            song.get(key)
                .and_then(Value::as_str)
                .is_some_and(|text| !text.is_empty())
        };
        if !non_empty("title") || !non_empty("url") {
            return Err(LibraryError::invalid(
                "songs",
                format!("Song {} needs a string title and url", index + 1),
            ));
        }
    }

    Ok(())
}
