//! Saved playlist repository trait and JSON implementation

use crate::error::{LibraryError, Result};
use crate::models::{PlaylistSong, RequesterId, SavedPlaylist};
use crate::store::JsonFileStore;
use async_trait::async_trait;
use bridge_traits::time::Clock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Playlist repository interface.
///
/// Playlists are scoped to their owner and looked up by name,
/// case-insensitively.
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Create an empty playlist
    ///
    /// # Errors
    /// Returns error if:
    /// - The owner already has a playlist with this name
    /// - The name fails validation
    async fn create(
        &self,
        owner: RequesterId,
        name: &str,
        description: Option<String>,
    ) -> Result<SavedPlaylist>;

    /// Insert a fully built playlist (used by imports)
    ///
    /// # Errors
    /// Same as [`create`](Self::create).
    async fn insert(&self, playlist: SavedPlaylist) -> Result<SavedPlaylist>;

    /// Find one of the owner's playlists by name
    async fn find_by_name(&self, owner: RequesterId, name: &str) -> Result<Option<SavedPlaylist>>;

    /// All playlists of an owner, in creation order
    async fn list(&self, owner: RequesterId) -> Result<Vec<SavedPlaylist>>;

    /// Append a song
    ///
    /// # Errors
    /// Returns error if:
    /// - The playlist does not exist
    /// - The song's locator is already in the playlist
    async fn add_song(
        &self,
        owner: RequesterId,
        name: &str,
        song: PlaylistSong,
    ) -> Result<SavedPlaylist>;

    /// Remove the song at a 1-based `position` and return it
    async fn remove_song(
        &self,
        owner: RequesterId,
        name: &str,
        position: usize,
    ) -> Result<PlaylistSong>;

    /// Delete a playlist
    ///
    /// # Returns
    /// - `Ok(true)` if the playlist was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, owner: RequesterId, name: &str) -> Result<bool>;
}

/// [`PlaylistRepository`] persisted as a JSON array.
pub struct JsonPlaylistRepository {
    store: JsonFileStore<Vec<SavedPlaylist>>,
    playlists: Mutex<Vec<SavedPlaylist>>,
    clock: Arc<dyn Clock>,
}

impl JsonPlaylistRepository {
    /// Open (or create) the playlist file at `path`.
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store: JsonFileStore<Vec<SavedPlaylist>> = JsonFileStore::new(path);
        let playlists = store.load().await?;
        debug!(
            path = %store.path().display(),
            playlists = playlists.len(),
            "playlist store loaded"
        );

        Ok(Self {
            store,
            playlists: Mutex::new(playlists),
            clock,
        })
    }

    async fn mutate<R>(
        &self,
        mutate: impl FnOnce(&mut Vec<SavedPlaylist>) -> Result<R>,
    ) -> Result<R> {
        let mut playlists = self.playlists.lock().await;
        let mut next = playlists.clone();
        let outcome = mutate(&mut next)?;
        self.store.save(&next).await?;
        *playlists = next;
        Ok(outcome)
    }
}

fn not_found(owner: RequesterId, name: &str) -> LibraryError {
    LibraryError::NotFound {
        entity_type: "Playlist".to_string(),
        id: format!("{owner}/{name}"),
    }
}

fn find_mut<'a>(
    playlists: &'a mut [SavedPlaylist],
    owner: RequesterId,
    name: &str,
) -> Result<&'a mut SavedPlaylist> {
    playlists
        .iter_mut()
        .find(|playlist| playlist.owner == owner && playlist.matches_name(name))
        .ok_or_else(|| not_found(owner, name))
}

#[async_trait]
impl PlaylistRepository for JsonPlaylistRepository {
    async fn create(
        &self,
        owner: RequesterId,
        name: &str,
        description: Option<String>,
    ) -> Result<SavedPlaylist> {
        let playlist = SavedPlaylist::new(owner, name, self.clock.unix_timestamp_millis())
            .with_description(description);
        self.insert(playlist).await
    }

    async fn insert(&self, playlist: SavedPlaylist) -> Result<SavedPlaylist> {
        playlist
            .validate()
            .map_err(|message| LibraryError::invalid("playlist", message))?;

        let created = self
            .mutate(|playlists| {
                if playlists
                    .iter()
                    .any(|existing| existing.owner == playlist.owner && existing.matches_name(&playlist.name))
                {
                    return Err(LibraryError::AlreadyExists {
                        entity_type: "Playlist".to_string(),
                        id: format!("{}/{}", playlist.owner, playlist.name),
                    });
                }
                playlists.push(playlist.clone());
                Ok(playlist)
            })
            .await?;

        info!(owner = %created.owner, name = %created.name, songs = created.songs.len(), "playlist created");
        Ok(created)
    }

    async fn find_by_name(&self, owner: RequesterId, name: &str) -> Result<Option<SavedPlaylist>> {
        let playlists = self.playlists.lock().await;
        Ok(playlists
            .iter()
            .find(|playlist| playlist.owner == owner && playlist.matches_name(name))
            .cloned())
    }

    async fn list(&self, owner: RequesterId) -> Result<Vec<SavedPlaylist>> {
        let playlists = self.playlists.lock().await;
        Ok(playlists
            .iter()
            .filter(|playlist| playlist.owner == owner)
            .cloned()
            .collect())
    }

    async fn add_song(
        &self,
        owner: RequesterId,
        name: &str,
        song: PlaylistSong,
    ) -> Result<SavedPlaylist> {
        let now = self.clock.unix_timestamp_millis();
        self.mutate(|playlists| {
            let playlist = find_mut(playlists, owner, name)?;
            if playlist.contains(&song.locator) {
                return Err(LibraryError::AlreadyExists {
                    entity_type: "PlaylistSong".to_string(),
                    id: song.locator.to_string(),
                });
            }
            let mut song = song;
            if song.added_at == 0 {
                song.added_at = now;
            }
            playlist.songs.push(song);
            playlist.updated_at = now;
            Ok(playlist.clone())
        })
        .await
    }

    async fn remove_song(
        &self,
        owner: RequesterId,
        name: &str,
        position: usize,
    ) -> Result<PlaylistSong> {
        let now = self.clock.unix_timestamp_millis();
        self.mutate(|playlists| {
            let playlist = find_mut(playlists, owner, name)?;
            if position == 0 || position > playlist.songs.len() {
                return Err(LibraryError::invalid(
                    "position",
                    format!(
                        "Invalid position. The playlist has {} songs.",
                        playlist.songs.len()
                    ),
                ));
            }
            playlist.updated_at = now;
            Ok(playlist.songs.remove(position - 1))
        })
        .await
    }

    async fn delete(&self, owner: RequesterId, name: &str) -> Result<bool> {
        self.mutate(|playlists| {
            let before = playlists.len();
            playlists.retain(|playlist| !(playlist.owner == owner && playlist.matches_name(name)));
            Ok(playlists.len() != before)
        })
        .await
    }
}
