//! Saved playlist operations on [`MediaQueueService`].

use crate::error::{CoreError, Result};
use crate::views::ExportedPlaylist;
use crate::MediaQueueService;
use bridge_traits::is_locator;
use core_library::{
    decode_share_code, encode_share_code, export_file_name, LibraryError, Locator, PlaylistExport,
    PlaylistSong, RequesterId, SavedPlaylist,
};
use tracing::{info, instrument};

impl MediaQueueService {
    pub async fn create_playlist(
        &self,
        owner: RequesterId,
        name: &str,
        description: Option<String>,
    ) -> Result<SavedPlaylist> {
        Ok(self
            .inner
            .playlists
            .create(owner, name.trim(), description)
            .await?)
    }

    /// Add a song by search query or URL.
    ///
    /// Title and duration come from the extractor's metadata. A URL keeps
    /// the exact locator it was given.
    #[instrument(skip(self))]
    pub async fn add_to_playlist(
        &self,
        owner: RequesterId,
        name: &str,
        query: &str,
    ) -> Result<PlaylistSong> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidInput("query cannot be empty".to_string()));
        }
        let hit = self.search(query).await?;
        let locator = if is_locator(query) {
            Locator::new(query)
        } else {
            Locator::new(hit.locator)
        };

        let song = PlaylistSong {
            title: hit.title,
            locator,
            duration_seconds: hit.duration_seconds,
            added_at: self.inner.clock.unix_timestamp_millis(),
        };
        self.inner
            .playlists
            .add_song(owner, name, song.clone())
            .await?;
        Ok(song)
    }

    /// Remove the song at 1-based `position`.
    pub async fn remove_from_playlist(
        &self,
        owner: RequesterId,
        name: &str,
        position: usize,
    ) -> Result<PlaylistSong> {
        Ok(self
            .inner
            .playlists
            .remove_song(owner, name, position)
            .await?)
    }

    pub async fn playlist(&self, owner: RequesterId, name: &str) -> Result<SavedPlaylist> {
        self.inner
            .playlists
            .find_by_name(owner, name)
            .await?
            .ok_or_else(|| {
                LibraryError::NotFound {
                    entity_type: "Playlist".to_string(),
                    id: name.to_string(),
                }
                .into()
            })
    }

    pub async fn playlists(&self, owner: RequesterId) -> Result<Vec<SavedPlaylist>> {
        Ok(self.inner.playlists.list(owner).await?)
    }

    pub async fn delete_playlist(&self, owner: RequesterId, name: &str) -> Result<bool> {
        Ok(self.inner.playlists.delete(owner, name).await?)
    }

    /// Enqueue every song of a saved playlist in order. Returns how many
    /// entries were added.
    #[instrument(skip(self))]
    pub async fn play_saved_playlist(&self, owner: RequesterId, name: &str) -> Result<usize> {
        let playlist = self.playlist(owner, name).await?;
        if playlist.songs.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Playlist '{}' is empty",
                playlist.name
            )));
        }

        for song in &playlist.songs {
            self.enqueue(song.locator.clone(), owner).await?;
        }
        info!(playlist = %playlist.name, count = playlist.songs.len(), "saved playlist enqueued");
        Ok(playlist.songs.len())
    }

    // ========================================================================
    // Export / import
    // ========================================================================

    pub async fn export_playlist(&self, owner: RequesterId, name: &str) -> Result<ExportedPlaylist> {
        let playlist = self.playlist(owner, name).await?;
        let export = PlaylistExport::from_playlist(&playlist, self.inner.clock.now());
        Ok(ExportedPlaylist {
            file_name: export_file_name(&playlist.name),
            json: export.to_json()?,
        })
    }

    /// Import an export document as a new playlist owned by `owner`.
    ///
    /// `rename` overrides the name stored in the document.
    pub async fn import_playlist(
        &self,
        owner: RequesterId,
        json: &str,
        rename: Option<&str>,
    ) -> Result<SavedPlaylist> {
        let export = PlaylistExport::from_json(json)?;
        self.insert_import(owner, export, rename).await
    }

    pub async fn share_code(&self, owner: RequesterId, name: &str) -> Result<String> {
        let playlist = self.playlist(owner, name).await?;
        Ok(encode_share_code(&playlist)?)
    }

    pub async fn import_share_code(
        &self,
        owner: RequesterId,
        code: &str,
        rename: Option<&str>,
    ) -> Result<SavedPlaylist> {
        let export = decode_share_code(code)?;
        self.insert_import(owner, export, rename).await
    }

    async fn insert_import(
        &self,
        owner: RequesterId,
        export: PlaylistExport,
        rename: Option<&str>,
    ) -> Result<SavedPlaylist> {
        let rename = rename.map(str::trim).filter(|name| !name.is_empty());
        let playlist = export.into_playlist(owner, rename, self.inner.clock.unix_timestamp_millis());
        let playlist = self.inner.playlists.insert(playlist).await?;
        info!(playlist = %playlist.name, songs = playlist.songs.len(), "playlist imported");
        Ok(playlist)
    }
}
