//! Liked songs and user playlists

use anyhow::Result;
use chrono::Utc;

use crate::model::{Playlist, Track};
use super::store::{LIKED_SONGS_KEY, PLAYLISTS_KEY, Store};

/// Partial playlist update; `None` fields are left as they are
#[derive(Clone, Debug, Default)]
pub struct PlaylistUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<Option<String>>,
}

/// Liked songs and playlists, each stored as one JSON document.
///
/// Every operation is a read-modify-write of the whole document. Two
/// processes writing the same key at once may lose one of the updates.
#[derive(Clone)]
pub struct LocalLibrary {
    store: Store,
}

impl LocalLibrary {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // ========================================================================
    // Liked songs
    // ========================================================================

    /// Most recently liked first
    pub fn liked_songs(&self) -> Vec<Track> {
        self.store.read(LIKED_SONGS_KEY)
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.liked_songs().iter().any(|t| t.id == track_id)
    }

    pub fn like_track(&self, track: &Track) -> Result<()> {
        let mut liked = self.liked_songs();
        if liked.iter().any(|t| t.id == track.id) {
            return Ok(());
        }
        liked.insert(0, track.clone());
        self.store.write(LIKED_SONGS_KEY, &liked)?;
        tracing::info!(track_id = %track.id, name = %track.name, "Track liked");
        Ok(())
    }

    pub fn unlike_track(&self, track_id: &str) -> Result<()> {
        let mut liked = self.liked_songs();
        let before = liked.len();
        liked.retain(|t| t.id != track_id);
        if liked.len() == before {
            return Ok(());
        }
        self.store.write(LIKED_SONGS_KEY, &liked)?;
        tracing::info!(track_id, "Track unliked");
        Ok(())
    }

    /// Returns whether the track is liked afterwards
    pub fn toggle_like(&self, track: &Track) -> Result<bool> {
        if self.is_liked(&track.id) {
            self.unlike_track(&track.id)?;
            Ok(false)
        } else {
            self.like_track(track)?;
            Ok(true)
        }
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    pub fn playlists(&self) -> Vec<Playlist> {
        self.store.read(PLAYLISTS_KEY)
    }

    pub fn playlist(&self, playlist_id: &str) -> Option<Playlist> {
        self.playlists().into_iter().find(|p| p.id == playlist_id)
    }

    pub fn create_playlist(&self, name: &str, description: &str) -> Result<Playlist> {
        let mut playlists = self.playlists();
        let playlist = Playlist {
            id: unique_playlist_id(&playlists),
            name: name.to_string(),
            description: description.to_string(),
            tracks: Vec::new(),
            created: Utc::now(),
            image: None,
        };
        playlists.push(playlist.clone());
        self.store.write(PLAYLISTS_KEY, &playlists)?;
        tracing::info!(playlist_id = %playlist.id, name, "Playlist created");
        Ok(playlist)
    }

    /// Returns false when the playlist is unknown or already holds the track
    pub fn add_track_to_playlist(&self, playlist_id: &str, track: &Track) -> Result<bool> {
        let mut playlists = self.playlists();
        let Some(playlist) = playlists.iter_mut().find(|p| p.id == playlist_id) else {
            tracing::warn!(playlist_id, "Cannot add to unknown playlist");
            return Ok(false);
        };
        if playlist.contains(&track.id) {
            return Ok(false);
        }
        playlist.tracks.push(track.clone());
        self.store.write(PLAYLISTS_KEY, &playlists)?;
        tracing::debug!(playlist_id, track_id = %track.id, "Track added to playlist");
        Ok(true)
    }

    pub fn remove_track_from_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        let mut playlists = self.playlists();
        let Some(playlist) = playlists.iter_mut().find(|p| p.id == playlist_id) else {
            return Ok(());
        };
        let before = playlist.tracks.len();
        playlist.tracks.retain(|t| t.id != track_id);
        if playlist.tracks.len() != before {
            self.store.write(PLAYLISTS_KEY, &playlists)?;
        }
        Ok(())
    }

    pub fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut playlists = self.playlists();
        let before = playlists.len();
        playlists.retain(|p| p.id != playlist_id);
        if playlists.len() != before {
            self.store.write(PLAYLISTS_KEY, &playlists)?;
            tracing::info!(playlist_id, "Playlist deleted");
        }
        Ok(())
    }

    pub fn update_playlist(&self, playlist_id: &str, update: PlaylistUpdate) -> Result<Option<Playlist>> {
        let mut playlists = self.playlists();
        let Some(playlist) = playlists.iter_mut().find(|p| p.id == playlist_id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            playlist.name = name;
        }
        if let Some(description) = update.description {
            playlist.description = description;
        }
        if let Some(image) = update.image {
            playlist.image = image;
        }
        let updated = playlist.clone();
        self.store.write(PLAYLISTS_KEY, &playlists)?;
        Ok(Some(updated))
    }

    /// Store a playlist received through a share link under a fresh id
    pub fn import_playlist(&self, name: &str, description: &str, tracks: Vec<Track>) -> Result<Playlist> {
        let mut playlists = self.playlists();
        let mut deduped: Vec<Track> = Vec::with_capacity(tracks.len());
        for track in tracks {
            if !deduped.iter().any(|t| t.id == track.id) {
                deduped.push(track);
            }
        }
        let playlist = Playlist {
            id: unique_playlist_id(&playlists),
            name: name.to_string(),
            description: description.to_string(),
            tracks: deduped,
            created: Utc::now(),
            image: None,
        };
        playlists.push(playlist.clone());
        self.store.write(PLAYLISTS_KEY, &playlists)?;
        tracing::info!(playlist_id = %playlist.id, tracks = playlist.tracks.len(), "Shared playlist imported");
        Ok(playlist)
    }
}

/// `nova_playlist_{millis}`, bumped past any id already taken
fn unique_playlist_id(existing: &[Playlist]) -> String {
    let mut millis = Utc::now().timestamp_millis();
    loop {
        let id = format!("nova_playlist_{}", millis);
        if !existing.iter().any(|p| p.id == id) {
            return id;
        }
        millis += 1;
    }
}
