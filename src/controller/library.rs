//! Likes, local playlists and share links

use crate::model::{
    ActiveSection, ContentView, InputPrompt, PlaylistItem, PromptKind, Track, TrackList,
};
use crate::library::PlaylistUpdate;
use crate::share::{self, ShareTarget};
use super::AppController;

impl AppController {
    // ========================================================================
    // Likes
    // ========================================================================

    pub async fn toggle_liked_track(&self, track: &Track) {
        match self.ctx.library.toggle_like(track) {
            Ok(liked) => {
                tracing::info!(track_id = %track.id, liked, "Track liked status toggled");
                let model = self.model.lock().await;
                model.liked.set(&track.id, liked).await;
                let status = if liked { "Added to" } else { "Removed from" };
                model.set_notice(format!("{} liked songs: {}", status, track.name)).await;
            }
            Err(e) => self.report("like", &e).await,
        }
    }

    pub async fn toggle_like_current(&self) {
        match self.ctx.session.snapshot().await.current {
            Some(track) => self.toggle_liked_track(&track).await,
            None => self.model.lock().await.set_notice("Nothing is playing").await,
        }
    }

    /// Reload the liked-ids cache from storage
    pub async fn refresh_liked_cache(&self) {
        let ids = self.ctx.library.liked_songs().into_iter().map(|t| t.id);
        self.model.lock().await.liked.update(ids).await;
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    /// Reload the sidebar from storage
    pub async fn refresh_playlists(&self) {
        let items: Vec<PlaylistItem> = self
            .ctx
            .library
            .playlists()
            .into_iter()
            .map(|p| PlaylistItem {
                track_count: p.tracks.len(),
                id: p.id,
                name: p.name,
            })
            .collect();
        self.model.lock().await.set_playlists(items).await;
    }

    pub async fn create_playlist(&self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        match self.ctx.library.create_playlist(name, "") {
            Ok(playlist) => {
                self.refresh_playlists().await;
                self.model
                    .lock()
                    .await
                    .set_notice(format!("Created playlist {}", playlist.name))
                    .await;
            }
            Err(e) => self.report("create playlist", &e).await,
        }
    }

    pub async fn rename_playlist(&self, playlist_id: &str, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let update = PlaylistUpdate { name: Some(name.to_string()), ..PlaylistUpdate::default() };
        match self.ctx.library.update_playlist(playlist_id, update) {
            Ok(Some(_)) => {
                self.refresh_playlists().await;
                self.refresh_library_view().await;
            }
            Ok(None) => tracing::warn!(playlist_id, "Renamed playlist no longer exists"),
            Err(e) => self.report("rename playlist", &e).await,
        }
    }

    pub async fn delete_playlist(&self, playlist_id: &str) {
        if let Err(e) = self.ctx.library.delete_playlist(playlist_id) {
            self.report("delete playlist", &e).await;
            return;
        }
        self.refresh_playlists().await;

        let model = self.model.lock().await;
        let showing = model.current_view().await.local_playlist_id() == Some(playlist_id);
        if showing && !model.navigate_back().await {
            model.set_root_view(ContentView::Empty).await;
        }
    }

    /// Confirm the "add to playlist" picker; `None` means no playlist exists yet
    pub async fn add_to_playlist(&self, track: Track, playlist_id: Option<String>) {
        let Some(playlist_id) = playlist_id else {
            self.model
                .lock()
                .await
                .set_notice("Create a playlist first (c)")
                .await;
            return;
        };
        match self.ctx.library.add_track_to_playlist(&playlist_id, &track) {
            Ok(true) => {
                self.refresh_playlists().await;
                self.refresh_library_view().await;
                self.model.lock().await.set_notice(format!("Added {}", track.name)).await;
            }
            Ok(false) => {
                self.model
                    .lock()
                    .await
                    .set_notice("Already in that playlist")
                    .await;
            }
            Err(e) => self.report("add to playlist", &e).await,
        }
    }

    pub async fn remove_from_playlist(&self, playlist_id: &str, track_id: &str) {
        match self.ctx.library.remove_track_from_playlist(playlist_id, track_id) {
            Ok(()) => {
                self.refresh_playlists().await;
                self.refresh_library_view().await;
            }
            Err(e) => self.report("remove from playlist", &e).await,
        }
    }

    pub async fn submit_prompt(&self, prompt: InputPrompt) {
        match prompt.kind {
            PromptKind::NewPlaylist => self.create_playlist(&prompt.value).await,
            PromptKind::RenamePlaylist { id } => self.rename_playlist(&id, &prompt.value).await,
            PromptKind::ImportShare => self.open_share_link(&prompt.value).await,
        }
    }

    // ========================================================================
    // Sharing
    // ========================================================================

    pub async fn share_track(&self, track: &Track) {
        match share::track_link(&self.ctx.config.share_base_url, track) {
            Ok(link) => {
                tracing::info!(track_id = %track.id, "Share link created");
                self.model.lock().await.show_share_link(link).await;
            }
            Err(e) => self.report("share track", &e).await,
        }
    }

    /// Publish a local playlist through the free backend and show its link
    pub async fn share_playlist(&self, playlist_id: &str) {
        let Some(playlist) = self.ctx.library.playlist(playlist_id) else {
            return;
        };
        match self.ctx.ytmusic.create_playlist_share(&playlist).await {
            Ok(share_id) => {
                let link = share::playlist_link(&self.ctx.config.share_base_url, &share_id);
                tracing::info!(playlist_id, share_id = %share_id, "Playlist shared");
                self.model.lock().await.show_share_link(link).await;
            }
            Err(e) => self.report("share playlist", &e.into()).await,
        }
    }

    /// Open a pasted link: a track is shown ready to play, a playlist is imported
    pub async fn open_share_link(&self, link: &str) {
        let target = match share::parse_link(link) {
            Ok(target) => target,
            Err(e) => {
                self.report("share link", &e).await;
                return;
            }
        };

        match target {
            ShareTarget::Track(shared) => {
                let track = shared.into_track();
                tracing::info!(track = %track.name, "Opened shared track");
                let model = self.model.lock().await;
                model
                    .push_view(ContentView::SharedTrack { list: TrackList::new(vec![track]) })
                    .await;
                model.set_active_section(ActiveSection::MainContent).await;
            }
            ShareTarget::Playlist(share_id) => {
                let shared = match self.ctx.ytmusic.shared_playlist(&share_id).await {
                    Ok(shared) => shared,
                    Err(e) => {
                        self.report("shared playlist", &e.into()).await;
                        return;
                    }
                };
                match self
                    .ctx
                    .library
                    .import_playlist(&shared.name, &shared.description, shared.tracks)
                {
                    Ok(playlist) => {
                        self.refresh_playlists().await;
                        self.open_playlist(&playlist.id).await;
                        self.model
                            .lock()
                            .await
                            .set_notice(format!("Imported playlist {}", playlist.name))
                            .await;
                    }
                    Err(e) => self.report("import playlist", &e).await,
                }
            }
        }
    }
}
