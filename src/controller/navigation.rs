//! Navigation-related controller methods (library, playlists, search, home)

use crate::catalog;
use crate::library::ListeningStats;
use crate::model::{
    ActiveSection, BackendKind, ContentView, HomeRows, LibraryKind, SelectedItem, TrackList,
};
use super::AppController;

impl AppController {
    // ========================================================================
    // Search
    // ========================================================================

    /// Search `query` once typing pauses; every keystroke supersedes the previous one
    pub async fn schedule_search(&self, query: String) {
        let seq = self.model.lock().await.next_search_seq();
        let mut pending = self.search_task.lock().await;
        if let Some(task) = pending.take() {
            task.abort();
        }
        if query.trim().is_empty() {
            return;
        }

        let controller = self.clone();
        let delay = self.ctx.config.search_debounce();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.perform_search(&query, seq, false).await;
        }));
    }

    /// Enter in the search box: search right away and move focus to the results
    pub async fn search_now(&self) {
        let (query, seq) = {
            let model = self.model.lock().await;
            (model.search_query().await, model.next_search_seq())
        };
        if let Some(task) = self.search_task.lock().await.take() {
            task.abort();
        }
        if !query.trim().is_empty() {
            self.perform_search(&query, seq, true).await;
        }
    }

    pub async fn perform_search(&self, query: &str, seq: u64, focus_results: bool) {
        tracing::debug!(query, seq, "Performing search");
        self.model.lock().await.set_content_loading(true).await;

        let catalog = self.ctx.session.catalog().await;
        let result = catalog.search(query).await;

        let model = self.model.lock().await;
        if !model.is_current_search(seq) {
            tracing::debug!(query, seq, "Dropping stale search response");
            return;
        }

        match result {
            Ok(tracks) => {
                tracing::info!(query, tracks = tracks.len(), "Search completed successfully");
                model.set_search_results(query.to_string(), tracks).await;
                if focus_results {
                    model.set_active_section(ActiveSection::MainContent).await;
                }
            }
            Err(e) => {
                tracing::error!(query, error = %e, "Search failed");
                model.set_content_loading(false).await;
                model.set_error(Self::format_error(&e)).await;
            }
        }
    }

    // ========================================================================
    // Home
    // ========================================================================

    /// Show the home screen and fill its rows in the background
    pub async fn load_home(&self) {
        {
            let model = self.model.lock().await;
            model
                .set_root_view(ContentView::Home(HomeRows { loading: true, ..HomeRows::default() }))
                .await;
        }

        let controller = self.clone();
        tokio::spawn(async move {
            let active = controller.ctx.session.catalog().await;
            let history = controller.ctx.history.entries();
            let liked = controller.ctx.library.liked_songs();

            let (for_you, trending) = futures::join!(
                catalog::for_you(active.as_ref(), history, liked),
                active.trending(),
            );
            let trending = trending.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Trending row failed");
                vec![]
            });
            tracing::info!(for_you = for_you.len(), trending = trending.len(), "Home rows loaded");

            let model = controller.model.lock().await;
            model
                .update_home(|home| {
                    home.for_you.replace(for_you);
                    home.trending.replace(trending);
                    home.loading = false;
                })
                .await;
        });
    }

    // ========================================================================
    // Library
    // ========================================================================

    pub async fn open_library_item(&self, kind: LibraryKind) {
        match kind {
            LibraryKind::ForYou => self.load_home().await,
            LibraryKind::Queue => {
                self.show_queue().await;
                return;
            }
            LibraryKind::SpotifyPlaylists => {
                self.open_spotify_playlists().await;
                return;
            }
            LibraryKind::LikedSongs | LibraryKind::RecentlyPlayed | LibraryKind::Stats => {
                let view = self.library_view(kind);
                self.model.lock().await.set_root_view(view).await;
            }
        }
        let model = self.model.lock().await;
        model.set_active_section(ActiveSection::MainContent).await;
    }

    /// Build a view straight from the local library
    fn library_view(&self, kind: LibraryKind) -> ContentView {
        match kind {
            LibraryKind::LikedSongs => ContentView::LikedSongs {
                list: TrackList::new(self.ctx.library.liked_songs()),
            },
            LibraryKind::RecentlyPlayed => ContentView::RecentlyPlayed {
                list: TrackList::new(
                    self.ctx.history.entries().iter().map(|e| e.to_track()).collect(),
                ),
            },
            _ => ContentView::Stats(ListeningStats::compute(
                &self.ctx.history.entries(),
                &self.ctx.library.liked_songs(),
            )),
        }
    }

    /// Re-read the visible library view after the library changed
    pub async fn refresh_library_view(&self) {
        let view = self.model.lock().await.current_view().await;
        if !view.is_library_backed() {
            return;
        }

        let library = &self.ctx.library;
        let history = &self.ctx.history;
        let model = self.model.lock().await;
        model
            .update_view(|view| match view {
                ContentView::LikedSongs { list } => list.replace(library.liked_songs()),
                ContentView::RecentlyPlayed { list } => {
                    list.replace(history.entries().iter().map(|e| e.to_track()).collect())
                }
                ContentView::Stats(stats) => {
                    *stats = ListeningStats::compute(&history.entries(), &library.liked_songs());
                }
                ContentView::PlaylistDetail { playlist, list } => {
                    if let Some(fresh) = library.playlist(&playlist.id) {
                        list.replace(fresh.tracks.clone());
                        *playlist = fresh;
                    }
                }
                _ => {}
            })
            .await;
    }

    /// Local playlist from the sidebar
    pub async fn open_playlist(&self, playlist_id: &str) {
        let Some(playlist) = self.ctx.library.playlist(playlist_id) else {
            tracing::warn!(playlist_id, "Playlist disappeared before it could be opened");
            self.refresh_playlists().await;
            return;
        };
        let model = self.model.lock().await;
        model
            .set_root_view(ContentView::PlaylistDetail {
                list: TrackList::new(playlist.tracks.clone()),
                playlist,
            })
            .await;
        model.set_active_section(ActiveSection::MainContent).await;
    }

    pub async fn open_spotify_playlists(&self) {
        let Some(spotify) = self.ctx.adapters.spotify().await else {
            self.model.lock().await.set_error("Log in to Spotify to see your playlists".to_string()).await;
            return;
        };

        self.model.lock().await.set_content_loading(true).await;
        match spotify.user_playlists().await {
            Ok(playlists) => {
                tracing::info!(count = playlists.len(), "Loaded Spotify playlists");
                let model = self.model.lock().await;
                model
                    .set_root_view(ContentView::SpotifyPlaylists { playlists, selected: 0 })
                    .await;
                model.set_active_section(ActiveSection::MainContent).await;
            }
            Err(e) => {
                self.model.lock().await.set_content_loading(false).await;
                self.report("spotify playlists", &e.into()).await;
            }
        }
    }

    async fn open_spotify_playlist(&self, id: String, name: String) {
        let Some(spotify) = self.ctx.adapters.spotify().await else {
            return;
        };

        self.model.lock().await.set_content_loading(true).await;
        match spotify.playlist_tracks(&id).await {
            Ok(tracks) => {
                self.model
                    .lock()
                    .await
                    .push_view(ContentView::RemotePlaylist { id, name, list: TrackList::new(tracks) })
                    .await;
            }
            Err(e) => {
                self.model.lock().await.set_content_loading(false).await;
                self.report("spotify playlist", &e.into()).await;
            }
        }
    }

    // ========================================================================
    // Queue & lyrics
    // ========================================================================

    pub async fn show_queue(&self) {
        let snapshot = self.ctx.session.snapshot().await;
        let (tracks, now_playing) = match snapshot.queue {
            Some(queue) => (queue, snapshot.current.as_ref().map(|_| snapshot.index)),
            None => (snapshot.current.into_iter().collect(), Some(0)),
        };
        let model = self.model.lock().await;
        model
            .push_view(ContentView::Queue { list: TrackList::new(tracks), now_playing })
            .await;
        model.set_active_section(ActiveSection::MainContent).await;
    }

    pub async fn refresh_queue_if_visible(&self) {
        if !self.model.lock().await.is_queue_view_visible().await {
            return;
        }
        let snapshot = self.ctx.session.snapshot().await;
        let (tracks, now_playing) = match snapshot.queue {
            Some(queue) => (queue, snapshot.current.as_ref().map(|_| snapshot.index)),
            None => (snapshot.current.into_iter().collect(), Some(0)),
        };
        self.model.lock().await.update_queue_if_visible(tracks, now_playing).await;
    }

    /// Lyrics for the playing track; only the free backend serves them
    pub async fn show_lyrics(&self) {
        if self.ctx.session.backend().await != BackendKind::YtMusic {
            self.model
                .lock()
                .await
                .set_error("Lyrics are only available with the YouTube Music source".to_string())
                .await;
            return;
        }
        let Some(track) = self.ctx.session.snapshot().await.current else {
            self.model.lock().await.set_notice("Nothing is playing").await;
            return;
        };

        {
            let model = self.model.lock().await;
            model
                .push_view(ContentView::Lyrics {
                    track: track.clone(),
                    lyrics: None,
                    scroll: 0,
                    transcribing: false,
                })
                .await;
            model.set_active_section(ActiveSection::MainContent).await;
        }

        let controller = self.clone();
        tokio::spawn(async move {
            match controller.ctx.ytmusic.lyrics(track.stream_id()).await {
                Ok(lyrics) => {
                    let model = controller.model.lock().await;
                    model.set_lyrics_if_current(&track.id, lyrics).await;
                }
                Err(e) => controller.report("lyrics", &e.into()).await,
            }
        });
    }

    /// Ask the backend to transcribe lyrics the catalog does not have
    pub async fn transcribe_lyrics(&self, track: crate::model::Track) {
        self.model.lock().await.set_transcribing(true).await;
        let controller = self.clone();
        tokio::spawn(async move {
            match controller.ctx.ytmusic.transcribe_lyrics(track.stream_id()).await {
                Ok(lyrics) => {
                    let model = controller.model.lock().await;
                    model.set_lyrics_if_current(&track.id, lyrics).await;
                }
                Err(e) => {
                    controller.model.lock().await.set_transcribing(false).await;
                    controller.report("transcribe", &e.into()).await;
                }
            }
        });
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub async fn handle_selected_item(&self, item: SelectedItem) {
        match item {
            SelectedItem::Track { track, context } => {
                self.spawn_playback(|c| async move { c.play_track(track, context).await });
            }
            SelectedItem::QueueEntry { index } => {
                self.spawn_playback(move |c| async move { c.jump_to(index).await });
            }
            SelectedItem::SpotifyPlaylist { id, name } => self.open_spotify_playlist(id, name).await,
            SelectedItem::Mood { query } => {
                let seq = self.model.lock().await.next_search_seq();
                self.perform_search(&query, seq, true).await;
            }
        }
    }
}
