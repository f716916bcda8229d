//! Main application model with UI state management
//!
//! Playback state lives in the session coordinator; this model only holds
//! what the screen needs between frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::Mutex;

use super::cache::LikedSongsCache;
use super::content::{ContentState, ContentView, HomeRows, TrackList};
use super::track::Track;
use super::types::{
    ActiveSection, BackendKind, InputPrompt, LibraryItem, PlaylistItem, PlaylistPicker,
    PromptKind, SETTINGS_ENTRIES, SelectedItem, UiState,
};
use super::ytmusic_client::Lyrics;

const MESSAGE_TTL_SECS: u64 = 5;

/// Main application model containing all UI state
pub struct AppModel {
    pub ui_state: Arc<Mutex<UiState>>,
    pub content_state: Arc<Mutex<ContentState>>,
    pub should_quit: Arc<Mutex<bool>>,
    pub liked: LikedSongsCache,
    search_seq: Arc<AtomicU64>,
}

impl AppModel {
    pub fn new(backend: BackendKind, backend_available: bool, theme_id: &str) -> Self {
        let ui = UiState {
            library_items: LibraryItem::for_backend(backend),
            backend,
            backend_available,
            theme_id: theme_id.to_string(),
            ..UiState::default()
        };
        Self {
            ui_state: Arc::new(Mutex::new(ui)),
            content_state: Arc::new(Mutex::new(ContentState::default())),
            should_quit: Arc::new(Mutex::new(false)),
            liked: LikedSongsCache::new(),
            search_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn should_quit(&self) -> bool {
        *self.should_quit.lock().await
    }

    pub async fn set_should_quit(&self, quit: bool) {
        *self.should_quit.lock().await = quit;
    }

    pub async fn get_ui_state(&self) -> UiState {
        self.ui_state.lock().await.clone()
    }

    // ========================================================================
    // Sections & sidebar
    // ========================================================================

    pub async fn cycle_section_forward(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.next();
    }

    pub async fn cycle_section_backward(&self) {
        let mut state = self.ui_state.lock().await;
        state.active_section = state.active_section.prev();
    }

    pub async fn set_active_section(&self, section: ActiveSection) {
        let mut state = self.ui_state.lock().await;
        state.active_section = section;
    }

    pub async fn move_selection_up(&self) {
        let mut state = self.ui_state.lock().await;
        match state.active_section {
            ActiveSection::Library => {
                state.library_selected = state.library_selected.saturating_sub(1);
            }
            ActiveSection::Playlists => {
                state.playlist_selected = state.playlist_selected.saturating_sub(1);
            }
            _ => {}
        }
    }

    pub async fn move_selection_down(&self) {
        let mut state = self.ui_state.lock().await;
        match state.active_section {
            ActiveSection::Library => {
                if state.library_selected < state.library_items.len().saturating_sub(1) {
                    state.library_selected += 1;
                }
            }
            ActiveSection::Playlists => {
                if state.playlist_selected < state.playlists.len().saturating_sub(1) {
                    state.playlist_selected += 1;
                }
            }
            _ => {}
        }
    }

    pub async fn selected_library_item(&self) -> Option<LibraryItem> {
        let state = self.ui_state.lock().await;
        state.library_items.get(state.library_selected).cloned()
    }

    /// Replace the sidebar playlists, keeping the cursor where it was when possible
    pub async fn set_playlists(&self, playlists: Vec<PlaylistItem>) {
        let mut state = self.ui_state.lock().await;
        state.playlist_selected = state.playlist_selected.min(playlists.len().saturating_sub(1));
        state.playlists = playlists;
    }

    pub async fn get_selected_playlist(&self) -> Option<PlaylistItem> {
        let state = self.ui_state.lock().await;
        state.playlists.get(state.playlist_selected).cloned()
    }

    pub async fn set_backend(&self, backend: BackendKind, available: bool) {
        let mut state = self.ui_state.lock().await;
        state.backend = backend;
        state.backend_available = available;
        state.library_items = LibraryItem::for_backend(backend);
        state.library_selected = state.library_selected.min(state.library_items.len() - 1);
    }

    pub async fn set_backend_available(&self, available: bool) {
        self.ui_state.lock().await.backend_available = available;
    }

    pub async fn set_theme(&self, theme_id: &str) {
        self.ui_state.lock().await.theme_id = theme_id.to_string();
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub async fn append_to_search(&self, c: char) -> String {
        let mut state = self.ui_state.lock().await;
        state.search_query.push(c);
        state.search_query.clone()
    }

    pub async fn backspace_search(&self) -> String {
        let mut state = self.ui_state.lock().await;
        state.search_query.pop();
        state.search_query.clone()
    }

    pub async fn search_query(&self) -> String {
        self.ui_state.lock().await.search_query.clone()
    }

    /// Start a new search generation; responses carrying an older token are dropped
    pub fn next_search_seq(&self) -> u64 {
        self.search_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current_search(&self, seq: u64) -> bool {
        self.search_seq.load(Ordering::SeqCst) == seq
    }

    // ========================================================================
    // Messages & overlays
    // ========================================================================

    pub async fn set_error(&self, message: String) {
        let mut state = self.ui_state.lock().await;
        state.error_message = Some(message);
        state.error_timestamp = Some(Instant::now());
    }

    pub async fn clear_error(&self) {
        let mut state = self.ui_state.lock().await;
        state.error_message = None;
        state.error_timestamp = None;
    }

    pub async fn has_error(&self) -> bool {
        self.ui_state.lock().await.error_message.is_some()
    }

    pub async fn set_notice(&self, message: impl Into<String>) {
        let mut state = self.ui_state.lock().await;
        state.notice = Some(message.into());
        state.notice_timestamp = Some(Instant::now());
    }

    pub async fn auto_clear_old_messages(&self) {
        let mut state = self.ui_state.lock().await;
        if state.error_timestamp.is_some_and(|t| t.elapsed().as_secs() > MESSAGE_TTL_SECS) {
            state.error_message = None;
            state.error_timestamp = None;
        }
        if state.notice_timestamp.is_some_and(|t| t.elapsed().as_secs() > MESSAGE_TTL_SECS) {
            state.notice = None;
            state.notice_timestamp = None;
        }
    }

    pub async fn show_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = true;
    }

    pub async fn hide_help_popup(&self) {
        self.ui_state.lock().await.show_help_popup = false;
    }

    pub async fn is_help_popup_open(&self) -> bool {
        self.ui_state.lock().await.show_help_popup
    }

    pub async fn open_settings(&self) {
        let mut state = self.ui_state.lock().await;
        state.show_settings = true;
        state.settings_selected = 0;
    }

    pub async fn close_settings(&self) {
        self.ui_state.lock().await.show_settings = false;
    }

    pub async fn is_settings_open(&self) -> bool {
        self.ui_state.lock().await.show_settings
    }

    pub async fn settings_move(&self, down: bool) {
        let mut state = self.ui_state.lock().await;
        state.settings_selected = if down {
            (state.settings_selected + 1).min(SETTINGS_ENTRIES - 1)
        } else {
            state.settings_selected.saturating_sub(1)
        };
    }

    pub async fn selected_setting(&self) -> usize {
        self.ui_state.lock().await.settings_selected
    }

    pub async fn show_share_link(&self, link: String) {
        self.ui_state.lock().await.share_link = Some(link);
    }

    pub async fn hide_share_link(&self) {
        self.ui_state.lock().await.share_link = None;
    }

    pub async fn is_share_open(&self) -> bool {
        self.ui_state.lock().await.share_link.is_some()
    }

    pub async fn open_prompt(&self, kind: PromptKind, initial: &str) {
        self.ui_state.lock().await.prompt = Some(InputPrompt {
            kind,
            value: initial.to_string(),
        });
    }

    pub async fn is_prompt_open(&self) -> bool {
        self.ui_state.lock().await.prompt.is_some()
    }

    pub async fn prompt_push(&self, c: char) {
        if let Some(prompt) = self.ui_state.lock().await.prompt.as_mut() {
            prompt.value.push(c);
        }
    }

    pub async fn prompt_pop(&self) {
        if let Some(prompt) = self.ui_state.lock().await.prompt.as_mut() {
            prompt.value.pop();
        }
    }

    /// Close the prompt and hand back what was typed
    pub async fn take_prompt(&self) -> Option<InputPrompt> {
        self.ui_state.lock().await.prompt.take()
    }

    pub async fn open_picker(&self, track: Track) {
        self.ui_state.lock().await.playlist_picker = Some(PlaylistPicker { track, selected: 0 });
    }

    pub async fn is_picker_open(&self) -> bool {
        self.ui_state.lock().await.playlist_picker.is_some()
    }

    pub async fn picker_move(&self, down: bool) {
        let mut state = self.ui_state.lock().await;
        let count = state.playlists.len();
        if let Some(picker) = state.playlist_picker.as_mut() {
            picker.selected = if down {
                (picker.selected + 1).min(count.saturating_sub(1))
            } else {
                picker.selected.saturating_sub(1)
            };
        }
    }

    /// Close the picker, returning the track and the chosen playlist id
    pub async fn take_picker(&self) -> Option<(Track, Option<String>)> {
        let mut state = self.ui_state.lock().await;
        let picker = state.playlist_picker.take()?;
        let target = state.playlists.get(picker.selected).map(|p| p.id.clone());
        Some((picker.track, target))
    }

    pub async fn close_picker(&self) {
        self.ui_state.lock().await.playlist_picker = None;
    }

    // ========================================================================
    // Main content
    // ========================================================================

    pub async fn get_content_state(&self) -> ContentState {
        self.content_state.lock().await.clone()
    }

    pub async fn set_content_loading(&self, loading: bool) {
        self.content_state.lock().await.is_loading = loading;
    }

    /// Show a drill-down view; Esc/Backspace returns to the previous one
    pub async fn push_view(&self, view: ContentView) {
        let mut state = self.content_state.lock().await;
        if !matches!(state.view, ContentView::Empty) {
            let previous_view = std::mem::take(&mut state.view);
            state.navigation_stack.push(previous_view);
        }
        state.view = view;
        state.is_loading = false;
    }

    /// Show a top-level view, dropping the navigation history
    pub async fn set_root_view(&self, view: ContentView) {
        let mut state = self.content_state.lock().await;
        state.navigation_stack.clear();
        state.view = view;
        state.is_loading = false;
    }

    pub async fn set_search_results(&self, query: String, tracks: Vec<Track>) {
        self.set_root_view(ContentView::SearchResults {
            query,
            list: TrackList::new(tracks),
        })
        .await;
    }

    /// Fill the home rows, wherever the home view currently sits in the stack
    pub async fn update_home(&self, update: impl FnOnce(&mut HomeRows)) {
        let mut state = self.content_state.lock().await;
        if let ContentView::Home(home) = &mut state.view {
            update(home);
        }
    }

    pub async fn navigate_back(&self) -> bool {
        let mut state = self.content_state.lock().await;
        if let Some(previous_view) = state.navigation_stack.pop() {
            state.view = previous_view;
            true
        } else {
            false
        }
    }

    pub async fn content_move_up(&self) {
        self.content_state.lock().await.view.move_up();
    }

    pub async fn content_move_down(&self, mood_count: usize) {
        self.content_state.lock().await.view.move_down(mood_count);
    }

    pub async fn cycle_content_section(&self, forward: bool) {
        self.content_state.lock().await.view.cycle_section(forward);
    }

    pub async fn get_selected_content_item(&self, moods: &[&str]) -> Option<SelectedItem> {
        self.content_state.lock().await.view.selected_item(moods)
    }

    pub async fn get_selected_track(&self) -> Option<Track> {
        self.content_state.lock().await.view.selected_track().cloned()
    }

    pub async fn is_queue_view_visible(&self) -> bool {
        matches!(self.content_state.lock().await.view, ContentView::Queue { .. })
    }

    pub async fn update_queue_if_visible(&self, tracks: Vec<Track>, now_playing: Option<usize>) {
        let mut state = self.content_state.lock().await;
        if let ContentView::Queue { list, now_playing: marker } = &mut state.view {
            list.replace(tracks);
            *marker = now_playing;
        }
    }

    /// Store fetched lyrics if the lyrics view still shows that track
    pub async fn set_lyrics_if_current(&self, track_id: &str, fetched: Lyrics) {
        let mut state = self.content_state.lock().await;
        if let ContentView::Lyrics { track, lyrics, transcribing, .. } = &mut state.view {
            if track.id == track_id {
                *lyrics = Some(fetched);
                *transcribing = false;
            }
        }
    }

    pub async fn set_transcribing(&self, value: bool) {
        let mut state = self.content_state.lock().await;
        if let ContentView::Lyrics { transcribing, .. } = &mut state.view {
            *transcribing = value;
        }
    }

    /// The view currently on screen, for re-reading library-backed content
    pub async fn current_view(&self) -> ContentView {
        self.content_state.lock().await.view.clone()
    }

    /// Apply `update` to the visible view only
    pub async fn update_view(&self, update: impl FnOnce(&mut ContentView)) {
        update(&mut self.content_state.lock().await.view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_track;

    #[tokio::test]
    async fn search_seq_marks_older_searches_stale() {
        let model = AppModel::new(BackendKind::YtMusic, true, "red");
        let first = model.next_search_seq();
        let second = model.next_search_seq();
        assert!(!model.is_current_search(first));
        assert!(model.is_current_search(second));
    }

    #[tokio::test]
    async fn back_walks_the_navigation_stack() {
        let model = AppModel::new(BackendKind::YtMusic, true, "red");
        model.set_root_view(ContentView::Home(HomeRows::default())).await;
        model
            .push_view(ContentView::LikedSongs { list: TrackList::new(vec![test_track("a")]) })
            .await;

        assert!(model.navigate_back().await);
        assert!(matches!(model.current_view().await, ContentView::Home(_)));
        assert!(!model.navigate_back().await);
    }

    #[tokio::test]
    async fn switching_backend_hides_spotify_playlists() {
        let model = AppModel::new(BackendKind::Spotify, false, "red");
        {
            let mut ui = model.ui_state.lock().await;
            ui.library_selected = ui.library_items.len() - 1;
        }
        model.set_backend(BackendKind::YtMusic, true).await;
        let ui = model.get_ui_state().await;
        assert_eq!(ui.library_selected, ui.library_items.len() - 1);
        assert!(ui.backend_available);
    }

    #[tokio::test]
    async fn picker_returns_chosen_playlist() {
        let model = AppModel::new(BackendKind::YtMusic, true, "red");
        model
            .set_playlists(vec![
                PlaylistItem { id: "p1".into(), name: "One".into(), track_count: 0 },
                PlaylistItem { id: "p2".into(), name: "Two".into(), track_count: 3 },
            ])
            .await;
        model.open_picker(test_track("a")).await;
        model.picker_move(true).await;
        model.picker_move(true).await;

        let (track, target) = model.take_picker().await.unwrap();
        assert_eq!(track.id, "a");
        assert_eq!(target.as_deref(), Some("p2"));
        assert!(!model.is_picker_open().await);
    }

    #[tokio::test]
    async fn stale_lyrics_are_dropped() {
        let model = AppModel::new(BackendKind::YtMusic, true, "red");
        model
            .set_root_view(ContentView::Lyrics {
                track: test_track("now"),
                lyrics: None,
                scroll: 0,
                transcribing: false,
            })
            .await;
        let text = Lyrics { lyrics: Some("la la".into()), source: None };
        model.set_lyrics_if_current("before", text.clone()).await;
        let ContentView::Lyrics { lyrics, .. } = model.current_view().await else {
            panic!("lyrics view expected");
        };
        assert!(lyrics.is_none());

        model.set_lyrics_if_current("now", text).await;
        let ContentView::Lyrics { lyrics, .. } = model.current_view().await else {
            panic!("lyrics view expected");
        };
        assert_eq!(lyrics.and_then(|l| l.lyrics).as_deref(), Some("la la"));
    }
}
