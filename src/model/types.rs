//! Core type definitions for the application

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::track::Track;

/// Which section of the UI is currently active/focused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSection {
    Search,
    Library,
    Playlists,
    MainContent,
}

impl ActiveSection {
    pub fn next(self) -> Self {
        match self {
            ActiveSection::Search => ActiveSection::Library,
            ActiveSection::Library => ActiveSection::Playlists,
            ActiveSection::Playlists => ActiveSection::MainContent,
            ActiveSection::MainContent => ActiveSection::Search,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ActiveSection::Search => ActiveSection::MainContent,
            ActiveSection::Library => ActiveSection::Search,
            ActiveSection::Playlists => ActiveSection::Library,
            ActiveSection::MainContent => ActiveSection::Playlists,
        }
    }
}

/// The two interchangeable playback backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Spotify,
    #[serde(rename = "ytmusic")]
    YtMusic,
}

impl BackendKind {
    pub fn label(self) -> &'static str {
        match self {
            BackendKind::Spotify => "Spotify",
            BackendKind::YtMusic => "YouTube Music",
        }
    }

    pub fn other(self) -> Self {
        match self {
            BackendKind::Spotify => BackendKind::YtMusic,
            BackendKind::YtMusic => BackendKind::Spotify,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RepeatState {
    #[default]
    Off,
    All,
    One,
}

impl RepeatState {
    /// Off → All → One → Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatState::Off => RepeatState::All,
            RepeatState::All => RepeatState::One,
            RepeatState::One => RepeatState::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryKind {
    ForYou,
    LikedSongs,
    RecentlyPlayed,
    Stats,
    Queue,
    SpotifyPlaylists,
}

/// An item in the Library section
#[derive(Clone, Debug)]
pub struct LibraryItem {
    pub name: String,
    pub kind: LibraryKind,
}

impl LibraryItem {
    fn new(name: &str, kind: LibraryKind) -> Self {
        Self { name: name.to_string(), kind }
    }

    /// Library entries offered for a backend; remote playlists only exist on Spotify
    pub fn for_backend(backend: BackendKind) -> Vec<Self> {
        let mut items = vec![
            Self::new("For you", LibraryKind::ForYou),
            Self::new("Liked songs", LibraryKind::LikedSongs),
            Self::new("Recently played", LibraryKind::RecentlyPlayed),
            Self::new("Listening stats", LibraryKind::Stats),
            Self::new("Queue", LibraryKind::Queue),
        ];
        if backend == BackendKind::Spotify {
            items.push(Self::new("Spotify playlists", LibraryKind::SpotifyPlaylists));
        }
        items
    }
}

/// A playlist as listed in the sidebar or the Spotify playlists view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistItem {
    pub id: String,
    pub name: String,
    pub track_count: usize,
}

/// Represents a selected item for action handling
#[derive(Clone, Debug)]
pub enum SelectedItem {
    /// A track, with the list it was picked from when that list should become the queue
    Track { track: Track, context: Option<Vec<Track>> },
    QueueEntry { index: usize },
    SpotifyPlaylist { id: String, name: String },
    /// A home-screen mood mix, opened as a search
    Mood { query: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptKind {
    NewPlaylist,
    RenamePlaylist { id: String },
    ImportShare,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::NewPlaylist => " New playlist name ",
            PromptKind::RenamePlaylist { .. } => " Rename playlist ",
            PromptKind::ImportShare => " Paste share link ",
        }
    }
}

/// Single-line text input shown as an overlay
#[derive(Clone, Debug)]
pub struct InputPrompt {
    pub kind: PromptKind,
    pub value: String,
}

/// "Add to playlist" picker
#[derive(Clone, Debug)]
pub struct PlaylistPicker {
    pub track: Track,
    pub selected: usize,
}

pub const SETTINGS_ENTRIES: usize = 3;

/// UI state for the application
#[derive(Clone)]
pub struct UiState {
    pub active_section: ActiveSection,
    pub search_query: String,
    pub library_items: Vec<LibraryItem>,
    pub library_selected: usize,
    pub playlists: Vec<PlaylistItem>,
    pub playlist_selected: usize,
    pub error_message: Option<String>,
    pub error_timestamp: Option<Instant>,
    pub notice: Option<String>,
    pub notice_timestamp: Option<Instant>,
    pub show_help_popup: bool,
    pub show_settings: bool,
    pub settings_selected: usize,
    pub share_link: Option<String>,
    pub prompt: Option<InputPrompt>,
    pub playlist_picker: Option<PlaylistPicker>,
    pub backend: BackendKind,
    pub backend_available: bool,
    pub theme_id: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_section: ActiveSection::Search,
            search_query: String::new(),
            library_items: LibraryItem::for_backend(BackendKind::Spotify),
            library_selected: 0,
            playlists: vec![],
            playlist_selected: 0,
            error_message: None,
            error_timestamp: None,
            notice: None,
            notice_timestamp: None,
            show_help_popup: false,
            show_settings: false,
            settings_selected: 0,
            share_link: None,
            prompt: None,
            playlist_picker: None,
            backend: BackendKind::Spotify,
            backend_available: false,
            theme_id: "red".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_cycles_through_three_states() {
        let mut state = RepeatState::Off;
        let mut seen = vec![];
        for _ in 0..4 {
            state = state.cycle();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![RepeatState::All, RepeatState::One, RepeatState::Off, RepeatState::All]
        );
    }

    #[test]
    fn spotify_playlists_only_listed_for_spotify() {
        let spotify = LibraryItem::for_backend(BackendKind::Spotify);
        let free = LibraryItem::for_backend(BackendKind::YtMusic);
        assert!(spotify.iter().any(|i| i.kind == LibraryKind::SpotifyPlaylists));
        assert!(!free.iter().any(|i| i.kind == LibraryKind::SpotifyPlaylists));
    }

    #[test]
    fn backend_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BackendKind::YtMusic).unwrap(), "\"ytmusic\"");
        assert_eq!(serde_json::to_string(&BackendKind::Spotify).unwrap(), "\"spotify\"");
    }
}
