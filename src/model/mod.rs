//! Model module - Application state and data types
//!
//! This module contains the data structures shared across the application.
//! It is organized into submodules by responsibility:
//!
//! - `track`: Normalized catalog types (tracks, playlists, history entries)
//! - `types`: Core type definitions (enums, UI state, etc.)
//! - `playback`: Playback-related state (track metadata, timing, session status)
//! - `content`: Content view data (home rows, search results, playlists, queue, lyrics)
//! - `cache`: Liked songs cache for fast lookup
//! - `error`: Error types of the two HTTP clients
//! - `spotify_client`: Spotify Web API client
//! - `ytmusic_client`: Client for the self-hosted stream backend
//! - `app_model`: Main application model with state management methods

mod track;
mod types;
mod playback;
mod content;
mod cache;
mod error;
mod spotify_client;
mod ytmusic_client;
mod app_model;

// Re-export all public types for convenient access
pub use track::{Album, Artist, ListeningHistoryEntry, Playlist, Track};
#[cfg(test)]
pub(crate) use track::test_track;

pub use types::{
    ActiveSection, BackendKind, InputPrompt, LibraryKind, PlaylistItem, PlaylistPicker,
    PromptKind, RepeatState, SelectedItem, UiState,
};

pub use playback::{PlaybackInfo, PlaybackTiming, SessionStatus, TrackMetadata};

pub use content::{ContentState, ContentView, HomeRows, HomeSection, TrackList};

pub use error::{BackendError, SpotifyError};

pub use spotify_client::{Device, RemotePlayback, SEARCH_LIMIT, SpotifyClient};

pub use ytmusic_client::{DEFAULT_BACKEND_URL, Lyrics, YtMusicClient};

pub use app_model::AppModel;
