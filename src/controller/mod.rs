//! Controller module - Application logic and event handling
//!
//! This module contains the application controller that handles user input,
//! coordinates between the model and the session, and keeps the view in sync.
//! It is organized into submodules by responsibility:
//!
//! - `input`: Key event handling
//! - `playback`: Playback control methods
//! - `navigation`: Library/playlist/search navigation
//! - `library`: Likes, local playlists and share links
//! - `settings`: Source switching, themes and logout
//! - `events`: Session notices, storage changes and token upkeep

mod input;
mod playback;
mod navigation;
mod library;
mod settings;
mod events;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::library::{ListeningHistory, LocalLibrary, Settings, Store};
use crate::model::{AppModel, BackendError, SpotifyError};
use crate::session::{LiveAdapters, SessionCoordinator};

/// Services built once at startup and shared by every controller clone
pub struct SessionContext {
    pub config: AppConfig,
    pub store: Store,
    pub library: LocalLibrary,
    pub history: ListeningHistory,
    pub settings: Settings,
    pub ytmusic: crate::model::YtMusicClient,
    pub adapters: LiveAdapters,
    /// Absent when no Spotify client id is configured
    pub authenticator: Option<Authenticator>,
    pub session: SessionCoordinator,
}

#[derive(Clone)]
pub struct AppController {
    pub(crate) model: Arc<Mutex<AppModel>>,
    pub(crate) ctx: Arc<SessionContext>,
    search_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    relogin_running: Arc<AtomicBool>,
}

impl AppController {
    pub fn new(model: Arc<Mutex<AppModel>>, ctx: Arc<SessionContext>) -> Self {
        Self {
            model,
            ctx,
            search_task: Arc::new(Mutex::new(None)),
            relogin_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Show an error popup for a failed user action
    pub(crate) async fn report(&self, context: &str, error: &anyhow::Error) {
        tracing::error!(context, error = %error, "Action failed");
        let model = self.model.lock().await;
        model.set_error(Self::format_error(error)).await;
    }

    pub(crate) fn format_error(error: &anyhow::Error) -> String {
        if let Some(e) = error.downcast_ref::<SpotifyError>() {
            return match e {
                SpotifyError::NoDevice => {
                    "No Spotify device found. Open Spotify on any device and try again.".to_string()
                }
                SpotifyError::Unauthorized => {
                    "Spotify session expired. Logging in again...".to_string()
                }
                SpotifyError::Api { status: 403, .. } => {
                    "Action forbidden. Check your Spotify Premium status.".to_string()
                }
                SpotifyError::Api { status: 429, .. } => {
                    "Rate limited. Please wait a moment.".to_string()
                }
                SpotifyError::Request(_) => "Could not reach Spotify. Check your connection.".to_string(),
                other => format!("Spotify: {}", other),
            };
        }

        if let Some(e) = error.downcast_ref::<BackendError>() {
            return match e {
                BackendError::Request(_) | BackendError::Unreachable(_) => {
                    "YouTube Music backend is not reachable. Is it running?".to_string()
                }
                other => format!("Backend: {}", other),
            };
        }

        format!("Error: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotify_errors_get_friendly_messages() {
        let err = anyhow::Error::new(SpotifyError::NoDevice);
        assert!(AppController::format_error(&err).contains("No Spotify device"));

        let err = anyhow::Error::new(SpotifyError::Api { status: 429, message: "slow down".into() });
        assert!(AppController::format_error(&err).contains("Rate limited"));
    }

    #[test]
    fn context_does_not_hide_the_cause() {
        let err = anyhow::Error::new(SpotifyError::Unauthorized).context("while pausing");
        assert!(AppController::format_error(&err).contains("expired"));
    }

    #[test]
    fn plain_errors_are_prefixed() {
        let err = anyhow::anyhow!("Not logged in to Spotify");
        assert_eq!(AppController::format_error(&err), "Error: Not logged in to Spotify");
    }
}
