//! Background listeners: session notices, storage changes and token upkeep

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use crate::library::{ChangeOrigin, StorageEvent, HISTORY_KEY, LIKED_SONGS_KEY, PLAYLISTS_KEY, THEME_KEY};
use crate::model::BackendKind;
use crate::session::SessionNotice;
use super::AppController;

/// How often the Spotify token is checked for expiry
const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

impl AppController {
    pub fn start_background_listeners(&self) {
        self.start_session_listener();
        self.start_storage_listener();
        self.start_token_refresh_loop();
    }

    fn start_session_listener(&self) {
        let mut notices = self.ctx.session.subscribe();
        let controller = self.clone();
        tracing::info!("Starting session notice listener");

        tokio::spawn(async move {
            loop {
                match notices.recv().await {
                    Ok(notice) => controller.handle_session_notice(notice).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session notice listener lagged");
                        controller.refresh_queue_if_visible().await;
                    }
                    Err(RecvError::Closed) => break,
                }
                if controller.model.lock().await.should_quit().await {
                    tracing::debug!("Session notice listener shutting down");
                    break;
                }
            }
        });
    }

    pub(crate) async fn handle_session_notice(&self, notice: SessionNotice) {
        match notice {
            SessionNotice::QueueUpdated => self.refresh_queue_if_visible().await,
            SessionNotice::HistoryRecorded(track) => {
                // The history write itself arrives as a storage event
                tracing::debug!(track = %track.name, "Listening history recorded");
            }
            SessionNotice::PlaybackFailed(message) => {
                self.model
                    .lock()
                    .await
                    .set_error(format!("Playback failed: {}", message))
                    .await;
            }
            SessionNotice::AuthExpired => {
                let controller = self.clone();
                tokio::spawn(async move { controller.relogin().await });
            }
        }
    }

    /// Spotify rejected the token: log in again and remount the adapter
    async fn relogin(&self) {
        if self.relogin_running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Re-login already in progress");
            return;
        }

        tracing::warn!("Spotify session expired, logging in again");
        if let Some(auth) = &self.ctx.authenticator {
            if let Err(e) = auth.clear_token() {
                tracing::warn!(error = %e, "Failed to clear stale token");
            }
        }

        match self.login_spotify().await {
            Ok(_) => {
                if self.ctx.session.backend().await == BackendKind::Spotify {
                    if let Err(e) = self.ctx.session.remount().await {
                        self.report("remount spotify", &e).await;
                    }
                }
                self.model.lock().await.set_notice("Logged in to Spotify again").await;
            }
            Err(e) => self.report("spotify login", &e).await,
        }
        self.relogin_running.store(false, Ordering::SeqCst);
    }

    fn start_storage_listener(&self) {
        let mut events = self.ctx.store.subscribe();
        let controller = self.clone();
        tracing::info!("Starting storage change listener");

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.handle_storage_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Storage listener lagged, reloading everything");
                        controller.refresh_playlists().await;
                        controller.refresh_liked_cache().await;
                        controller.refresh_library_view().await;
                    }
                    Err(RecvError::Closed) => break,
                }
                if controller.model.lock().await.should_quit().await {
                    break;
                }
            }
        });
    }

    pub(crate) async fn handle_storage_event(&self, event: StorageEvent) {
        tracing::debug!(key = %event.key, origin = ?event.origin, "Storage changed");
        match event.key.as_str() {
            PLAYLISTS_KEY => {
                self.refresh_playlists().await;
                self.refresh_library_view().await;
            }
            LIKED_SONGS_KEY => {
                self.refresh_liked_cache().await;
                self.refresh_library_view().await;
            }
            HISTORY_KEY => self.refresh_library_view().await,
            THEME_KEY if event.origin == ChangeOrigin::External => {
                let theme = self.ctx.settings.theme();
                self.model.lock().await.set_theme(theme.id).await;
            }
            _ => {}
        }
    }

    /// Refresh the Spotify token ahead of expiry so playback calls never wait on it
    fn start_token_refresh_loop(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TOKEN_CHECK_INTERVAL);
            loop {
                interval.tick().await;
                if controller.model.lock().await.should_quit().await {
                    break;
                }
                let Some(spotify) = controller.ctx.adapters.spotify().await else {
                    continue;
                };
                match spotify.refresh_token_if_needed().await {
                    Ok(true) => controller.share_token_with_backend(&spotify).await,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "Background token refresh failed"),
                }
            }
        });
    }
}
