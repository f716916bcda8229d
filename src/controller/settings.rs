//! Settings overlay actions: switch source, cycle theme, log out

use anyhow::{Result, anyhow};

use crate::model::{BackendKind, SpotifyClient};
use super::AppController;

/// Order of the rows in the settings overlay
pub const SETTING_SOURCE: usize = 0;
pub const SETTING_THEME: usize = 1;
pub const SETTING_LOGOUT: usize = 2;

impl AppController {
    pub async fn activate_setting(&self, index: usize) {
        match index {
            SETTING_SOURCE => {
                // May wait on a browser login; keep the UI loop free
                let controller = self.clone();
                tokio::spawn(async move { controller.switch_source().await });
            }
            SETTING_THEME => self.cycle_theme().await,
            SETTING_LOGOUT => self.logout().await,
            _ => {}
        }
    }

    /// Flip between Spotify and the free backend; the free backend is probed first
    pub async fn switch_source(&self) {
        let session = &self.ctx.session;
        let target = session.backend().await.other();

        let healthy = session.probe_backend_health().await;
        self.model.lock().await.set_backend_available(healthy).await;

        if target == BackendKind::Spotify && self.ctx.adapters.spotify().await.is_none() {
            if let Err(e) = self.login_spotify().await {
                self.report("spotify login", &e).await;
                return;
            }
        }

        match session.switch_backend(target).await {
            Ok(true) => {
                if let Err(e) = self.ctx.settings.set_preferred_source(target) {
                    tracing::warn!(error = %e, "Could not remember the music source");
                }
                {
                    let model = self.model.lock().await;
                    model.set_backend(target, healthy).await;
                    model.close_settings().await;
                    model.set_notice(format!("Source: {}", target)).await;
                }
                self.load_home().await;
            }
            Ok(false) => {
                let message = format!(
                    "YouTube Music backend is not reachable at {}",
                    self.ctx.config.backend_url
                );
                self.model.lock().await.set_error(message).await;
            }
            Err(e) => self.report("switch source", &e).await,
        }
    }

    pub async fn cycle_theme(&self) {
        match self.ctx.settings.cycle_theme() {
            Ok(theme) => {
                tracing::info!(theme = theme.id, "Theme changed");
                self.model.lock().await.set_theme(theme.id).await;
            }
            Err(e) => self.report("theme", &e).await,
        }
    }

    /// Run the browser login and hand the new client to the adapter factory
    pub(crate) async fn login_spotify(&self) -> Result<SpotifyClient> {
        let auth = self
            .ctx
            .authenticator
            .clone()
            .ok_or_else(|| anyhow!("No Spotify client id configured (NOVA_SPOTIFY_CLIENT_ID)"))?;

        self.model
            .lock()
            .await
            .set_notice("Complete the Spotify login in your browser")
            .await;
        let token = auth.login().await?;
        let client = SpotifyClient::new(token, Some(auth))?;
        self.ctx.adapters.set_spotify(Some(client.clone())).await;
        self.share_token_with_backend(&client).await;
        Ok(client)
    }

    /// The free backend can use the Spotify token for its own lookups
    pub(crate) async fn share_token_with_backend(&self, client: &SpotifyClient) {
        if !self.ctx.session.backend_healthy().await {
            return;
        }
        if let Err(e) = self.ctx.ytmusic.set_token(&client.access_token().await).await {
            tracing::debug!(error = %e, "Backend did not accept the Spotify token");
        }
    }

    /// Forget the Spotify login; stay on the free backend when it is up, otherwise quit
    pub async fn logout(&self) {
        if let Some(auth) = &self.ctx.authenticator {
            if let Err(e) = auth.clear_token() {
                tracing::warn!(error = %e, "Failed to clear stored token");
            }
        }
        if let Err(e) = self.ctx.session.stop().await {
            tracing::warn!(error = %e, "Failed to stop playback on logout");
        }
        self.ctx.adapters.set_spotify(None).await;
        tracing::info!("Logged out of Spotify");

        let session = &self.ctx.session;
        if session.backend().await == BackendKind::YtMusic {
            let model = self.model.lock().await;
            model.close_settings().await;
            model.set_notice("Logged out of Spotify").await;
            return;
        }

        let healthy = session.probe_backend_health().await;
        match session.switch_backend(BackendKind::YtMusic).await {
            Ok(true) => {
                if let Err(e) = self.ctx.settings.set_preferred_source(BackendKind::YtMusic) {
                    tracing::warn!(error = %e, "Could not remember the music source");
                }
                {
                    let model = self.model.lock().await;
                    model.set_backend(BackendKind::YtMusic, healthy).await;
                    model.close_settings().await;
                    model.set_notice("Logged out. Playing from YouTube Music").await;
                }
                self.load_home().await;
            }
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(error = %e, "Could not mount the free backend");
                }
                tracing::info!("No source left after logout, quitting");
                self.model.lock().await.set_should_quit(true).await;
            }
        }
    }
}
