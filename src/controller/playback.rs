//! Playback control methods

use std::future::Future;

use crate::model::{RepeatState, Track};

use super::AppController;

impl AppController {
    /// Run a playback action off the UI loop. Starting a stream downloads the
    /// whole track first, and the screen has to keep drawing `Loading` meanwhile.
    pub(crate) fn spawn_playback<F, Fut>(&self, action: F)
    where
        F: FnOnce(AppController) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(action(self.clone()));
    }

    /// Play `track`; with `context` that list becomes the queue, otherwise a radio queue is built
    pub async fn play_track(&self, track: Track, context: Option<Vec<Track>>) {
        let backend = self.ctx.session.backend().await;
        if track.source() != backend {
            let message = format!(
                "\"{}\" is a {} track. Switch the source in settings (o) to play it.",
                track.name,
                track.source()
            );
            self.model.lock().await.set_error(message).await;
            return;
        }

        // Mixed lists (liked songs, history) only queue what this backend can play
        let context = context.map(|list| {
            list.into_iter()
                .filter(|t| t.source() == backend)
                .collect::<Vec<_>>()
        });

        tracing::info!(track = %track.name, %backend, queued = context.as_ref().map(Vec::len), "Playing track");
        // Failures arrive as a PlaybackFailed notice, which shows the popup
        if let Err(e) = self.ctx.session.select_track(track, context).await {
            tracing::warn!(error = %e, "Track selection failed");
        }
    }

    pub async fn toggle_playback(&self) {
        if let Err(e) = self.ctx.session.toggle_playback().await {
            self.report("toggle playback", &e).await;
        }
    }

    pub async fn next_track(&self) {
        tracing::debug!("Skipping to next track");
        match self.ctx.session.next().await {
            Ok(()) => self.refresh_queue_if_visible().await,
            Err(e) => self.report("next track", &e).await,
        }
    }

    pub async fn previous_track(&self) {
        match self.ctx.session.previous().await {
            Ok(()) => self.refresh_queue_if_visible().await,
            Err(e) => self.report("previous track", &e).await,
        }
    }

    pub async fn jump_to(&self, index: usize) {
        match self.ctx.session.jump_to(index).await {
            Ok(()) => self.refresh_queue_if_visible().await,
            Err(e) => self.report("jump", &e).await,
        }
    }

    pub async fn cycle_repeat(&self) {
        let repeat = self.ctx.session.toggle_loop_mode().await;
        let label = match repeat {
            RepeatState::Off => "Repeat off",
            RepeatState::All => "Repeat queue",
            RepeatState::One => "Repeat track",
        };
        self.model.lock().await.set_notice(label).await;
    }

    pub async fn stop_playback(&self) {
        if let Err(e) = self.ctx.session.stop().await {
            self.report("stop", &e).await;
        }
    }

    pub async fn seek_relative(&self, delta_ms: i64) {
        if let Err(e) = self.ctx.session.seek_relative(delta_ms).await {
            self.report("seek", &e).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::{Mutex, Semaphore};

    use super::*;
    use crate::catalog::MockCatalog;
    use crate::config::AppConfig;
    use crate::controller::SessionContext;
    use crate::library::{ListeningHistory, LocalLibrary, Settings, Store};
    use crate::model::{AppModel, BackendKind, SelectedItem, SessionStatus, YtMusicClient, test_track};
    use crate::player::{AdapterEvents, PlaybackAdapter};
    use crate::session::{AdapterFactory, LiveAdapters, MockHealthProbe, Mounted, SessionCoordinator};

    /// `play` holds until the gate opens, like a stream that is still downloading
    struct GatedAdapter {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl PlaybackAdapter for GatedAdapter {
        fn kind(&self) -> BackendKind {
            BackendKind::YtMusic
        }

        async fn is_ready(&self) -> bool {
            true
        }

        async fn play(&self, _track: &Track) -> Result<()> {
            let _permit = self.gate.acquire().await?;
            Ok(())
        }

        async fn pause(&self) -> Result<()> {
            Ok(())
        }

        async fn resume(&self) -> Result<()> {
            Ok(())
        }

        async fn next(&self) -> Result<()> {
            Ok(())
        }

        async fn previous(&self) -> Result<()> {
            Ok(())
        }

        async fn seek(&self, _position_ms: u32) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    struct SingleMount(Mounted);

    #[async_trait]
    impl AdapterFactory for SingleMount {
        async fn mount(&self, _backend: BackendKind, _events: AdapterEvents) -> Result<Mounted> {
            Ok(self.0.clone())
        }
    }

    async fn controller(gate: Arc<Semaphore>, store: Store) -> AppController {
        let mut catalog = MockCatalog::new();
        catalog.expect_radio().returning(|_| Ok(vec![]));
        let mounted = Mounted { adapter: Arc::new(GatedAdapter { gate }), catalog: Arc::new(catalog) };
        let mut probe = MockHealthProbe::new();
        probe.expect_check().returning(|| true);

        let history = ListeningHistory::new(store.clone());
        let session = SessionCoordinator::start(
            BackendKind::YtMusic,
            Arc::new(SingleMount(mounted)),
            Arc::new(probe),
            history.clone(),
            true,
        )
        .await
        .unwrap();

        let ytmusic = YtMusicClient::new("http://localhost:5001", Duration::from_secs(1)).unwrap();
        let ctx = Arc::new(SessionContext {
            config: AppConfig::default(),
            library: LocalLibrary::new(store.clone()),
            history,
            settings: Settings::new(store.clone()),
            adapters: LiveAdapters::new(ytmusic.clone(), None),
            ytmusic,
            authenticator: None,
            session,
            store,
        });
        let model = Arc::new(Mutex::new(AppModel::new(BackendKind::YtMusic, true, "red")));
        AppController::new(model, ctx)
    }

    async fn wait_for(controller: &AppController, status: SessionStatus) {
        for _ in 0..100 {
            if controller.ctx.session.snapshot().await.info.status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session never reached {:?}", status);
    }

    #[tokio::test]
    async fn selecting_a_track_returns_while_it_loads() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let controller = controller(gate.clone(), Store::open(dir.path()).unwrap()).await;

        let item = SelectedItem::Track { track: test_track("A"), context: None };
        tokio::time::timeout(Duration::from_millis(200), controller.handle_selected_item(item))
            .await
            .expect("selection waited for the download");
        wait_for(&controller, SessionStatus::Loading).await;

        gate.add_permits(1);
        wait_for(&controller, SessionStatus::Playing).await;
    }
}
