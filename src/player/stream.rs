//! Adapter for the free backend: points a media element at `/api/stream/{id}`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::model::{BackendKind, Track, YtMusicClient};
use super::{AdapterEventKind, AdapterEvents, MediaElement, MediaEvent, PlaybackAdapter, PlayerState, emit};

pub struct StreamAdapter {
    client: YtMusicClient,
    element: Arc<dyn MediaElement>,
    state: Arc<Mutex<PlayerState>>,
    events: AdapterEvents,
    listener: JoinHandle<()>,
    /// Bumped by every play and stop; a download that finishes for an older value is discarded
    generation: Arc<AtomicU64>,
}

impl StreamAdapter {
    pub fn new(
        client: YtMusicClient,
        element: Arc<dyn MediaElement>,
        mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
        events: AdapterEvents,
    ) -> Self {
        let state = Arc::new(Mutex::new(PlayerState::default()));

        let listener = {
            let state = state.clone();
            let events = events.clone();
            tokio::spawn(async move {
                while let Some(event) = media_events.recv().await {
                    let translated = {
                        let mut state = state.lock().await;
                        translate(event, &mut state)
                    };
                    for kind in translated {
                        emit(&events, BackendKind::YtMusic, kind);
                    }
                }
                tracing::debug!("Media event listener stopped");
            })
        };

        Self { client, element, state, events, listener, generation: Arc::new(AtomicU64::new(0)) }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn publish_state(&self) {
        let state = *self.state.lock().await;
        emit(&self.events, BackendKind::YtMusic, AdapterEventKind::State(state));
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        self.element.stop();
        self.listener.abort();
    }
}

/// Fold one media event into the adapter state and say what to publish
fn translate(event: MediaEvent, state: &mut PlayerState) -> Vec<AdapterEventKind> {
    match event {
        MediaEvent::Play => {
            state.is_playing = true;
            vec![AdapterEventKind::State(*state)]
        }
        MediaEvent::Pause => {
            state.is_playing = false;
            vec![AdapterEventKind::State(*state)]
        }
        MediaEvent::TimeUpdate(position_ms) => {
            state.position_ms = position_ms;
            vec![AdapterEventKind::State(*state)]
        }
        MediaEvent::LoadedMetadata { duration_ms } => {
            state.duration_ms = duration_ms;
            vec![AdapterEventKind::State(*state)]
        }
        MediaEvent::Ended => {
            state.is_playing = false;
            vec![AdapterEventKind::State(*state), AdapterEventKind::TrackEnded]
        }
    }
}

#[async_trait]
impl PlaybackAdapter for StreamAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::YtMusic
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn play(&self, track: &Track) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let url = self.client.stream_url(track.stream_id());
        tracing::info!(track = %track.name, url = %url, "Loading stream");

        self.element.stop();
        *self.state.lock().await = PlayerState {
            is_playing: false,
            position_ms: 0,
            duration_ms: track.duration_ms,
        };

        let loaded = match self.element.fetch(&url).await {
            Ok(_) if !self.is_current(generation) => {
                tracing::debug!(track = %track.name, "Newer track requested, dropping download");
                return Ok(());
            }
            Ok(data) => self.element.load(data).await,
            Err(e) => Err(e),
        };

        if let Err(e) = loaded {
            if !self.is_current(generation) {
                return Ok(());
            }
            tracing::error!(track = %track.name, error = %e, "Stream playback failed");
            self.state.lock().await.is_playing = false;
            self.publish_state().await;
            return Err(e);
        }

        // Search results occasionally lack a duration; the track endpoint knows it
        if track.duration_ms == 0 {
            let client = self.client.clone();
            let state = self.state.clone();
            let events = self.events.clone();
            let latest = self.generation.clone();
            let video_id = track.stream_id().to_string();
            tokio::spawn(async move {
                let info = match client.track_info(&video_id).await {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::debug!(video_id, error = %e, "No track info for duration");
                        return;
                    }
                };
                let Some(seconds) = info.duration.filter(|s| *s > 0.0) else {
                    return;
                };
                let updated = {
                    let mut state = state.lock().await;
                    if state.duration_ms == 0 && latest.load(Ordering::SeqCst) == generation {
                        state.duration_ms = (seconds * 1000.0) as u32;
                        Some(*state)
                    } else {
                        None
                    }
                };
                if let Some(updated) = updated {
                    emit(&events, BackendKind::YtMusic, AdapterEventKind::State(updated));
                }
            });
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.element.pause();
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.element.play();
        Ok(())
    }

    /// No queue of its own
    async fn next(&self) -> Result<()> {
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        Ok(())
    }

    async fn seek(&self, position_ms: u32) -> Result<()> {
        self.element.seek(position_ms);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.element.stop();
        *self.state.lock().await = PlayerState::default();
        self.publish_state().await;
        Ok(())
    }
}
