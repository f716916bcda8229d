//! Adapter for Spotify Connect: remote-controls a device through the Web API

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::{BackendKind, Device, RemotePlayback, SpotifyClient, SpotifyError, Track};
use super::{AdapterEventKind, AdapterEvents, PlaybackAdapter, PlayerState, emit};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// A track counts as finished when it stops within this distance of its end
const END_WINDOW_MS: u32 = 2_500;

/// Active device first, then the one named after this machine, then whatever is there
pub fn choose_device(devices: &[Device], hostname: Option<&str>) -> Option<Device> {
    let usable = || devices.iter().filter(|d| d.id.is_some());

    if let Some(device) = usable().find(|d| d.is_active) {
        return Some(device.clone());
    }
    if let Some(host) = hostname {
        if let Some(device) = usable().find(|d| d.name.eq_ignore_ascii_case(host)) {
            return Some(device.clone());
        }
    }
    usable().next().cloned()
}

pub struct SpotifyAdapter {
    client: SpotifyClient,
    device_id: Arc<RwLock<Option<String>>>,
    hostname: Option<String>,
    poller: JoinHandle<()>,
}

impl SpotifyAdapter {
    /// Create the adapter and start polling the remote player
    pub fn start(client: SpotifyClient, events: AdapterEvents) -> Self {
        let hostname = hostname::get().ok().map(|h| h.to_string_lossy().to_string());
        let device_id = Arc::new(RwLock::new(None));

        let poller = tokio::spawn(poll_loop(
            client.clone(),
            device_id.clone(),
            hostname.clone(),
            events,
        ));

        Self { client, device_id, hostname, poller }
    }

    async fn device(&self) -> Option<String> {
        if let Some(id) = self.device_id.read().await.clone() {
            return Some(id);
        }
        match refresh_device(&self.client, &self.device_id, self.hostname.as_deref()).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list Spotify devices");
                None
            }
        }
    }

    async fn require_device(&self) -> Result<String> {
        self.device()
            .await
            .ok_or_else(|| SpotifyError::NoDevice.into())
    }

    /// A 404 means the remembered device went away; forget it so the next call looks again
    async fn forget_device_on(&self, error: &SpotifyError) {
        if matches!(error, SpotifyError::NoDevice) || error.status() == Some(404) {
            tracing::debug!("Forgetting stale Spotify device");
            *self.device_id.write().await = None;
        }
    }
}

impl Drop for SpotifyAdapter {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

async fn refresh_device(
    client: &SpotifyClient,
    slot: &RwLock<Option<String>>,
    hostname: Option<&str>,
) -> std::result::Result<Option<String>, SpotifyError> {
    let devices = client.devices().await?;
    let chosen = choose_device(&devices, hostname);
    match &chosen {
        Some(device) => tracing::debug!(device_name = %device.name, device_id = ?device.id, "Selected Spotify device"),
        None => tracing::debug!(available_devices = devices.len(), "No Spotify device available"),
    }
    let id = chosen.and_then(|d| d.id);
    *slot.write().await = id.clone();
    Ok(id)
}

/// Turns successive `me/player` snapshots into adapter events
#[derive(Default)]
struct PollTracker {
    last_track: Option<String>,
    last_state: PlayerState,
    ended_reported: bool,
}

impl PollTracker {
    fn observe(&mut self, playback: Option<RemotePlayback>) -> Vec<AdapterEventKind> {
        let Some(playback) = playback else {
            let mut out = vec![];
            if self.last_state.is_playing {
                self.last_state.is_playing = false;
                out.push(AdapterEventKind::State(self.last_state));
            }
            return out;
        };

        let mut out = vec![];
        let track_id = playback.track.as_ref().map(|t| t.id.clone());
        let duration_ms = playback.track.as_ref().map(|t| t.duration_ms).unwrap_or(0);
        let state = PlayerState {
            is_playing: playback.is_playing,
            position_ms: playback.progress_ms,
            duration_ms,
        };

        let was_near_end = self.last_state.is_playing
            && self.last_state.duration_ms > 0
            && self.last_state.duration_ms.saturating_sub(self.last_state.position_ms) <= END_WINDOW_MS;
        let same_track = track_id.is_some() && track_id == self.last_track;
        let stopped_at_start = !state.is_playing && state.position_ms < 1_000;

        if was_near_end && !self.ended_reported && ((same_track && stopped_at_start) || !same_track) {
            self.ended_reported = true;
            out.push(AdapterEventKind::TrackEnded);
        }

        if !same_track {
            if let Some(track) = playback.track {
                if self.last_track.is_some() {
                    out.push(AdapterEventKind::TrackChanged(track));
                }
            }
            self.last_track = track_id;
            self.ended_reported = false;
        }

        out.push(AdapterEventKind::State(state));
        self.last_state = state;
        out
    }
}

async fn poll_loop(
    client: SpotifyClient,
    device_id: Arc<RwLock<Option<String>>>,
    hostname: Option<String>,
    events: AdapterEvents,
) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tracker = PollTracker::default();
    let mut was_ready = false;

    tracing::info!("Starting Spotify playback polling");

    loop {
        interval.tick().await;

        if device_id.read().await.is_none() {
            match refresh_device(&client, &device_id, hostname.as_deref()).await {
                Ok(_) => {}
                Err(SpotifyError::Unauthorized) => {
                    emit(&events, BackendKind::Spotify, AdapterEventKind::AuthExpired);
                    break;
                }
                Err(e) => tracing::debug!(error = %e, "Device lookup failed"),
            }
        }

        let ready = device_id.read().await.is_some();
        if ready && !was_ready {
            emit(&events, BackendKind::Spotify, AdapterEventKind::Ready);
        }
        was_ready = ready;

        match client.current_playback().await {
            Ok(playback) => {
                for kind in tracker.observe(playback) {
                    emit(&events, BackendKind::Spotify, kind);
                }
            }
            Err(SpotifyError::Unauthorized) => {
                tracing::warn!("Spotify token rejected while polling");
                emit(&events, BackendKind::Spotify, AdapterEventKind::AuthExpired);
                break;
            }
            Err(e) => tracing::debug!(error = %e, "Playback poll failed"),
        }
    }

    tracing::debug!("Spotify playback polling stopped");
}

#[async_trait]
impl PlaybackAdapter for SpotifyAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Spotify
    }

    async fn is_ready(&self) -> bool {
        self.device().await.is_some()
    }

    async fn play(&self, track: &Track) -> Result<()> {
        let Some(device) = self.device().await else {
            tracing::info!(track = %track.name, "No Spotify device yet, not playing");
            return Ok(());
        };
        tracing::info!(track = %track.name, uri = %track.uri, "Playing on Spotify");
        if let Err(e) = self.client.play_uris(&device, &[track.uri.clone()]).await {
            self.forget_device_on(&e).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let device = self.require_device().await?;
        if let Err(e) = self.client.pause(&device).await {
            self.forget_device_on(&e).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let device = self.require_device().await?;
        if let Err(e) = self.client.resume(&device).await {
            self.forget_device_on(&e).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn next(&self) -> Result<()> {
        let device = self.require_device().await?;
        self.client.next(&device).await?;
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        let device = self.require_device().await?;
        self.client.previous(&device).await?;
        Ok(())
    }

    async fn seek(&self, position_ms: u32) -> Result<()> {
        let device = self.require_device().await?;
        self.client.seek(&device, position_ms).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.poller.abort();
        if let Some(device) = self.device_id.read().await.clone() {
            // Nothing playing is not an error when stopping
            if let Err(e) = self.client.pause(&device).await {
                tracing::debug!(error = %e, "Pause on stop failed");
            }
        }
        Ok(())
    }
}
