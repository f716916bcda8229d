//! Session module - playback session coordinator
//!
//! Owns what is playing and what comes next, routes commands to whichever
//! adapter is mounted and listens to the events every adapter publishes.
//!
//! - `live`: the production adapter factory (Spotify Connect or local streaming)

mod live;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::catalog::Catalog;
use crate::library::{DwellTracker, ListeningHistory};
use crate::model::{
    BackendKind, PlaybackInfo, PlaybackTiming, RepeatState, SessionStatus, Track, TrackMetadata, YtMusicClient,
};
use crate::player::{AdapterEvent, AdapterEventKind, AdapterEvents, PlaybackAdapter};

pub use live::LiveAdapters;

/// Prefetch more recommendations when fewer tracks than this remain ahead
const PREFETCH_THRESHOLD: usize = 3;
const TICK: Duration = Duration::from_secs(1);
/// How long a remote player may keep reporting other tracks before it picks up one we asked for
const REMOTE_CONFIRM_WINDOW: Duration = Duration::from_secs(5);

// ============================================================================
// Seams
// ============================================================================

/// An adapter plus the catalog of the same backend
#[derive(Clone)]
pub struct Mounted {
    pub adapter: Arc<dyn PlaybackAdapter>,
    pub catalog: Arc<dyn Catalog>,
}

#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn mount(&self, backend: BackendKind, events: AdapterEvents) -> Result<Mounted>;
}

/// Reachability of the free backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> bool;
}

#[async_trait]
impl HealthProbe for YtMusicClient {
    async fn check(&self) -> bool {
        self.check_health().await
    }
}

/// Things the UI should hear about that it did not ask for
#[derive(Clone, Debug, PartialEq)]
pub enum SessionNotice {
    QueueUpdated,
    HistoryRecorded(Track),
    PlaybackFailed(String),
    AuthExpired,
}

/// Everything the view needs from the session, copied out
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub info: PlaybackInfo,
    pub current: Option<Track>,
    pub queue: Option<Vec<Track>>,
    pub index: usize,
}

// ============================================================================
// State
// ============================================================================

struct SessionState {
    backend: BackendKind,
    status: SessionStatus,
    current: Option<Track>,
    playlist: Option<Vec<Track>>,
    index: usize,
    repeat: RepeatState,
    timing: PlaybackTiming,
    /// Bumped whenever the queue contents are replaced or extended
    queue_generation: u64,
    /// Bumped on every track selection; stale completions compare against it
    selection: u64,
    /// Selection waiting for the adapter to become ready
    pending: Option<(Track, u64)>,
    /// Track we last asked the adapter to play, until the remote player reports it
    requested: Option<(String, Instant)>,
    /// Played to the end with nothing after it
    at_end: bool,
    backend_healthy: bool,
    dwell: DwellTracker,
}

impl SessionState {
    fn new(backend: BackendKind, backend_healthy: bool) -> Self {
        Self {
            backend,
            status: SessionStatus::Idle,
            current: None,
            playlist: None,
            index: 0,
            repeat: RepeatState::Off,
            timing: PlaybackTiming::default(),
            queue_generation: 0,
            selection: 0,
            pending: None,
            requested: None,
            at_end: false,
            backend_healthy,
            dwell: DwellTracker::default(),
        }
    }

    fn begin_track(&mut self, track: &Track) -> u64 {
        self.selection += 1;
        self.current = Some(track.clone());
        self.status = SessionStatus::Loading;
        self.timing.reset(track.duration_ms);
        self.pending = None;
        self.requested = Some((track.id.clone(), Instant::now()));
        self.at_end = false;
        self.dwell.track_changed(Some(track), Instant::now());
        self.selection
    }

    fn clear(&mut self) {
        self.selection += 1;
        self.queue_generation += 1;
        self.current = None;
        self.playlist = None;
        self.index = 0;
        self.status = SessionStatus::Idle;
        self.pending = None;
        self.requested = None;
        self.at_end = false;
        self.timing.reset(0);
        self.dwell.track_changed(None, Instant::now());
    }

    fn remaining_ahead(&self) -> usize {
        self.playlist
            .as_ref()
            .map(|p| p.len().saturating_sub(self.index + 1))
            .unwrap_or(0)
    }
}

/// Append tracks whose ids are not queued yet; returns how many were added
fn extend_unique(queue: &mut Vec<Track>, tracks: Vec<Track>) -> usize {
    let before = queue.len();
    for track in tracks {
        if !queue.iter().any(|t| t.id == track.id) {
            queue.push(track);
        }
    }
    queue.len() - before
}

// ============================================================================
// Coordinator
// ============================================================================

struct Inner {
    state: Mutex<SessionState>,
    mounted: RwLock<Mounted>,
    factory: Arc<dyn AdapterFactory>,
    probe: Arc<dyn HealthProbe>,
    history: ListeningHistory,
    events: AdapterEvents,
    notices: broadcast::Sender<SessionNotice>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    /// Mount the adapter for `backend` and start listening to adapter events
    pub async fn start(
        backend: BackendKind,
        factory: Arc<dyn AdapterFactory>,
        probe: Arc<dyn HealthProbe>,
        history: ListeningHistory,
        backend_healthy: bool,
    ) -> Result<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let mounted = factory.mount(backend, events.clone()).await?;
        let (notices, _) = broadcast::channel(32);

        let coordinator = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::new(backend, backend_healthy)),
                mounted: RwLock::new(mounted),
                factory,
                probe,
                history,
                events,
                notices,
                background: Mutex::new(Vec::new()),
            }),
        };
        coordinator.spawn_event_loop(rx);

        tracing::info!(%backend, "Playback session started");
        Ok(coordinator)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.inner.notices.subscribe()
    }

    fn notify(&self, notice: SessionNotice) {
        let _ = self.inner.notices.send(notice);
    }

    pub async fn backend(&self) -> BackendKind {
        self.inner.state.lock().await.backend
    }

    pub async fn catalog(&self) -> Arc<dyn Catalog> {
        self.inner.mounted.read().await.catalog.clone()
    }

    async fn adapter(&self) -> Arc<dyn PlaybackAdapter> {
        self.inner.mounted.read().await.adapter.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock().await;
        let duration_ms = match state.timing.duration_ms {
            0 => state.current.as_ref().map(|t| t.duration_ms).unwrap_or(0),
            d => d,
        };
        SessionSnapshot {
            info: PlaybackInfo {
                track: state.current.as_ref().map(TrackMetadata::from),
                status: state.status,
                progress_ms: state.timing.current_position_ms(),
                duration_ms,
                is_playing: state.status == SessionStatus::Playing,
                repeat: state.repeat,
                backend: state.backend,
                queue_position: state.playlist.as_ref().map(|p| (state.index + 1, p.len())),
            },
            current: state.current.clone(),
            queue: state.playlist.clone(),
            index: state.index,
        }
    }

    async fn spawn_background<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut background = self.inner.background.lock().await;
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Wait for radio fetches, prefetches and deferred plays to finish
    #[cfg(test)]
    pub(crate) async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = self.inner.background.lock().await.drain(..).collect();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }

    // ========================================================================
    // Track selection and queue
    // ========================================================================

    /// Make `track` current and play it. With `playlist` the queue becomes
    /// that list; without one (or with an empty one) a radio queue seeded by
    /// the track is fetched.
    pub async fn select_track(&self, track: Track, playlist: Option<Vec<Track>>) -> Result<()> {
        let playlist = playlist.filter(|list| !list.is_empty());
        let derive_radio = playlist.is_none();
        let seq = {
            let mut state = self.inner.state.lock().await;
            match playlist {
                Some(list) => {
                    state.index = list.iter().position(|t| t.id == track.id).unwrap_or(0);
                    state.playlist = Some(list);
                    state.queue_generation += 1;
                }
                None => {
                    let head_matches = state
                        .playlist
                        .as_ref()
                        .and_then(|p| p.first())
                        .is_some_and(|head| head.id == track.id);
                    if !head_matches {
                        state.playlist = None;
                        state.queue_generation += 1;
                    }
                    state.index = 0;
                }
            }
            state.begin_track(&track)
        };

        tracing::info!(track = %track.name, artist = %track.primary_artist(), "Track selected");

        if derive_radio {
            self.spawn_radio(track.clone()).await;
        }
        self.start_playback(track, seq).await
    }

    async fn spawn_radio(&self, seed: Track) {
        let catalog = self.catalog().await;
        let session = self.clone();
        self.spawn_background(async move {
            let recommendations = match catalog.radio(&seed).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    tracing::warn!(seed = %seed.name, error = %e, "Radio fetch failed");
                    return;
                }
            };

            let mut state = session.inner.state.lock().await;
            let still_current = state.current.as_ref().is_some_and(|t| t.id == seed.id);
            let head_matches = state
                .playlist
                .as_ref()
                .and_then(|p| p.first())
                .is_some_and(|head| head.id == seed.id);
            if !still_current || head_matches {
                tracing::debug!(seed = %seed.name, "Discarding stale radio queue");
                return;
            }

            let mut queue = vec![seed.clone()];
            extend_unique(&mut queue, recommendations);
            tracing::info!(seed = %seed.name, length = queue.len(), "Radio queue installed");
            state.playlist = Some(queue);
            state.index = 0;
            state.queue_generation += 1;
            drop(state);
            session.notify(SessionNotice::QueueUpdated);
        })
        .await;
    }

    async fn spawn_queue_extension(&self, seed: Track, generation: u64) {
        let catalog = self.catalog().await;
        let session = self.clone();
        self.spawn_background(async move {
            let recommendations = match catalog.radio(&seed).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    tracing::warn!(seed = %seed.name, error = %e, "Queue prefetch failed");
                    return;
                }
            };

            let mut state = session.inner.state.lock().await;
            if state.queue_generation != generation || state.repeat == RepeatState::All {
                tracing::debug!("Queue changed meanwhile, dropping prefetch");
                return;
            }
            let Some(queue) = state.playlist.as_mut() else { return };
            let added = extend_unique(queue, recommendations);
            if added == 0 {
                return;
            }
            state.queue_generation += 1;
            tracing::debug!(added, "Queue extended");
            drop(state);
            session.notify(SessionNotice::QueueUpdated);
        })
        .await;
    }

    async fn start_playback(&self, track: Track, seq: u64) -> Result<()> {
        let adapter = self.adapter().await;

        if !adapter.is_ready().await {
            tracing::info!(track = %track.name, "Adapter not ready, waiting before playing");
            self.inner.state.lock().await.pending = Some((track, seq));
            return Ok(());
        }

        match adapter.play(&track).await {
            Ok(()) => {
                let mut state = self.inner.state.lock().await;
                if state.selection == seq && state.status == SessionStatus::Loading {
                    state.status = SessionStatus::Playing;
                    state.timing.update_position(0, true);
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(track = %track.name, error = %e, "Failed to start playback");
                let current = {
                    let mut state = self.inner.state.lock().await;
                    let current = state.selection == seq;
                    if current {
                        state.status = SessionStatus::Paused;
                        state.timing.is_playing = false;
                        state.requested = None;
                    }
                    current
                };
                // A failure for a track the user already moved away from is only logged
                if current {
                    self.notify(SessionNotice::PlaybackFailed(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Advance within the queue, prefetching more when it runs short
    pub async fn next(&self) -> Result<()> {
        let (track, seq, prefetch, generation) = {
            let mut state = self.inner.state.lock().await;
            let Some(len) = state.playlist.as_ref().map(Vec::len).filter(|len| *len > 0) else {
                drop(state);
                tracing::debug!("No queue, delegating next to the adapter");
                return self.adapter().await.next().await;
            };

            let index = if state.index + 1 < len {
                state.index + 1
            } else if state.repeat == RepeatState::All {
                0
            } else {
                tracing::debug!("End of queue");
                return Ok(());
            };

            state.index = index;
            let Some(track) = state.playlist.as_ref().and_then(|p| p.get(index)).cloned() else {
                return Ok(());
            };
            let seq = state.begin_track(&track);
            let prefetch = state.remaining_ahead() < PREFETCH_THRESHOLD && state.repeat != RepeatState::All;
            (track, seq, prefetch, state.queue_generation)
        };

        tracing::info!(track = %track.name, "Next track");
        if prefetch {
            self.spawn_queue_extension(track.clone(), generation).await;
        }
        self.start_playback(track, seq).await
    }

    pub async fn previous(&self) -> Result<()> {
        let (track, seq) = {
            let mut state = self.inner.state.lock().await;
            if state.playlist.is_none() {
                drop(state);
                tracing::debug!("No queue, delegating previous to the adapter");
                return self.adapter().await.previous().await;
            }
            if state.index == 0 {
                return Ok(());
            }
            state.index -= 1;
            let index = state.index;
            let Some(track) = state.playlist.as_ref().and_then(|p| p.get(index)).cloned() else {
                return Ok(());
            };
            let seq = state.begin_track(&track);
            (track, seq)
        };

        tracing::info!(track = %track.name, "Previous track");
        self.start_playback(track, seq).await
    }

    /// Play the queue entry at `index`
    pub async fn jump_to(&self, index: usize) -> Result<()> {
        let (track, seq, prefetch, generation) = {
            let mut state = self.inner.state.lock().await;
            let Some(track) = state.playlist.as_ref().and_then(|p| p.get(index)).cloned() else {
                return Ok(());
            };
            state.index = index;
            let seq = state.begin_track(&track);
            let prefetch = state.remaining_ahead() < PREFETCH_THRESHOLD && state.repeat != RepeatState::All;
            (track, seq, prefetch, state.queue_generation)
        };

        if prefetch {
            self.spawn_queue_extension(track.clone(), generation).await;
        }
        self.start_playback(track, seq).await
    }

    /// off → repeat-all → repeat-one → off
    pub async fn toggle_loop_mode(&self) -> RepeatState {
        let mut state = self.inner.state.lock().await;
        state.repeat = state.repeat.cycle();
        tracing::info!(repeat = ?state.repeat, "Loop mode changed");
        state.repeat
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub async fn toggle_playback(&self) -> Result<()> {
        let (status, at_end, current) = {
            let state = self.inner.state.lock().await;
            (state.status, state.at_end, state.current.clone())
        };
        let adapter = self.adapter().await;

        match status {
            SessionStatus::Playing => {
                adapter.pause().await?;
                let mut state = self.inner.state.lock().await;
                let position = state.timing.current_position_ms();
                state.timing.update_position(position, false);
                state.status = SessionStatus::Paused;
            }
            SessionStatus::Paused if at_end => {
                if let Some(track) = current {
                    let seq = self.inner.state.lock().await.begin_track(&track);
                    self.start_playback(track, seq).await?;
                }
            }
            SessionStatus::Paused => {
                adapter.resume().await?;
                let mut state = self.inner.state.lock().await;
                let position = state.timing.current_position_ms();
                state.timing.update_position(position, true);
                state.status = SessionStatus::Playing;
            }
            SessionStatus::Idle | SessionStatus::Loading => {}
        }
        Ok(())
    }

    pub async fn seek(&self, position_ms: u32) -> Result<()> {
        let position_ms = {
            let state = self.inner.state.lock().await;
            if state.current.is_none() {
                return Ok(());
            }
            position_ms.min(state.timing.duration_ms.saturating_sub(1))
        };
        self.adapter().await.seek(position_ms).await?;
        let mut state = self.inner.state.lock().await;
        let is_playing = state.status == SessionStatus::Playing;
        state.timing.update_position(position_ms, is_playing);
        Ok(())
    }

    pub async fn seek_relative(&self, delta_ms: i64) -> Result<()> {
        let position = self.inner.state.lock().await.timing.current_position_ms() as i64;
        self.seek((position + delta_ms).max(0) as u32).await
    }

    /// Stop playback; the queue is kept, the current track is not
    pub async fn stop(&self) -> Result<()> {
        self.adapter().await.stop().await?;
        let mut state = self.inner.state.lock().await;
        state.selection += 1;
        state.current = None;
        state.status = SessionStatus::Idle;
        state.pending = None;
        state.requested = None;
        state.timing.reset(0);
        state.dwell.track_changed(None, Instant::now());
        Ok(())
    }

    // ========================================================================
    // Backends
    // ========================================================================

    /// Probe the free backend and remember the answer for later switches
    pub async fn probe_backend_health(&self) -> bool {
        let healthy = self.inner.probe.check().await;
        self.inner.state.lock().await.backend_healthy = healthy;
        tracing::info!(healthy, "Backend health probed");
        healthy
    }

    pub async fn backend_healthy(&self) -> bool {
        self.inner.state.lock().await.backend_healthy
    }

    /// Returns false when the switch was refused (free backend not known to be up)
    pub async fn switch_backend(&self, target: BackendKind) -> Result<bool> {
        {
            let state = self.inner.state.lock().await;
            if target == BackendKind::YtMusic && !state.backend_healthy {
                tracing::warn!("Refusing switch to an unavailable backend");
                return Ok(false);
            }
            if state.backend == target {
                return Ok(true);
            }
        }
        self.mount(target).await?;
        Ok(true)
    }

    /// Mount a fresh adapter for the active backend, e.g. after logging in again
    pub async fn remount(&self) -> Result<()> {
        let backend = self.backend().await;
        self.mount(backend).await
    }

    async fn mount(&self, target: BackendKind) -> Result<()> {
        let fresh = self.inner.factory.mount(target, self.inner.events.clone()).await?;
        let old = std::mem::replace(&mut *self.inner.mounted.write().await, fresh);
        if let Err(e) = old.adapter.stop().await {
            tracing::warn!(error = %e, "Failed to stop previous adapter");
        }

        let mut state = self.inner.state.lock().await;
        state.backend = target;
        state.clear();
        tracing::info!(backend = %target, "Switched playback backend");
        Ok(())
    }

    // ========================================================================
    // Adapter events
    // ========================================================================

    fn spawn_event_loop(&self, mut rx: mpsc::UnboundedReceiver<AdapterEvent>) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(TICK);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        let Some(inner) = weak.upgrade() else { break };
                        SessionCoordinator { inner }.handle_event(event).await;
                    }
                    _ = tick.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        SessionCoordinator { inner }.record_dwell(Instant::now()).await;
                    }
                }
            }
            tracing::debug!("Session event loop stopped");
        });
    }

    pub(crate) async fn handle_event(&self, event: AdapterEvent) {
        let mut state = self.inner.state.lock().await;
        if event.source != state.backend {
            tracing::trace!(source = %event.source, "Ignoring event from unmounted adapter");
            return;
        }

        match event.kind {
            AdapterEventKind::State(player) => {
                if state.status == SessionStatus::Idle {
                    return;
                }
                if player.duration_ms > 0 {
                    state.timing.duration_ms = player.duration_ms;
                }
                state.timing.update_position(player.position_ms, player.is_playing);
                state.status = match (state.status, player.is_playing) {
                    (_, true) => SessionStatus::Playing,
                    // Still waiting for the track to start
                    (SessionStatus::Loading, false) => SessionStatus::Loading,
                    (_, false) => SessionStatus::Paused,
                };
            }
            AdapterEventKind::TrackEnded => {
                drop(state);
                self.on_track_end().await;
            }
            AdapterEventKind::TrackChanged(track) => {
                if state.current.as_ref().is_some_and(|t| t.id == track.id) {
                    state.requested = None;
                    return;
                }
                let queued = state.playlist.as_ref().and_then(|p| p.iter().position(|t| t.id == track.id));
                let awaiting = state
                    .requested
                    .as_ref()
                    .is_some_and(|(_, at)| at.elapsed() < REMOTE_CONFIRM_WINDOW);
                // e.g. remote autoplay reported between our play request and the remote switching to it
                if queued.is_none() && awaiting {
                    tracing::debug!(track = %track.name, "Ignoring remote track while our own play is pending");
                    return;
                }

                tracing::info!(track = %track.name, "Remote player changed track");
                match queued {
                    Some(index) => state.index = index,
                    None => {
                        state.playlist = None;
                        state.index = 0;
                        state.queue_generation += 1;
                    }
                }
                state.requested = None;
                state.selection += 1;
                state.at_end = false;
                state.timing.reset(track.duration_ms);
                state.dwell.track_changed(Some(&track), Instant::now());
                state.current = Some(track);
            }
            AdapterEventKind::Ready => {
                let pending = state.pending.take();
                let selection = state.selection;
                drop(state);
                if let Some((track, seq)) = pending.filter(|(_, seq)| *seq == selection) {
                    tracing::info!(track = %track.name, "Adapter ready, playing pending track");
                    let session = self.clone();
                    self.spawn_background(async move {
                        let _ = session.start_playback(track, seq).await;
                    })
                    .await;
                }
            }
            AdapterEventKind::AuthExpired => {
                drop(state);
                tracing::warn!("Spotify session expired");
                self.notify(SessionNotice::AuthExpired);
            }
        }
    }

    async fn on_track_end(&self) {
        let (repeat, current, has_next) = {
            let state = self.inner.state.lock().await;
            let has_next = state.remaining_ahead() > 0
                || (state.repeat == RepeatState::All && state.playlist.as_ref().is_some_and(|p| !p.is_empty()));
            (state.repeat, state.current.clone(), has_next)
        };

        let result = match (repeat, current) {
            (RepeatState::One, Some(track)) => {
                tracing::debug!(track = %track.name, "Repeating track");
                let seq = self.inner.state.lock().await.begin_track(&track);
                self.start_playback(track, seq).await
            }
            _ if has_next => self.next().await,
            _ => {
                let mut state = self.inner.state.lock().await;
                if state.current.is_some() {
                    state.status = SessionStatus::Paused;
                    state.at_end = true;
                    state.timing.update_position(0, false);
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to continue after track end");
        }
    }

    /// Write a history entry once the current track has been current long enough
    pub(crate) async fn record_dwell(&self, now: Instant) {
        let Some(track) = self.inner.state.lock().await.dwell.poll(now) else {
            return;
        };
        match self.inner.history.record(&track) {
            Ok(()) => self.notify(SessionNotice::HistoryRecorded(track)),
            Err(e) => tracing::warn!(error = %e, "Failed to record listening history"),
        }
    }
}

#[cfg(test)]
mod tests;
