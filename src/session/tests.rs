use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use super::*;
use crate::catalog::Seeds;
use crate::library::Store;
use crate::model::test_track;
use crate::player::{MockPlaybackAdapter, PlayerState};

// ============================================================================
// Fakes
// ============================================================================

struct FakeAdapter {
    kind: BackendKind,
    ready: AtomicBool,
    plays: StdMutex<Vec<String>>,
    calls: StdMutex<Vec<&'static str>>,
}

impl FakeAdapter {
    fn new(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            ready: AtomicBool::new(true),
            plays: StdMutex::new(vec![]),
            calls: StdMutex::new(vec![]),
        })
    }

    fn plays(&self) -> Vec<String> {
        self.plays.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl PlaybackAdapter for FakeAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn play(&self, track: &Track) -> Result<()> {
        self.plays.lock().unwrap().push(track.id.clone());
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause")
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume")
    }

    async fn next(&self) -> Result<()> {
        self.record("next")
    }

    async fn previous(&self) -> Result<()> {
        self.record("previous")
    }

    async fn seek(&self, _position_ms: u32) -> Result<()> {
        self.record("seek")
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop")
    }
}

/// Radio answers are held back until the gate gets a permit
struct FakeCatalog {
    kind: BackendKind,
    radio: Vec<Track>,
    gate: Arc<Semaphore>,
    radio_calls: StdMutex<Vec<String>>,
}

impl FakeCatalog {
    fn new(kind: BackendKind, radio: Vec<Track>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            radio,
            gate: Arc::new(Semaphore::new(0)),
            radio_calls: StdMutex::new(vec![]),
        })
    }

    fn open(&self) {
        self.gate.add_permits(1);
    }

    fn radio_calls(&self) -> Vec<String> {
        self.radio_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn search(&self, _query: &str) -> Result<Vec<Track>> {
        Ok(vec![])
    }

    async fn radio(&self, seed: &Track) -> Result<Vec<Track>> {
        self.radio_calls.lock().unwrap().push(seed.id.clone());
        let _permit = self.gate.acquire().await?;
        Ok(self.radio.clone())
    }

    async fn recommend(&self, _seeds: &Seeds) -> Result<Vec<Track>> {
        Ok(vec![])
    }

    async fn trending(&self) -> Result<Vec<Track>> {
        Ok(vec![])
    }
}

struct FakeFactory {
    mounted: HashMap<BackendKind, Mounted>,
    mounts: StdMutex<Vec<BackendKind>>,
}

#[async_trait]
impl AdapterFactory for FakeFactory {
    async fn mount(&self, backend: BackendKind, _events: AdapterEvents) -> Result<Mounted> {
        self.mounts.lock().unwrap().push(backend);
        self.mounted
            .get(&backend)
            .cloned()
            .ok_or_else(|| anyhow!("no adapter for {}", backend))
    }
}

struct Harness {
    session: SessionCoordinator,
    stream: Arc<FakeAdapter>,
    spotify: Arc<FakeAdapter>,
    catalog: Arc<FakeCatalog>,
    factory: Arc<FakeFactory>,
    history: ListeningHistory,
    _dir: TempDir,
}

fn probe(healthy: bool) -> Arc<MockHealthProbe> {
    let mut probe = MockHealthProbe::new();
    probe.expect_check().returning(move || healthy);
    Arc::new(probe)
}

async fn harness(backend: BackendKind, radio: Vec<Track>, healthy: bool) -> Harness {
    let stream = FakeAdapter::new(BackendKind::YtMusic);
    let spotify = FakeAdapter::new(BackendKind::Spotify);
    let catalog = FakeCatalog::new(backend, radio);

    let mut mounted = HashMap::new();
    mounted.insert(
        BackendKind::YtMusic,
        Mounted { adapter: stream.clone(), catalog: catalog.clone() },
    );
    mounted.insert(
        BackendKind::Spotify,
        Mounted { adapter: spotify.clone(), catalog: catalog.clone() },
    );
    let factory = Arc::new(FakeFactory { mounted, mounts: StdMutex::new(vec![]) });

    let dir = tempfile::tempdir().unwrap();
    let history = ListeningHistory::new(Store::open(dir.path()).unwrap());
    let session = SessionCoordinator::start(backend, factory.clone(), probe(healthy), history.clone(), healthy)
        .await
        .unwrap();

    Harness { session, stream, spotify, catalog, factory, history, _dir: dir }
}

fn ids(tracks: &[Track]) -> Vec<&str> {
    tracks.iter().map(|t| t.id.as_str()).collect()
}

fn tracks(names: &[&str]) -> Vec<Track> {
    names.iter().map(|n| test_track(n)).collect()
}

fn event(source: BackendKind, kind: AdapterEventKind) -> AdapterEvent {
    AdapterEvent { source, kind }
}

// ============================================================================
// Queue behavior
// ============================================================================

mod queue {
    use super::*;

    #[tokio::test]
    async fn radio_queue_walkthrough() {
        let h = harness(BackendKind::YtMusic, tracks(&["A", "B", "C"]), true).await;

        h.session.select_track(test_track("A"), None).await.unwrap();
        let snap = h.session.snapshot().await;
        assert_eq!(snap.current.unwrap().id, "A");
        assert!(snap.queue.is_none());

        h.catalog.open();
        h.session.settle().await;
        let snap = h.session.snapshot().await;
        assert_eq!(ids(&snap.queue.unwrap()), vec!["A", "B", "C"]);
        assert_eq!(snap.index, 0);

        h.session.next().await.unwrap();
        h.session.settle().await;
        let snap = h.session.snapshot().await;
        assert_eq!((snap.current.unwrap().id, snap.index), ("B".to_string(), 1));

        h.session.next().await.unwrap();
        h.session.settle().await;
        let snap = h.session.snapshot().await;
        assert_eq!((snap.current.unwrap().id, snap.index), ("C".to_string(), 2));

        h.session.next().await.unwrap();
        let snap = h.session.snapshot().await;
        assert_eq!((snap.current.unwrap().id, snap.index), ("C".to_string(), 2));

        assert_eq!(h.stream.plays(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn stale_radio_is_discarded() {
        let h = harness(BackendKind::YtMusic, tracks(&["X", "Y"]), true).await;

        h.session.select_track(test_track("A"), None).await.unwrap();
        h.session.select_track(test_track("B"), Some(tracks(&["B", "C"]))).await.unwrap();
        h.catalog.open();
        h.session.settle().await;

        let snap = h.session.snapshot().await;
        assert_eq!(ids(&snap.queue.unwrap()), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn explicit_playlist_sets_index() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        let list = tracks(&["A", "B", "C"]);

        h.session.select_track(test_track("B"), Some(list.clone())).await.unwrap();
        assert_eq!(h.session.snapshot().await.index, 1);

        h.session.select_track(test_track("Z"), Some(list)).await.unwrap();
        let snap = h.session.snapshot().await;
        assert_eq!(snap.index, 0);
        assert_eq!(snap.current.unwrap().id, "Z");
        assert!(h.catalog.radio_calls().is_empty());
    }

    #[tokio::test]
    async fn empty_playlist_is_treated_as_radio() {
        let h = harness(BackendKind::YtMusic, tracks(&["A", "B"]), true).await;

        h.session.select_track(test_track("A"), Some(vec![])).await.unwrap();
        let snap = h.session.snapshot().await;
        assert!(snap.queue.is_none());
        assert_eq!(snap.info.queue_position, None);

        h.catalog.open();
        h.session.settle().await;
        let snap = h.session.snapshot().await;
        assert_eq!(ids(&snap.queue.unwrap()), vec!["A", "B"]);
        assert_eq!(snap.info.queue_position, Some((1, 2)));
        assert_eq!(h.catalog.radio_calls(), vec!["A"]);
    }

    #[tokio::test]
    async fn repeat_all_wraps_without_prefetch() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.toggle_loop_mode().await;

        h.session.select_track(test_track("B"), Some(tracks(&["A", "B"]))).await.unwrap();
        h.session.next().await.unwrap();

        let snap = h.session.snapshot().await;
        assert_eq!((snap.current.unwrap().id, snap.index), ("A".to_string(), 0));
        assert!(h.catalog.radio_calls().is_empty());
    }

    #[tokio::test]
    async fn short_queue_is_extended_without_duplicates() {
        let h = harness(BackendKind::YtMusic, tracks(&["C", "D", "E"]), true).await;
        h.catalog.open();

        h.session.select_track(test_track("A"), Some(tracks(&["A", "B", "C"]))).await.unwrap();
        h.session.next().await.unwrap();
        h.session.settle().await;

        let snap = h.session.snapshot().await;
        assert_eq!(ids(&snap.queue.unwrap()), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(h.catalog.radio_calls(), vec!["B"]);
    }

    #[tokio::test]
    async fn previous_stops_at_the_start() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("B"), Some(tracks(&["A", "B"]))).await.unwrap();

        h.session.previous().await.unwrap();
        assert_eq!(h.session.snapshot().await.index, 0);
        h.session.previous().await.unwrap();
        assert_eq!(h.session.snapshot().await.index, 0);
        assert_eq!(h.stream.plays(), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn without_queue_the_adapter_skips() {
        let h = harness(BackendKind::Spotify, vec![], false).await;
        h.session.next().await.unwrap();
        h.session.previous().await.unwrap();
        assert_eq!(h.spotify.calls(), vec!["next", "previous"]);
    }

    #[tokio::test]
    async fn jump_to_plays_queue_entry() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.catalog.open();
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B", "C", "D", "E", "F"]))).await.unwrap();

        h.session.jump_to(2).await.unwrap();
        h.session.jump_to(42).await.unwrap();

        let snap = h.session.snapshot().await;
        assert_eq!((snap.current.unwrap().id, snap.index), ("C".to_string(), 2));
    }

    #[tokio::test]
    async fn loop_mode_cycles() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        assert_eq!(h.session.toggle_loop_mode().await, RepeatState::All);
        assert_eq!(h.session.toggle_loop_mode().await, RepeatState::One);
        assert_eq!(h.session.toggle_loop_mode().await, RepeatState::Off);
    }
}

// ============================================================================
// Adapter events
// ============================================================================

mod events {
    use super::*;

    #[tokio::test]
    async fn repeat_one_replays_on_end() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.toggle_loop_mode().await;
        h.session.toggle_loop_mode().await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B"]))).await.unwrap();

        h.session.handle_event(event(BackendKind::YtMusic, AdapterEventKind::TrackEnded)).await;
        assert_eq!(h.stream.plays(), vec!["A", "A"]);
        assert_eq!(h.session.snapshot().await.index, 0);
    }

    #[tokio::test]
    async fn end_advances_through_queue() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B"]))).await.unwrap();

        h.session.handle_event(event(BackendKind::YtMusic, AdapterEventKind::TrackEnded)).await;
        assert_eq!(h.session.snapshot().await.current.unwrap().id, "B");
    }

    #[tokio::test]
    async fn end_of_queue_pauses_at_start() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("B"), Some(tracks(&["A", "B"]))).await.unwrap();

        h.session.handle_event(event(BackendKind::YtMusic, AdapterEventKind::TrackEnded)).await;
        let snap = h.session.snapshot().await;
        assert_eq!(snap.info.status, SessionStatus::Paused);
        assert_eq!(snap.info.progress_ms, 0);
        assert_eq!(snap.current.unwrap().id, "B");

        // Play again from the top
        h.session.toggle_playback().await.unwrap();
        assert_eq!(h.stream.plays(), vec!["B", "B"]);
    }

    #[tokio::test]
    async fn inactive_backend_events_are_ignored() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B"]))).await.unwrap();

        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackEnded)).await;
        assert_eq!(h.session.snapshot().await.current.unwrap().id, "A");
    }

    #[tokio::test]
    async fn state_events_drive_status() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("A"), None).await.unwrap();

        let paused = PlayerState { is_playing: false, position_ms: 12_000, duration_ms: 200_000 };
        h.session.handle_event(event(BackendKind::YtMusic, AdapterEventKind::State(paused))).await;
        let snap = h.session.snapshot().await;
        assert_eq!(snap.info.status, SessionStatus::Paused);
        assert_eq!(snap.info.duration_ms, 200_000);
        assert_eq!(snap.info.progress_ms, 12_000);
    }

    #[tokio::test]
    async fn waits_for_ready_adapter() {
        let h = harness(BackendKind::Spotify, vec![], false).await;
        h.spotify.ready.store(false, Ordering::SeqCst);

        h.session.select_track(test_track("A"), Some(tracks(&["A"]))).await.unwrap();
        assert_eq!(h.session.snapshot().await.info.status, SessionStatus::Loading);
        assert!(h.spotify.plays().is_empty());

        // Remote state while waiting does not end the wait
        let idle = PlayerState::default();
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::State(idle))).await;
        assert_eq!(h.session.snapshot().await.info.status, SessionStatus::Loading);

        h.spotify.ready.store(true, Ordering::SeqCst);
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::Ready)).await;
        h.session.settle().await;

        assert_eq!(h.spotify.plays(), vec!["A"]);
        assert_eq!(h.session.snapshot().await.info.status, SessionStatus::Playing);
    }

    #[tokio::test]
    async fn remote_track_change_follows_queue() {
        let h = harness(BackendKind::Spotify, vec![], false).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B"]))).await.unwrap();

        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackChanged(test_track("B")))).await;
        let snap = h.session.snapshot().await;
        assert_eq!((snap.current.unwrap().id, snap.index), ("B".to_string(), 1));

        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackChanged(test_track("Q")))).await;
        let snap = h.session.snapshot().await;
        assert_eq!(snap.current.unwrap().id, "Q");
        assert!(snap.queue.is_none());
    }

    #[tokio::test]
    async fn remote_autoplay_does_not_drop_queue() {
        let h = harness(BackendKind::Spotify, vec![], false).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B", "C"]))).await.unwrap();
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackChanged(test_track("A")))).await;

        // Spotify ends A and autoplays X before picking up B
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackEnded)).await;
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackChanged(test_track("X")))).await;
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::TrackChanged(test_track("B")))).await;

        let snap = h.session.snapshot().await;
        assert_eq!(h.spotify.plays(), vec!["A", "B"]);
        assert_eq!((snap.current.unwrap().id, snap.index), ("B".to_string(), 1));
        assert_eq!(ids(&snap.queue.unwrap()), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn auth_expiry_is_announced() {
        let h = harness(BackendKind::Spotify, vec![], false).await;
        let mut notices = h.session.subscribe();
        h.session.handle_event(event(BackendKind::Spotify, AdapterEventKind::AuthExpired)).await;
        assert_eq!(notices.recv().await.unwrap(), SessionNotice::AuthExpired);
    }
}

// ============================================================================
// Transport, backends, history
// ============================================================================

mod control {
    use super::*;

    #[tokio::test]
    async fn toggle_playback_pauses_and_resumes() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A"]))).await.unwrap();
        assert_eq!(h.session.snapshot().await.info.status, SessionStatus::Playing);

        h.session.toggle_playback().await.unwrap();
        assert_eq!(h.session.snapshot().await.info.status, SessionStatus::Paused);
        h.session.toggle_playback().await.unwrap();
        assert_eq!(h.session.snapshot().await.info.status, SessionStatus::Playing);
        assert_eq!(h.stream.calls(), vec!["pause", "resume"]);
    }

    #[tokio::test]
    async fn stop_goes_idle() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A"]))).await.unwrap();
        h.session.stop().await.unwrap();

        let snap = h.session.snapshot().await;
        assert_eq!(snap.info.status, SessionStatus::Idle);
        assert!(snap.current.is_none());
    }

    #[tokio::test]
    async fn playback_failure_is_reported_and_pauses() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = MockPlaybackAdapter::new();
        adapter.expect_is_ready().returning(|| true);
        adapter.expect_play().returning(|_| Err(anyhow!("no audio output device")));
        let catalog = FakeCatalog::new(BackendKind::YtMusic, vec![]);

        let mut mounted = HashMap::new();
        mounted.insert(BackendKind::YtMusic, Mounted { adapter: Arc::new(adapter), catalog });
        let factory = Arc::new(FakeFactory { mounted, mounts: StdMutex::new(vec![]) });
        let session = SessionCoordinator::start(
            BackendKind::YtMusic,
            factory,
            probe(true),
            ListeningHistory::new(Store::open(dir.path()).unwrap()),
            true,
        )
        .await
        .unwrap();
        let mut notices = session.subscribe();

        assert!(session.select_track(test_track("A"), Some(tracks(&["A"]))).await.is_err());
        let snap = session.snapshot().await;
        assert_eq!(snap.info.status, SessionStatus::Paused);
        assert_eq!(snap.current.unwrap().id, "A");
        assert!(matches!(notices.recv().await.unwrap(), SessionNotice::PlaybackFailed(_)));
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn switch_rejected_when_backend_down() {
        let h = harness(BackendKind::Spotify, vec![], false).await;
        assert!(!h.session.probe_backend_health().await);
        h.session.select_track(test_track("A"), Some(tracks(&["A"]))).await.unwrap();

        assert!(!h.session.switch_backend(BackendKind::YtMusic).await.unwrap());
        assert_eq!(h.session.backend().await, BackendKind::Spotify);
        assert_eq!(h.session.snapshot().await.current.unwrap().id, "A");
        assert_eq!(*h.factory.mounts.lock().unwrap(), vec![BackendKind::Spotify]);
    }

    #[tokio::test]
    async fn switch_clears_session_and_stops_old_adapter() {
        let h = harness(BackendKind::Spotify, vec![], true).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B"]))).await.unwrap();

        assert!(h.session.switch_backend(BackendKind::YtMusic).await.unwrap());
        let snap = h.session.snapshot().await;
        assert_eq!(h.session.backend().await, BackendKind::YtMusic);
        assert_eq!(snap.info.status, SessionStatus::Idle);
        assert!(snap.current.is_none());
        assert!(snap.queue.is_none());
        assert_eq!(h.spotify.calls(), vec!["stop"]);
    }

    #[tokio::test]
    async fn history_needs_full_dwell() {
        let h = harness(BackendKind::YtMusic, vec![], true).await;
        h.session.select_track(test_track("A"), Some(tracks(&["A", "B"]))).await.unwrap();
        h.session.record_dwell(Instant::now() + Duration::from_secs(10)).await;
        assert!(h.history.entries().is_empty());

        h.session.next().await.unwrap();
        h.session.record_dwell(Instant::now() + Duration::from_secs(31)).await;
        h.session.record_dwell(Instant::now() + Duration::from_secs(62)).await;

        let entries = h.history.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track_id, "B");
    }
}
