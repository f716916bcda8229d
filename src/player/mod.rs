//! Player module - playback adapters
//!
//! Both backends are driven through the same [`PlaybackAdapter`] surface. Each
//! adapter pushes what it observes into one channel owned by the session
//! coordinator:
//!
//! - `spotify`: Spotify Connect remote control with one-second state polling
//! - `stream`: the free backend's audio stream played through a local media element
//! - `media`: the media element itself (rodio on a dedicated audio thread)

mod spotify;
mod stream;
mod media;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::{BackendKind, Track};

pub use spotify::SpotifyAdapter;
pub use stream::StreamAdapter;
pub use media::{MediaElement, MediaEvent, RodioElement};

/// Snapshot of what the adapter is doing right now
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub is_playing: bool,
    pub position_ms: u32,
    pub duration_ms: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AdapterEventKind {
    State(PlayerState),
    /// The current track played to its end
    TrackEnded,
    /// The remote player moved to a track we did not ask for
    TrackChanged(Track),
    /// The adapter can accept `play` now
    Ready,
    /// Spotify rejected the token
    AuthExpired,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdapterEvent {
    pub source: BackendKind,
    pub kind: AdapterEventKind,
}

pub type AdapterEvents = mpsc::UnboundedSender<AdapterEvent>;

pub(crate) fn emit(events: &AdapterEvents, source: BackendKind, kind: AdapterEventKind) {
    if events.send(AdapterEvent { source, kind }).is_err() {
        tracing::trace!(%source, "Adapter event dropped, session is gone");
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// False while the adapter has nowhere to play (no Spotify device yet)
    async fn is_ready(&self) -> bool;

    async fn play(&self, track: &Track) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;

    /// Backend-native skip, used when the session has no queue of its own
    async fn next(&self) -> Result<()>;
    async fn previous(&self) -> Result<()>;

    async fn seek(&self, position_ms: u32) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}
