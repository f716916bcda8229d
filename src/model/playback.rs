//! Playback-related types and state management

use std::time::Instant;

use super::track::Track;
use super::types::{BackendKind, RepeatState};

/// Where the session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Metadata about the currently playing track
#[derive(Clone, Debug)]
pub struct TrackMetadata {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u32,
    pub uri: String,
}

impl From<&Track> for TrackMetadata {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            artist: track.artist_names(),
            album: track.album.name.clone(),
            duration_ms: track.duration_ms,
            uri: track.uri.clone(),
        }
    }
}

/// Internal timing state for smooth progress bar updates
#[derive(Clone, Debug)]
pub struct PlaybackTiming {
    pub position_ms: u32,
    pub last_update: Instant,
    pub is_playing: bool,
    pub duration_ms: u32,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            position_ms: 0,
            last_update: Instant::now(),
            is_playing: false,
            duration_ms: 0,
        }
    }
}

impl PlaybackTiming {
    pub fn current_position_ms(&self) -> u32 {
        if self.is_playing && self.duration_ms > 0 {
            let elapsed = self.last_update.elapsed().as_millis() as u32;
            self.position_ms.saturating_add(elapsed).min(self.duration_ms)
        } else {
            self.position_ms.min(self.duration_ms.max(1) - 1)
        }
    }

    /// Accept a reported position, ignoring small backward jitter from polling
    pub fn update_position(&mut self, new_position_ms: u32, is_playing: bool) {
        let current_calculated = self.current_position_ms();
        let diff = new_position_ms as i64 - current_calculated as i64;

        let state_changed = self.is_playing != is_playing;
        let significant_jump = diff.abs() > 2000;
        let was_paused = !self.is_playing;
        let acceptable_sync = diff >= -100;

        if state_changed || significant_jump || was_paused || acceptable_sync {
            self.position_ms = new_position_ms;
            self.last_update = Instant::now();
        }
        self.is_playing = is_playing;
    }

    pub fn reset(&mut self, duration_ms: u32) {
        self.position_ms = 0;
        self.duration_ms = duration_ms;
        self.is_playing = false;
        self.last_update = Instant::now();
    }
}

/// Complete playback information for rendering the UI
#[derive(Clone, Debug, Default)]
pub struct PlaybackInfo {
    pub track: Option<TrackMetadata>,
    pub status: SessionStatus,
    pub progress_ms: u32,
    pub duration_ms: u32,
    pub is_playing: bool,
    pub repeat: RepeatState,
    pub backend: BackendKind,
    /// 1-based position and queue length
    pub queue_position: Option<(usize, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_position_stays_inside_track() {
        let timing = PlaybackTiming {
            position_ms: 5_000,
            last_update: Instant::now(),
            is_playing: false,
            duration_ms: 4_000,
        };
        assert_eq!(timing.current_position_ms(), 3_999);
    }

    #[test]
    fn small_backward_jitter_is_ignored_while_playing() {
        let mut timing = PlaybackTiming {
            position_ms: 10_000,
            last_update: Instant::now(),
            is_playing: true,
            duration_ms: 200_000,
        };
        timing.update_position(9_500, true);
        assert!(timing.position_ms >= 10_000);
    }

    #[test]
    fn seek_backwards_is_applied() {
        let mut timing = PlaybackTiming {
            position_ms: 60_000,
            last_update: Instant::now(),
            is_playing: true,
            duration_ms: 200_000,
        };
        timing.update_position(1_000, true);
        assert_eq!(timing.position_ms, 1_000);
    }
}
