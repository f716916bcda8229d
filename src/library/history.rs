//! Listening history with a dwell threshold

use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;

use crate::model::{ListeningHistoryEntry, Track};
use super::store::{HISTORY_KEY, Store};

pub const HISTORY_LIMIT: usize = 500;
pub const DWELL_THRESHOLD: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ListeningHistory {
    store: Store,
}

impl ListeningHistory {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Most recent first
    pub fn entries(&self) -> Vec<ListeningHistoryEntry> {
        self.store.read(HISTORY_KEY)
    }

    pub fn record(&self, track: &Track) -> Result<()> {
        let mut entries = self.entries();
        entries.insert(0, ListeningHistoryEntry::from_track(track, Utc::now()));
        entries.truncate(HISTORY_LIMIT);
        self.store.write(HISTORY_KEY, &entries)?;
        tracing::debug!(track_id = %track.id, total = entries.len(), "Listening history entry recorded");
        Ok(())
    }
}

/// Decides when the current track has been current long enough to count as a play.
///
/// Feed it every change of the current track and poll it periodically; each
/// track yields at most one entry per stretch of being current.
#[derive(Debug)]
pub struct DwellTracker {
    threshold: Duration,
    current: Option<(Track, Instant)>,
    recorded: bool,
}

impl DwellTracker {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold, current: None, recorded: false }
    }

    pub fn track_changed(&mut self, track: Option<&Track>, now: Instant) {
        let same = match (&self.current, track) {
            (Some((current, _)), Some(track)) => current.id == track.id,
            _ => false,
        };
        if same {
            return;
        }
        self.current = track.map(|t| (t.clone(), now));
        self.recorded = false;
    }

    /// Returns the track once, when the threshold has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<Track> {
        if self.recorded {
            return None;
        }
        let (track, since) = self.current.as_ref()?;
        if now.saturating_duration_since(*since) >= self.threshold {
            self.recorded = true;
            return Some(track.clone());
        }
        None
    }
}

impl Default for DwellTracker {
    fn default() -> Self {
        Self::new(DWELL_THRESHOLD)
    }
}
