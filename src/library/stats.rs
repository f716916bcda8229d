//! Listening statistics derived from history (or liked songs before any history exists)

use std::collections::HashMap;

use crate::model::{Artist, ListeningHistoryEntry, Track};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtistCount {
    pub name: String,
    pub plays: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListeningStats {
    pub total_minutes: u64,
    pub tracks_played: usize,
    pub total_artists: usize,
    pub average_track_minutes: u64,
    pub top_artists: Vec<ArtistCount>,
    /// Names of the five most recent plays
    pub recent_tracks: Vec<String>,
}

impl ListeningStats {
    pub fn compute(history: &[ListeningHistoryEntry], liked: &[Track]) -> Self {
        let (artist_lists, durations): (Vec<&[Artist]>, Vec<u32>) = if history.is_empty() {
            liked.iter().map(|t| (t.artists.as_slice(), t.duration_ms)).unzip()
        } else {
            history.iter().map(|e| (e.artists.as_slice(), e.duration_ms)).unzip()
        };

        let counts = count_artists(artist_lists.iter().copied(), |a| Some(a.name.clone()));
        let total_ms: u64 = durations.iter().map(|d| *d as u64).sum();
        let played = durations.len();

        Self {
            total_minutes: total_ms / 1000 / 60,
            tracks_played: played,
            total_artists: counts.len(),
            average_track_minutes: if played > 0 { total_ms / played as u64 / 1000 / 60 } else { 0 },
            top_artists: ranked(counts)
                .into_iter()
                .take(5)
                .map(|(name, plays)| ArtistCount { name, plays })
                .collect(),
            recent_tracks: history.iter().take(5).map(|e| e.track_name.clone()).collect(),
        }
    }
}

/// Count artist occurrences under the key chosen by `key`; artists without a key are skipped
pub fn count_artists<'a, I, F>(lists: I, key: F) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a [Artist]>,
    F: Fn(&Artist) -> Option<String>,
{
    let mut counts = HashMap::new();
    for artists in lists {
        for artist in artists {
            if let Some(k) = key(artist) {
                *counts.entry(k).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Highest count first; ties broken by name so the order is stable
pub fn ranked(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_track;
    use chrono::Utc;

    fn entry(id: &str, artist: &str, minutes: u32) -> ListeningHistoryEntry {
        let mut track = test_track(id);
        track.artists = vec![Artist::named(artist)];
        track.duration_ms = minutes * 60_000;
        ListeningHistoryEntry::from_track(&track, Utc::now())
    }

    #[test]
    fn stats_from_history() {
        let history = vec![
            entry("1", "Daft Punk", 4),
            entry("2", "Daft Punk", 4),
            entry("3", "Justice", 4),
        ];
        let stats = ListeningStats::compute(&history, &[]);

        assert_eq!(stats.total_minutes, 12);
        assert_eq!(stats.tracks_played, 3);
        assert_eq!(stats.total_artists, 2);
        assert_eq!(stats.average_track_minutes, 4);
        assert_eq!(stats.top_artists[0], ArtistCount { name: "Daft Punk".into(), plays: 2 });
        assert_eq!(stats.recent_tracks.len(), 3);
    }

    #[test]
    fn liked_songs_stand_in_for_empty_history() {
        let liked = vec![test_track("a"), test_track("b")];
        let stats = ListeningStats::compute(&[], &liked);
        assert_eq!(stats.tracks_played, 2);
        assert_eq!(stats.total_artists, 2);
        assert!(stats.recent_tracks.is_empty());
    }

    #[test]
    fn empty_inputs_give_zeroes() {
        assert_eq!(ListeningStats::compute(&[], &[]), ListeningStats::default());
    }
}
