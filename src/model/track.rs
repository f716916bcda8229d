//! Normalized catalog types shared by both backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::BackendKind;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Artist {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    /// Cover art URLs, largest first
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

/// A playable track, identical in shape whichever backend produced it.
///
/// Backend clients convert their wire payloads into this type, so nothing
/// past the client boundary has to guess which fields exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub duration_ms: u32,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

impl Track {
    /// Comma-joined artist names
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or_default()
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.album.images.first().map(String::as_str)
    }

    /// Identifier the stream proxy understands
    pub fn stream_id(&self) -> &str {
        self.video_id.as_deref().unwrap_or(&self.id)
    }

    /// Which backend can play this track, judged by its URI scheme
    pub fn source(&self) -> BackendKind {
        if self.uri.starts_with("spotify:") {
            BackendKind::Spotify
        } else {
            BackendKind::YtMusic
        }
    }
}

/// A user playlist kept in the local library
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Playlist {
    pub fn contains(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.tracks.iter().map(|t| t.duration_ms as u64).sum()
    }
}

/// One play that lasted past the dwell threshold
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningHistoryEntry {
    #[serde(rename = "trackId")]
    pub track_id: String,
    #[serde(rename = "trackName")]
    pub track_name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub duration_ms: u32,
    pub timestamp: DateTime<Utc>,
    /// Missing in entries written before playback from history was possible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl ListeningHistoryEntry {
    pub fn from_track(track: &Track, timestamp: DateTime<Utc>) -> Self {
        Self {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            artists: track.artists.clone(),
            album: track.album.clone(),
            duration_ms: track.duration_ms,
            timestamp,
            uri: Some(track.uri.clone()),
        }
    }

    /// Rebuild a playable track; entries without a URI are assumed to be stream tracks
    pub fn to_track(&self) -> Track {
        let uri = self
            .uri
            .clone()
            .unwrap_or_else(|| format!("ytmusic:{}", self.track_id));
        let video_id = (!uri.starts_with("spotify:")).then(|| self.track_id.clone());
        Track {
            id: self.track_id.clone(),
            name: self.track_name.clone(),
            artists: self.artists.clone(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            uri,
            preview_url: None,
            external_url: None,
            video_id,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {}", id),
        artists: vec![Artist::named(format!("Artist {}", id))],
        album: Album {
            name: format!("Album {}", id),
            images: vec![format!("https://img.example/{}.jpg", id)],
            release_date: None,
        },
        duration_ms: 180_000,
        uri: format!("ytmusic:{}", id),
        preview_url: None,
        external_url: Some(format!("https://music.youtube.com/watch?v={}", id)),
        video_id: Some(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_follows_uri_scheme() {
        let mut track = test_track("abc");
        assert_eq!(track.source(), BackendKind::YtMusic);
        track.uri = "spotify:track:abc".to_string();
        assert_eq!(track.source(), BackendKind::Spotify);
    }

    #[test]
    fn stream_id_prefers_video_id() {
        let mut track = test_track("abc");
        track.video_id = Some("vid".to_string());
        assert_eq!(track.stream_id(), "vid");
        track.video_id = None;
        assert_eq!(track.stream_id(), "abc");
    }

    #[test]
    fn stored_record_uses_video_id_key() {
        let track = test_track("abc");
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["videoId"], "abc");
        assert!(json.get("preview_url").is_none());
    }

    #[test]
    fn sparse_record_still_parses() {
        let track: Track =
            serde_json::from_str(r#"{"id":"x","name":"Song","uri":"ytmusic:x"}"#).unwrap();
        assert!(track.artists.is_empty());
        assert_eq!(track.primary_artist(), "");
        assert_eq!(track.duration_ms, 0);
    }

    #[test]
    fn history_entry_replays_as_track() {
        let mut track = test_track("abc");
        track.uri = "spotify:track:abc".to_string();
        let entry = ListeningHistoryEntry::from_track(&track, Utc::now());
        let back = entry.to_track();
        assert_eq!(back.uri, "spotify:track:abc");
        assert!(back.video_id.is_none());

        let legacy: ListeningHistoryEntry = serde_json::from_str(
            r#"{"trackId":"v1","trackName":"Old","timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(legacy.to_track().uri, "ytmusic:v1");
        assert_eq!(legacy.to_track().stream_id(), "v1");
    }

    #[test]
    fn artist_names_are_comma_joined() {
        let mut track = test_track("a");
        track.artists.push(Artist::named("Guest"));
        assert_eq!(track.artist_names(), "Artist a, Guest");
    }
}
