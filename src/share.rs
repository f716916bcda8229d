//! Share links
//!
//! A track link carries the track itself: `{base}/#share/{payload}` where the
//! payload is base64 of the percent-encoded JSON (the same bytes a browser
//! produces with `btoa(encodeURIComponent(json))`). A playlist link only
//! carries the id the free backend handed out: `{base}/#playlist/{shareId}`.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::model::{Album, Artist, Track};

/// Characters `encodeURIComponent` leaves alone
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const TRACK_MARKER: &str = "#share/";
const PLAYLIST_MARKER: &str = "#playlist/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTrack {
    pub id: String,
    pub name: String,
    /// Comma-joined artist names
    pub artist: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub preview: String,
    #[serde(rename = "externalUrl", alias = "spotify", default)]
    pub external_url: String,
}

impl SharedTrack {
    pub fn from_track(track: &Track) -> Self {
        let artist = match track.artist_names() {
            names if names.is_empty() => "Unknown Artist".to_string(),
            names => names,
        };
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            artist,
            image: track.cover_url().unwrap_or_default().to_string(),
            preview: track.preview_url.clone().unwrap_or_default(),
            external_url: track
                .external_url
                .clone()
                .unwrap_or_else(|| default_external_url(track)),
        }
    }

    /// Rebuild a playable track; the link decides which backend it belongs to
    pub fn into_track(self) -> Track {
        let on_spotify = self.external_url.contains("open.spotify.com");
        let uri = if on_spotify {
            format!("spotify:track:{}", self.id)
        } else {
            format!("ytmusic:{}", self.id)
        };
        Track {
            artists: self
                .artist
                .split(", ")
                .filter(|n| !n.is_empty())
                .map(Artist::named)
                .collect(),
            album: Album {
                name: String::new(),
                images: Some(self.image).filter(|i| !i.is_empty()).into_iter().collect(),
                release_date: None,
            },
            duration_ms: 0,
            uri,
            preview_url: Some(self.preview).filter(|p| !p.is_empty()),
            external_url: Some(self.external_url).filter(|u| !u.is_empty()),
            video_id: if on_spotify { None } else { Some(self.id.clone()) },
            name: self.name,
            id: self.id,
        }
    }
}

fn default_external_url(track: &Track) -> String {
    if track.uri.starts_with("spotify:") {
        format!("https://open.spotify.com/track/{}", track.id)
    } else {
        format!("https://music.youtube.com/watch?v={}", track.stream_id())
    }
}

/// What a pasted link points at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareTarget {
    Track(SharedTrack),
    Playlist(String),
}

pub fn encode(track: &SharedTrack) -> Result<String> {
    let json = serde_json::to_string(track)?;
    let escaped = utf8_percent_encode(&json, URI_COMPONENT).to_string();
    Ok(STANDARD.encode(escaped))
}

pub fn decode(payload: &str) -> Result<SharedTrack> {
    let bytes = STANDARD
        .decode(payload.trim())
        .context("share payload is not valid base64")?;
    let escaped = String::from_utf8(bytes).context("share payload is not text")?;
    let json = percent_decode_str(&escaped)
        .decode_utf8()
        .context("share payload has invalid escapes")?;
    serde_json::from_str(&json).context("share payload is not a track")
}

pub fn track_link(base_url: &str, track: &Track) -> Result<String> {
    let payload = encode(&SharedTrack::from_track(track))?;
    Ok(format!("{}/{}{}", base_url.trim_end_matches('/'), TRACK_MARKER, payload))
}

pub fn playlist_link(base_url: &str, share_id: &str) -> String {
    format!("{}/{}{}", base_url.trim_end_matches('/'), PLAYLIST_MARKER, share_id)
}

/// Accepts a full link or just its fragment
pub fn parse_link(link: &str) -> Result<ShareTarget> {
    let link = link.trim();
    if let Some((_, payload)) = link.split_once(TRACK_MARKER) {
        return decode(payload).map(ShareTarget::Track);
    }
    if let Some((_, id)) = link.split_once(PLAYLIST_MARKER) {
        let id = id.trim_end_matches('/');
        if id.is_empty() {
            bail!("playlist link has no id");
        }
        return Ok(ShareTarget::Playlist(id.to_string()));
    }
    bail!("not a share link")
}
