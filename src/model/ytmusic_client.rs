//! Client for the self-hosted YouTube Music search/stream backend

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::{log_api_request, log_api_result};
use super::error::BackendError;
use super::track::{Album, Artist, Playlist, Track};

pub type Result<T> = std::result::Result<T, BackendError>;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5001";

// ============================================================================
// Wire format
// ============================================================================

#[derive(Deserialize, Default)]
struct TrackListResponse {
    #[serde(default)]
    tracks: TrackPage,
}

#[derive(Deserialize, Default)]
struct TrackPage {
    #[serde(default)]
    items: Vec<WireTrack>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
struct WireImage {
    url: String,
}

#[derive(Deserialize, Default)]
struct WireAlbum {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Deserialize)]
struct WireArtist {
    name: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct WireTrack {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artists: Vec<WireArtist>,
    #[serde(default)]
    album: Option<WireAlbum>,
    #[serde(default)]
    duration_ms: Option<f64>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: HashMap<String, String>,
    #[serde(default, rename = "videoId")]
    video_id: Option<String>,
}

impl WireTrack {
    /// Items without an id cannot be streamed and are dropped
    fn normalize(self) -> Option<Track> {
        let id = self.id.or_else(|| self.video_id.clone()).filter(|id| !id.is_empty())?;
        let album = self.album.unwrap_or_default();
        Some(Track {
            uri: self.uri.unwrap_or_else(|| format!("ytmusic:{}", id)),
            video_id: Some(self.video_id.unwrap_or_else(|| id.clone())),
            name: self.name.unwrap_or_else(|| "Unknown title".to_string()),
            artists: self
                .artists
                .into_iter()
                .map(|a| Artist { name: a.name, id: a.id })
                .collect(),
            album: Album {
                name: album.name.unwrap_or_else(|| "Unknown Album".to_string()),
                images: album.images.into_iter().map(|i| i.url).filter(|u| !u.is_empty()).collect(),
                release_date: None,
            },
            duration_ms: self.duration_ms.map(|d| d.max(0.0) as u32).unwrap_or(0),
            preview_url: self.preview_url.filter(|u| !u.is_empty()),
            external_url: self
                .external_urls
                .get("youtube")
                .cloned()
                .or_else(|| Some(format!("https://music.youtube.com/watch?v={}", id))),
            id,
        })
    }
}

fn normalize_all(items: Vec<WireTrack>) -> Vec<Track> {
    items.into_iter().filter_map(WireTrack::normalize).collect()
}

/// Direct audio information for a track
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TrackStreamInfo {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(rename = "audioUrl")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Lyrics {
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A playlist fetched through a share id
#[derive(Clone, Debug, PartialEq)]
pub struct SharedPlaylist {
    pub name: String,
    pub description: String,
    pub tracks: Vec<Track>,
}

#[derive(Deserialize)]
struct WireSharedPlaylist {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tracks: Vec<WireTrack>,
}

#[derive(Serialize)]
struct CreateShareRequest<'a> {
    name: &'a str,
    description: &'a str,
    tracks: &'a [Track],
}

#[derive(Deserialize)]
struct CreateShareResponse {
    #[serde(rename = "shareId", alias = "share_id", alias = "id")]
    share_id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the free backend. Cheap to clone.
#[derive(Clone)]
pub struct YtMusicClient {
    http: Client,
    base_url: String,
    health_timeout: Duration,
}

impl YtMusicClient {
    pub fn new(base_url: &str, health_timeout: Duration) -> Result<Self> {
        let url = base_url.trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(BackendError::InvalidUrl("URL cannot be empty".into()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BackendError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("nova/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url: url, health_timeout })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Single bounded probe; any failure means "unavailable"
    pub async fn check_health(&self) -> bool {
        let url = self.url("/api/health");
        match self.http.get(&url).timeout(self.health_timeout).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %url, "Backend healthy");
                true
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = %response.status(), "Backend health check failed");
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Backend unreachable");
                false
            }
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        log_api_request!("ytmusic_search", query = %query);
        let response = self
            .send(self.http.get(self.url("/api/search")).query(&[("q", query)]))
            .await;
        let result = match response {
            Ok(response) => Self::json::<TrackListResponse>(response)
                .await
                .map(|body| normalize_all(body.tracks.items)),
            Err(e) => Err(e),
        };
        log_api_result!("ytmusic_search", result);
        result
    }

    /// URL the media element streams from; fetched fresh by the backend on each request
    pub fn stream_url(&self, video_id: &str) -> String {
        self.url(&format!("/api/stream/{}", video_id))
    }

    pub async fn track_info(&self, video_id: &str) -> Result<TrackStreamInfo> {
        let response = self.send(self.http.get(self.url(&format!("/api/track/{}", video_id)))).await?;
        Self::json(response).await
    }

    pub async fn recommendations(&self, video_id: &str) -> Result<Vec<Track>> {
        log_api_request!("ytmusic_recommendations", video_id = %video_id);
        let result = match self
            .send(self.http.get(self.url(&format!("/api/recommendations/{}", video_id))))
            .await
        {
            Ok(response) => Self::json::<TrackListResponse>(response)
                .await
                .map(|body| normalize_all(body.tracks.items)),
            Err(e) => Err(e),
        };
        log_api_result!("ytmusic_recommendations", result);
        result
    }

    /// Hand the Spotify token to the backend so it can resolve Spotify metadata
    pub async fn set_token(&self, token: &str) -> Result<()> {
        self.send(
            self.http
                .post(self.url("/api/set-token"))
                .json(&serde_json::json!({ "token": token })),
        )
        .await?;
        Ok(())
    }

    pub async fn shared_playlist(&self, share_id: &str) -> Result<SharedPlaylist> {
        let response = self.send(self.http.get(self.url(&format!("/api/playlist/{}", share_id)))).await?;
        let body: WireSharedPlaylist = Self::json(response).await?;
        Ok(SharedPlaylist {
            name: body.name.unwrap_or_else(|| "Shared playlist".to_string()),
            description: body.description.unwrap_or_default(),
            tracks: normalize_all(body.tracks),
        })
    }

    /// Publish a playlist; returns the opaque share id
    pub async fn create_playlist_share(&self, playlist: &Playlist) -> Result<String> {
        let request = CreateShareRequest {
            name: &playlist.name,
            description: &playlist.description,
            tracks: &playlist.tracks,
        };
        let response = self
            .send(self.http.post(self.url("/api/create-playlist-share")).json(&request))
            .await?;
        let body: CreateShareResponse = Self::json(response).await?;
        tracing::info!(playlist_id = %playlist.id, share_id = %body.share_id, "Playlist shared");
        Ok(body.share_id)
    }

    pub async fn lyrics(&self, video_id: &str) -> Result<Lyrics> {
        let response = self.send(self.http.get(self.url(&format!("/api/lyrics/{}", video_id)))).await?;
        Self::json(response).await
    }

    /// Ask the backend to transcribe lyrics when none are published
    pub async fn transcribe_lyrics(&self, video_id: &str) -> Result<Lyrics> {
        let response = self
            .send(self.http.post(self.url(&format!("/api/lyrics/{}/transcribe", video_id))))
            .await?;
        Self::json(response).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                BackendError::Unreachable(e.to_string())
            } else {
                BackendError::Request(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        Err(BackendError::Server { status: status.as_u16(), message })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }
}
