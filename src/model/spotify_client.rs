//! Spotify Web API client: catalog lookups and Connect playback control

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::auth::{Authenticator, SpotifyToken};
use crate::{log_api_request, log_api_result};
use super::error::SpotifyError;
use super::track::{Album, Artist, Track};
use super::types::PlaylistItem;

pub type Result<T> = std::result::Result<T, SpotifyError>;

pub const API_BASE: &str = "https://api.spotify.com/v1";
pub const SEARCH_LIMIT: u32 = 10;

// ============================================================================
// Wire format
// ============================================================================

#[derive(Deserialize)]
struct WireImage {
    url: String,
}

#[derive(Deserialize)]
struct WireArtist {
    name: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireAlbum {
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<WireImage>,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct WireTrack {
    /// Local files and unavailable tracks come without an id
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<WireArtist>,
    #[serde(default)]
    album: WireAlbum,
    #[serde(default)]
    duration_ms: u32,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: HashMap<String, String>,
}

impl WireTrack {
    fn normalize(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(Track {
            uri: self.uri.unwrap_or_else(|| format!("spotify:track:{}", id)),
            name: self.name,
            artists: self
                .artists
                .into_iter()
                .map(|a| Artist { name: a.name, id: a.id })
                .collect(),
            album: Album {
                name: self.album.name,
                images: self.album.images.into_iter().map(|i| i.url).collect(),
                release_date: self.album.release_date,
            },
            duration_ms: self.duration_ms,
            preview_url: self.preview_url,
            external_url: self.external_urls.get("spotify").cloned(),
            video_id: None,
            id,
        })
    }
}

fn normalize_all(items: impl IntoIterator<Item = WireTrack>) -> Vec<Track> {
    items.into_iter().filter_map(WireTrack::normalize).collect()
}

#[derive(Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<WireTrack>>,
}

#[derive(Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    tracks: Vec<WireTrack>,
}

#[derive(Deserialize)]
struct PlaylistTrackItem {
    track: Option<WireTrack>,
}

#[derive(Deserialize)]
struct WirePlaylistTracks {
    #[serde(default)]
    total: usize,
}

#[derive(Deserialize)]
struct WirePlaylist {
    id: String,
    name: String,
    #[serde(default)]
    tracks: Option<WirePlaylistTracks>,
}

#[derive(Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct WirePlayback {
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    progress_ms: Option<u32>,
    #[serde(default)]
    item: Option<WireTrack>,
    #[serde(default)]
    device: Option<Device>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireError,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

// ============================================================================
// Public types
// ============================================================================

/// A Spotify Connect device
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// What `GET me/player` reports
#[derive(Clone, Debug, PartialEq)]
pub struct RemotePlayback {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub progress_ms: u32,
    pub device: Option<Device>,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<SpotifyToken>>,
    authenticator: Option<Authenticator>,
}

impl SpotifyClient {
    pub fn new(token: SpotifyToken, authenticator: Option<Authenticator>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            token: Arc::new(RwLock::new(token)),
            authenticator,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn access_token(&self) -> String {
        self.token.read().await.access_token.clone()
    }

    pub async fn token_needs_refresh(&self) -> bool {
        self.token.read().await.needs_refresh(Utc::now())
    }

    pub async fn refresh_token_if_needed(&self) -> anyhow::Result<bool> {
        if !self.token_needs_refresh().await {
            return Ok(false);
        }
        let Some(auth) = &self.authenticator else {
            return Ok(false);
        };

        tracing::info!("Token expiring soon, refreshing...");
        let current = self.token.read().await.clone();
        match auth.refresh(&current).await {
            Ok(token) => {
                *self.token.write().await = token;
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh token");
                Err(e)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}/{}", self.base_url, path))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Option<Response>> {
        if let Err(e) = self.refresh_token_if_needed().await {
            tracing::warn!(error = %e, "Continuing with the current token");
        }
        let token = self.access_token().await;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status.is_success() {
            return Ok(Some(response));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(SpotifyError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();
        let (message, reason) = match serde_json::from_str::<WireErrorBody>(&text) {
            Ok(body) => (body.error.message, body.error.reason),
            Err(_) => (text, None),
        };
        if status == StatusCode::NOT_FOUND && reason.as_deref() == Some("NO_ACTIVE_DEVICE") {
            return Err(SpotifyError::NoDevice);
        }
        Err(SpotifyError::Api { status: status.as_u16(), message })
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        match self.send(request).await? {
            Some(response) => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| SpotifyError::Parse(e.to_string())),
            None => Ok(None),
        }
    }

    async fn command(&self, request: RequestBuilder) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    pub async fn me(&self) -> Result<UserProfile> {
        self.get_json(self.request(Method::GET, "me"))
            .await?
            .ok_or_else(|| SpotifyError::Parse("empty profile response".into()))
    }

    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
        log_api_request!("search", query = %query);
        let result = self
            .get_json::<SearchResponse>(
                self.request(Method::GET, "search")
                    .query(&[("q", query), ("type", "track"), ("limit", &limit.to_string())]),
            )
            .await
            .map(|body| {
                body.and_then(|b| b.tracks)
                    .map(|page| normalize_all(page.items))
                    .unwrap_or_default()
            });
        log_api_result!("search", result);
        result
    }

    pub async fn devices(&self) -> Result<Vec<Device>> {
        let body: Option<DevicesResponse> = self.get_json(self.request(Method::GET, "me/player/devices")).await?;
        Ok(body.map(|b| b.devices).unwrap_or_default())
    }

    pub async fn current_playback(&self) -> Result<Option<RemotePlayback>> {
        tracing::trace!("Fetching current playback state");
        let body: Option<WirePlayback> = self.get_json(self.request(Method::GET, "me/player")).await?;
        Ok(body.map(|p| RemotePlayback {
            track: p.item.and_then(WireTrack::normalize),
            is_playing: p.is_playing,
            progress_ms: p.progress_ms.unwrap_or(0),
            device: p.device,
        }))
    }

    pub async fn play_uris(&self, device_id: &str, uris: &[String]) -> Result<()> {
        log_api_request!("play_uris", device_id = %device_id, count = uris.len());
        let result = self
            .command(
                self.request(Method::PUT, "me/player/play")
                    .query(&[("device_id", device_id)])
                    .json(&serde_json::json!({ "uris": uris })),
            )
            .await;
        log_api_result!("play_uris", result);
        result
    }

    pub async fn resume(&self, device_id: &str) -> Result<()> {
        tracing::debug!(device_id, "API: resume_playback");
        self.command(
            self.request(Method::PUT, "me/player/play")
                .query(&[("device_id", device_id)]),
        )
        .await
    }

    pub async fn pause(&self, device_id: &str) -> Result<()> {
        tracing::debug!(device_id, "API: pause_playback");
        self.command(
            self.request(Method::PUT, "me/player/pause")
                .query(&[("device_id", device_id)]),
        )
        .await
    }

    pub async fn next(&self, device_id: &str) -> Result<()> {
        tracing::debug!(device_id, "API: next_track");
        self.command(
            self.request(Method::POST, "me/player/next")
                .query(&[("device_id", device_id)]),
        )
        .await
    }

    pub async fn previous(&self, device_id: &str) -> Result<()> {
        tracing::debug!(device_id, "API: previous_track");
        self.command(
            self.request(Method::POST, "me/player/previous")
                .query(&[("device_id", device_id)]),
        )
        .await
    }

    pub async fn seek(&self, device_id: &str, position_ms: u32) -> Result<()> {
        tracing::debug!(device_id, position_ms, "API: seek");
        self.command(
            self.request(Method::PUT, "me/player/seek")
                .query(&[("position_ms", position_ms.to_string().as_str()), ("device_id", device_id)]),
        )
        .await
    }

    pub async fn recommendations(
        &self,
        seed_tracks: &[String],
        seed_artists: &[String],
        limit: u32,
    ) -> Result<Vec<Track>> {
        log_api_request!("recommendations", tracks = seed_tracks.len(), artists = seed_artists.len());
        let mut query = vec![("limit", limit.to_string())];
        if !seed_tracks.is_empty() {
            query.push(("seed_tracks", seed_tracks.join(",")));
        }
        if !seed_artists.is_empty() {
            query.push(("seed_artists", seed_artists.join(",")));
        }
        let result = self
            .get_json::<RecommendationsResponse>(self.request(Method::GET, "recommendations").query(&query))
            .await
            .map(|body| body.map(|b| normalize_all(b.tracks)).unwrap_or_default());
        log_api_result!("recommendations", result);
        result
    }

    pub async fn top_tracks(&self, limit: u32, time_range: &str) -> Result<Vec<Track>> {
        let body: Option<Paging<WireTrack>> = self
            .get_json(
                self.request(Method::GET, "me/top/tracks")
                    .query(&[("limit", limit.to_string().as_str()), ("time_range", time_range)]),
            )
            .await?;
        Ok(body.map(|p| normalize_all(p.items)).unwrap_or_default())
    }

    pub async fn user_playlists(&self) -> Result<Vec<PlaylistItem>> {
        log_api_request!("user_playlists", limit = 50);
        let result = self
            .get_json::<Paging<WirePlaylist>>(self.request(Method::GET, "me/playlists").query(&[("limit", "50")]))
            .await
            .map(|body| {
                body.map(|p| {
                    p.items
                        .into_iter()
                        .map(|pl| PlaylistItem {
                            id: pl.id,
                            name: pl.name,
                            track_count: pl.tracks.map(|t| t.total).unwrap_or(0),
                        })
                        .collect()
                })
                .unwrap_or_default()
            });
        log_api_result!("user_playlists", result);
        result
    }

    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let body: Option<Paging<PlaylistTrackItem>> = self
            .get_json(
                self.request(Method::GET, &format!("playlists/{}/tracks", playlist_id))
                    .query(&[("limit", "100")]),
            )
            .await?;
        Ok(body
            .map(|p| normalize_all(p.items.into_iter().filter_map(|i| i.track)))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> SpotifyToken {
        SpotifyToken {
            access_token: "test-token".into(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
            scope: String::new(),
        }
    }

    fn client(server: &MockServer) -> SpotifyClient {
        SpotifyClient::new(token(), None).unwrap().with_base_url(&server.uri())
    }

    fn wire_track(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("Song {}", id),
            "artists": [{"name": "Artist", "id": "artist1"}],
            "album": {"name": "Album", "images": [{"url": "https://i.scdn.co/image/1", "height": 640, "width": 640}], "release_date": "2020-01-01"},
            "duration_ms": 200000,
            "uri": format!("spotify:track:{}", id),
            "preview_url": null,
            "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", id)}
        })
    }

    #[tokio::test]
    async fn search_sends_bearer_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "track"))
            .and(query_param("limit", "10"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracks": {"items": [wire_track("t1"), {"id": null, "name": "local file"}]}
            })))
            .mount(&server)
            .await;

        let tracks = client(&server).search("daft punk", SEARCH_LIMIT).await.unwrap();
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.uri, "spotify:track:t1");
        assert_eq!(track.artists[0].id.as_deref(), Some("artist1"));
        assert_eq!(track.cover_url(), Some("https://i.scdn.co/image/1"));
        assert_eq!(track.external_url.as_deref(), Some("https://open.spotify.com/track/t1"));
        assert!(track.video_id.is_none());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_its_own_variant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"status": 401, "message": "The access token expired"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).me().await.unwrap_err();
        assert!(matches!(err, SpotifyError::Unauthorized));
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn missing_device_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/pause"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).pause("dev").await.unwrap_err();
        assert!(matches!(err, SpotifyError::NoDevice));
    }

    #[tokio::test]
    async fn play_targets_device_with_uris() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(query_param("device_id", "dev1"))
            .and(body_json(serde_json::json!({"uris": ["spotify:track:t1"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .play_uris("dev1", &["spotify:track:t1".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn idle_player_reports_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert!(client(&server).current_playback().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn playback_state_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "is_playing": true,
                "progress_ms": 42000,
                "item": wire_track("t2"),
                "device": {"id": "dev1", "name": "laptop", "is_active": true}
            })))
            .mount(&server)
            .await;

        let playback = client(&server).current_playback().await.unwrap().unwrap();
        assert!(playback.is_playing);
        assert_eq!(playback.progress_ms, 42000);
        assert_eq!(playback.track.unwrap().id, "t2");
        assert_eq!(playback.device.unwrap().name, "laptop");
    }

    #[tokio::test]
    async fn recommendations_join_seeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommendations"))
            .and(query_param("seed_tracks", "a,b"))
            .and(query_param("seed_artists", "x"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracks": [wire_track("r1"), wire_track("r2")]
            })))
            .mount(&server)
            .await;

        let tracks = client(&server)
            .recommendations(&["a".into(), "b".into()], &["x".into()], 20)
            .await
            .unwrap();
        assert_eq!(tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn playlist_tracks_skip_empty_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists/pl1/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"track": wire_track("t1")}, {"track": null}]
            })))
            .mount(&server)
            .await;

        let tracks = client(&server).playlist_tracks("pl1").await.unwrap();
        assert_eq!(tracks.len(), 1);
    }

    #[tokio::test]
    async fn user_playlists_carry_track_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "pl1", "name": "Road trip", "tracks": {"total": 12}}]
            })))
            .mount(&server)
            .await;

        let playlists = client(&server).user_playlists().await.unwrap();
        assert_eq!(playlists, vec![PlaylistItem { id: "pl1".into(), name: "Road trip".into(), track_count: 12 }]);
    }
}
