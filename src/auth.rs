//! Spotify login: OAuth 2.0 authorization code flow with PKCE
//!
//! The browser is sent to the authorize page; the redirect is caught by a
//! one-shot HTTP listener on the loopback interface. Tokens are cached in the
//! library store under `spotify_token` and refreshed before they expire.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::library::{Store, TOKEN_KEY};

pub const AUTH_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
pub const SCOPES: &str = "streaming user-read-email user-read-private user-read-playback-state user-modify-playback-state user-top-read playlist-read-private";

const CALLBACK_PATH: &str = "/login";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);
/// Refresh when less than this many seconds remain
const REFRESH_MARGIN_SECS: i64 = 300;

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Nova</title></head>
<body><h1>Authentication Successful!</h1><p>You can return to the terminal.</p><script>window.close();</script></body>
</html>
"#;

/// A Spotify access token as cached on disk
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotifyToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: String,
}

impl SpotifyToken {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        (self.expires_at - now).num_seconds() < REFRESH_MARGIN_SECS
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> SpotifyToken {
        SpotifyToken {
            access_token: self.access_token,
            // Spotify may omit the refresh token on refresh; keep the old one then
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
            scope: self.scope.unwrap_or_default(),
        }
    }
}

/// PKCE code verifier plus the CSRF state sent along with it
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        // 48 random bytes encode to 64 characters, inside the 43-128 range
        let mut verifier_bytes = [0u8; 48];
        rng.fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill_bytes(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// BASE64URL(SHA256(verifier))
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Query parameters Spotify appends to the redirect
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Parse the request line of the redirect, e.g. `GET /login?code=..&state=.. HTTP/1.1`.
/// Returns `None` for requests to other paths (favicon and friends).
fn parse_callback(request_line: &str) -> Option<CallbackParams> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(params)
}

#[derive(Clone)]
pub struct Authenticator {
    client_id: String,
    redirect_port: u16,
    auth_url: String,
    token_url: String,
    http: reqwest::Client,
    store: Store,
}

impl Authenticator {
    pub fn new(client_id: &str, redirect_port: u16, store: Store) -> Result<Self> {
        if client_id.trim().is_empty() {
            bail!("No Spotify client id configured (set spotify.client_id or NOVA_SPOTIFY_CLIENT_ID)");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client_id: client_id.trim().to_string(),
            redirect_port,
            auth_url: AUTH_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            http,
            store,
        })
    }

    #[cfg(test)]
    fn with_endpoints(mut self, auth_url: &str, token_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.token_url = token_url.to_string();
        self
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.redirect_port, CALLBACK_PATH)
    }

    pub fn authorize_url(&self, pkce: &PkceVerifier) -> Result<Url> {
        let mut url = Url::parse(&self.auth_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", SCOPES)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &pkce.challenge())
            .append_pair("redirect_uri", &self.redirect_uri())
            .append_pair("state", pkce.state());
        Ok(url)
    }

    pub fn cached_token(&self) -> Option<SpotifyToken> {
        self.store.read_opt(TOKEN_KEY)
    }

    pub fn save_token(&self, token: &SpotifyToken) -> Result<()> {
        self.store.write(TOKEN_KEY, token)
    }

    /// Drop the cached token so the next start (or re-login) asks again
    pub fn clear_token(&self) -> Result<()> {
        tracing::info!("Clearing cached Spotify token");
        self.store.remove(TOKEN_KEY)
    }

    /// Cached token if still usable, refreshed token if it can be refreshed, browser login otherwise
    pub async fn obtain_token(&self) -> Result<SpotifyToken> {
        if let Some(token) = self.cached_token() {
            if !token.needs_refresh(Utc::now()) {
                tracing::info!("Using cached Spotify token");
                return Ok(token);
            }
            if token.refresh_token.is_some() {
                match self.refresh(&token).await {
                    Ok(token) => return Ok(token),
                    Err(e) => tracing::warn!(error = %e, "Cached refresh token failed, re-authenticating"),
                }
            }
        } else {
            tracing::info!("No cached token found, starting browser authentication");
        }
        self.login().await
    }

    pub async fn login(&self) -> Result<SpotifyToken> {
        let pkce = PkceVerifier::new();
        let listener = TcpListener::bind(("127.0.0.1", self.redirect_port))
            .await
            .with_context(|| format!("failed to listen on port {} for the login redirect", self.redirect_port))?;

        let url = self.authorize_url(&pkce)?;
        tracing::info!("Starting browser-based OAuth flow");
        if let Err(e) = open::that(url.as_str()) {
            tracing::warn!(error = %e, "Could not open browser");
            eprintln!("Open this URL to log in to Spotify:\n{}", url);
        }

        let code = tokio::time::timeout(LOGIN_TIMEOUT, Self::await_code(&listener, pkce.state()))
            .await
            .map_err(|_| anyhow!("Timed out waiting for Spotify login"))??;

        let token = self.exchange_code(&code, &pkce).await?;
        tracing::info!("Browser authentication completed successfully");
        Ok(token)
    }

    async fn await_code(listener: &TcpListener, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, _) = listener.accept().await?;
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await?;
            let request = String::from_utf8_lossy(&buf[..n]);
            let request_line = request.lines().next().unwrap_or_default();

            let Some(params) = parse_callback(request_line) else {
                let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
                continue;
            };

            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
                RESPONSE.len(),
                RESPONSE
            );
            let _ = stream.write_all(reply.as_bytes()).await;

            if let Some(error) = params.error {
                bail!("Spotify login was refused: {}", error);
            }
            if params.state.as_deref() != Some(expected_state) {
                bail!("Login redirect carried an unexpected state parameter");
            }
            return params.code.ok_or_else(|| anyhow!("Login redirect had no authorization code"));
        }
    }

    pub async fn exchange_code(&self, code: &str, pkce: &PkceVerifier) -> Result<SpotifyToken> {
        let redirect_uri = self.redirect_uri();
        let form = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", pkce.verifier()),
        ];
        let token = self.request_token(&form, None).await?;
        self.save_token(&token)?;
        Ok(token)
    }

    pub async fn refresh(&self, token: &SpotifyToken) -> Result<SpotifyToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| anyhow!("No refresh token available"))?;
        let form = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let refreshed = self.request_token(&form, token.refresh_token.clone()).await?;
        self.save_token(&refreshed)?;
        tracing::info!("Token refreshed successfully");
        Ok(refreshed)
    }

    async fn request_token(&self, form: &[(&str, &str)], previous_refresh: Option<String>) -> Result<SpotifyToken> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token request failed ({}): {}", status.as_u16(), body);
        }
        let body: TokenResponse = response.json().await.context("invalid token response")?;
        Ok(body.into_token(previous_refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn authenticator(dir: &std::path::Path) -> Authenticator {
        Authenticator::new("client123", 8898, Store::open(dir).unwrap()).unwrap()
    }

    #[test]
    fn challenge_is_s256_of_verifier() {
        let pkce = PkceVerifier::new();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier().as_bytes()));
        assert_eq!(pkce.challenge(), expected);
        assert_eq!(pkce.state().len(), 22);
        assert_eq!(pkce.verifier().len(), 64);
        assert_ne!(PkceVerifier::new().state(), pkce.state());
    }

    #[test]
    fn empty_client_id_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(Authenticator::new("  ", 8898, Store::open(dir.path()).unwrap()).is_err());
    }

    #[test]
    fn authorize_url_carries_pkce_parameters() {
        let dir = tempdir().unwrap();
        let auth = authenticator(dir.path());
        let pkce = PkceVerifier::new();
        let url = auth.authorize_url(&pkce).unwrap();
        let pairs: std::collections::HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client123");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"], pkce.challenge());
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8898/login");
        assert_eq!(pairs["state"], pkce.state());
        assert!(pairs["scope"].contains("user-modify-playback-state"));
    }

    #[test]
    fn callback_parsing() {
        let params = parse_callback("GET /login?code=abc&state=xyz HTTP/1.1").unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));

        let denied = parse_callback("GET /login?error=access_denied&state=xyz HTTP/1.1").unwrap();
        assert_eq!(denied.error.as_deref(), Some("access_denied"));

        assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback("").is_none());
    }

    #[test]
    fn refresh_margin() {
        let now = Utc::now();
        let token = SpotifyToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: now + chrono::Duration::seconds(200),
            scope: String::new(),
        };
        assert!(token.needs_refresh(now));
        assert!(!token.needs_refresh(now - chrono::Duration::seconds(600)));
    }

    #[tokio::test]
    async fn code_exchange_caches_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-1",
                "scope": "streaming"
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let auth = authenticator(dir.path())
            .with_endpoints(&format!("{}/authorize", server.uri()), &format!("{}/api/token", server.uri()));
        let token = auth.exchange_code("the-code", &PkceVerifier::new()).await.unwrap();

        assert_eq!(token.access_token, "access-1");
        assert_eq!(auth.cached_token(), Some(token));
    }

    #[tokio::test]
    async fn refresh_keeps_previous_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-2",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let auth = authenticator(dir.path())
            .with_endpoints(&format!("{}/authorize", server.uri()), &format!("{}/api/token", server.uri()));
        let stale = SpotifyToken {
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            expires_at: Utc::now(),
            scope: String::new(),
        };
        auth.save_token(&stale).unwrap();

        let token = auth.obtain_token().await.unwrap();
        assert_eq!(token.access_token, "access-2");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn failed_exchange_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let auth = authenticator(dir.path())
            .with_endpoints(&format!("{}/authorize", server.uri()), &format!("{}/api/token", server.uri()));
        let err = auth.exchange_code("bad", &PkceVerifier::new()).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(auth.cached_token().is_none());
    }

    #[test]
    fn clearing_removes_cached_token() {
        let dir = tempdir().unwrap();
        let auth = authenticator(dir.path());
        auth.save_token(&SpotifyToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Utc::now(),
            scope: String::new(),
        })
        .unwrap();
        auth.clear_token().unwrap();
        assert!(auth.cached_token().is_none());
    }
}
