//! Error types for the two backend clients

use thiserror::Error;

/// Errors from the self-hosted search/stream backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server is offline or unreachable
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Server returned an error response
    #[error("Backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Invalid server URL
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Errors from the Spotify Web API
#[derive(Error, Debug)]
pub enum SpotifyError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Token rejected; the cached token must be dropped and the user logged in again
    #[error("Spotify rejected the access token (401)")]
    Unauthorized,

    #[error("No active device found (404)")]
    NoDevice,

    #[error("Spotify API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse Spotify response: {0}")]
    Parse(String),
}

impl SpotifyError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SpotifyError::Unauthorized => Some(401),
            SpotifyError::NoDevice => Some(404),
            SpotifyError::Api { status, .. } => Some(*status),
            SpotifyError::Request(e) => e.status().map(|s| s.as_u16()),
            SpotifyError::Parse(_) => None,
        }
    }
}
