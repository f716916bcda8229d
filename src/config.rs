//! Configuration module - `config.toml` plus environment overrides
//!
//! The file lives at `<config_dir>/nova/config.toml` and is written with
//! defaults the first time nova starts. `NOVA_*` variables win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_BACKEND_URL;

const CONFIG_FILE: &str = "config.toml";

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_redirect_port() -> u16 {
    8898
}

fn default_health_timeout_ms() -> u64 {
    3_000
}

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_share_base_url() -> String {
    "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// Client id of a Spotify app with `http://127.0.0.1:{redirect_port}/login` registered
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_port: default_redirect_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Start on the free backend instead of Spotify (a stored source choice overrides this)
    #[serde(default)]
    pub use_ytmusic: bool,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    /// Where the library and logs go; defaults to `<data_dir>/nova`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            use_ytmusic: false,
            spotify: SpotifyConfig::default(),
            data_dir: None,
            health_timeout_ms: default_health_timeout_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            share_base_url: default_share_base_url(),
        }
    }
}

impl AppConfig {
    /// Load from the default location, creating it on first run, then apply the environment
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        let mut config = load_or_init(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay `NOVA_*` variables; `lookup` is `std::env::var` outside tests
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("NOVA_BACKEND_URL").filter(|v| !v.is_empty()) {
            self.backend_url = url;
        }
        if let Some(id) = lookup("NOVA_SPOTIFY_CLIENT_ID").filter(|v| !v.is_empty()) {
            self.spotify.client_id = id;
        }
        if let Some(flag) = lookup("NOVA_USE_YTMUSIC") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.use_ytmusic = true,
                "0" | "false" | "no" | "off" => self.use_ytmusic = false,
                other => tracing::warn!(value = other, "Ignoring unrecognised NOVA_USE_YTMUSIC"),
            }
        }
        if let Some(dir) = lookup("NOVA_DATA_DIR").filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("nova")
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn has_spotify_app(&self) -> bool {
        !self.spotify.client_id.trim().is_empty()
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nova")
        .join(CONFIG_FILE)
}

/// Read `path`, or write the defaults there when it does not exist yet
pub fn load_or_init(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let config = AppConfig::default();
        write_config(path, &config)?;
        return Ok(config);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed parsing config {}", path.display()))
}

pub fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(config).context("failed serialising config")?;
    std::fs::write(path, raw).with_context(|| format!("failed writing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nova").join(CONFIG_FILE);

        let config = load_or_init(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(load_or_init(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "use_ytmusic = true\n[spotify]\nclient_id = \"abc\"\n").unwrap();

        let config = load_or_init(&path).unwrap();
        assert!(config.use_ytmusic);
        assert_eq!(config.spotify.client_id, "abc");
        assert_eq!(config.spotify.redirect_port, 8898);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.search_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "backend_url = [").unwrap();
        assert!(load_or_init(&path).is_err());
    }

    #[test]
    fn environment_wins() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NOVA_BACKEND_URL", "http://music.lan:5001"),
            ("NOVA_SPOTIFY_CLIENT_ID", "from-env"),
            ("NOVA_USE_YTMUSIC", "yes"),
            ("NOVA_DATA_DIR", "/tmp/nova-data"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend_url, "http://music.lan:5001");
        assert!(config.has_spotify_app());
        assert!(config.use_ytmusic);
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/nova-data/logs"));
    }

    #[test]
    fn unknown_flag_value_is_ignored() {
        let mut config = AppConfig { use_ytmusic: true, ..AppConfig::default() };
        config.apply_env(|key| (key == "NOVA_USE_YTMUSIC").then(|| "maybe".to_string()));
        assert!(config.use_ytmusic);
    }
}
