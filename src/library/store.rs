//! Key/value persistence: one JSON document per key

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

pub const LIKED_SONGS_KEY: &str = "nova_liked_songs";
pub const PLAYLISTS_KEY: &str = "nova_playlists";
pub const HISTORY_KEY: &str = "nova_listening_history";
pub const THEME_KEY: &str = "bg_theme";
pub const SOURCE_KEY: &str = "nova_music_source";
pub const TOKEN_KEY: &str = "spotify_token";

/// File-system events for a key we wrote ourselves within this window are not
/// reported as external changes.
const SELF_WRITE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written by this process
    Local,
    /// Rewritten by another process sharing the data directory
    External,
}

/// Published after every change to a stored key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub origin: ChangeOrigin,
}

#[derive(Clone)]
pub struct Store {
    root: PathBuf,
    events: broadcast::Sender<StorageEvent>,
    recent_writes: Arc<Mutex<HashMap<String, Instant>>>,
}

/// Keeps the file-system watcher alive; dropping it stops external notifications
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create data directory {}", root.display()))?;
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            root,
            events,
            recent_writes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    /// Read a key, treating a missing or corrupted document as the default value
    pub fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.read_opt(key).unwrap_or_default()
    }

    pub fn read_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read stored value");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored value is corrupted, treating as empty");
                None
            }
        }
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value)?;
        let path = self.path(key);
        let tmp = self.root.join(format!("{}.json.tmp", key));

        self.mark_written(key);
        fs::write(&tmp, content).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("failed to replace {}", path.display()))?;

        tracing::trace!(key, "Stored value written");
        self.publish(key, ChangeOrigin::Local);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.mark_written(key);
        match fs::remove_file(self.path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.publish(key, ChangeOrigin::Local);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn publish(&self, key: &str, origin: ChangeOrigin) {
        // No subscribers is fine
        let _ = self.events.send(StorageEvent { key: key.to_string(), origin });
    }

    fn mark_written(&self, key: &str) {
        if let Ok(mut writes) = self.recent_writes.lock() {
            writes.insert(key.to_string(), Instant::now());
        }
    }

    fn written_recently(&self, key: &str) -> bool {
        self.recent_writes
            .lock()
            .ok()
            .and_then(|writes| writes.get(key).map(|at| at.elapsed() < SELF_WRITE_WINDOW))
            .unwrap_or(false)
    }

    /// Watch the data directory and publish external changes
    pub fn watch(&self) -> Result<StoreWatcher> {
        let store = self.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Storage watcher error");
                    return;
                }
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            for path in &event.paths {
                let Some(key) = key_for_path(path) else { continue };
                if store.written_recently(&key) {
                    continue;
                }
                tracing::debug!(key = %key, "Stored value changed by another instance");
                store.publish(&key, ChangeOrigin::External);
            }
        })?;

        watcher.watch(&self.root, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.root.display(), "Watching library for external changes");
        Ok(StoreWatcher { _watcher: watcher })
    }
}

fn key_for_path(path: &Path) -> Option<String> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_key_reads_as_default() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let value: Vec<String> = store.read("nothing_here");
        assert!(value.is_empty());
    }

    #[test]
    fn corrupted_key_reads_as_default() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let value: Vec<String> = store.read("broken");
        assert!(value.is_empty());
    }

    #[test]
    fn written_value_reads_back() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.write("names", &vec!["a", "b"]).unwrap();
        let value: Vec<String> = store.read("names");
        assert_eq!(value, vec!["a", "b"]);
        assert!(!dir.path().join("names.json.tmp").exists());
    }

    #[test]
    fn writes_are_broadcast_as_local() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let mut rx = store.subscribe();
        store.write(THEME_KEY, "blue").unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, THEME_KEY);
        assert_eq!(event.origin, ChangeOrigin::Local);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.write(TOKEN_KEY, "t").unwrap();
        store.remove(TOKEN_KEY).unwrap();
        store.remove(TOKEN_KEY).unwrap();
        assert!(store.read_opt::<String>(TOKEN_KEY).is_none());
    }

    #[test]
    fn only_json_documents_map_to_keys() {
        assert_eq!(key_for_path(Path::new("/x/nova_playlists.json")).as_deref(), Some("nova_playlists"));
        assert_eq!(key_for_path(Path::new("/x/nova_playlists.json.tmp")), None);
        assert_eq!(key_for_path(Path::new("/x/logs")), None);
    }
}
