//! In-memory copy of the liked track ids so every frame can mark liked rows
//! without re-reading the library document

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct LikedSongsCache {
    liked_ids: Arc<RwLock<HashSet<String>>>,
}

impl LikedSongsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set, e.g. after the library changed on disk
    pub async fn update(&self, track_ids: impl IntoIterator<Item = String>) {
        let mut liked_ids = self.liked_ids.write().await;
        *liked_ids = track_ids.into_iter().collect();
    }

    pub async fn is_liked(&self, track_id: &str) -> bool {
        self.liked_ids.read().await.contains(track_id)
    }

    pub async fn set(&self, track_id: &str, liked: bool) {
        let mut liked_ids = self.liked_ids.write().await;
        if liked {
            liked_ids.insert(track_id.to_string());
        } else {
            liked_ids.remove(track_id);
        }
    }

    pub async fn snapshot(&self) -> HashSet<String> {
        self.liked_ids.read().await.clone()
    }
}
