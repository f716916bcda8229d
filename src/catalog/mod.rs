//! Catalog module - search and recommendations per backend
//!
//! - `spotify`: Web API search, seeded recommendations, top tracks
//! - `ytmusic`: free-backend search and related-track radio
//!
//! [`for_you`] builds the home row with the same fallback chain for both:
//! listening history first, then liked songs, then whatever is popular.

mod spotify;
mod ytmusic;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{BackendKind, ListeningHistoryEntry, Track};

pub use spotify::SpotifyCatalog;
pub use ytmusic::YtMusicCatalog;

/// Number of tracks in a home row
pub const ROW_SIZE: usize = 6;

/// Mood mixes offered on the home screen; each one is a search for "{mood} music"
pub const MOODS: [&str; 8] = ["chill", "workout", "focus", "party", "late night", "morning", "study", "road trip"];

/// What a recommendation is seeded from
#[derive(Clone, Debug, PartialEq)]
pub enum Seeds {
    /// Most recent first
    History(Vec<ListeningHistoryEntry>),
    Liked(Vec<Track>),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn search(&self, query: &str) -> Result<Vec<Track>>;

    /// Tracks that go well after `seed`; may or may not include the seed itself
    async fn radio(&self, seed: &Track) -> Result<Vec<Track>>;

    async fn recommend(&self, seeds: &Seeds) -> Result<Vec<Track>>;

    async fn trending(&self) -> Result<Vec<Track>>;

    /// Last resort for the home row when nothing personal is known
    async fn popular(&self) -> Result<Vec<Track>> {
        self.trending().await
    }
}

/// Home-screen recommendations: history, then liked songs, then what is popular
pub async fn for_you(
    catalog: &dyn Catalog,
    history: Vec<ListeningHistoryEntry>,
    liked: Vec<Track>,
) -> Vec<Track> {
    if !history.is_empty() {
        match catalog.recommend(&Seeds::History(history)).await {
            Ok(tracks) if !tracks.is_empty() => return truncate(tracks),
            Ok(_) => tracing::debug!("History seeds gave nothing, trying liked songs"),
            Err(e) => tracing::warn!(error = %e, "History-based recommendations failed"),
        }
    }

    if !liked.is_empty() {
        match catalog.recommend(&Seeds::Liked(liked)).await {
            Ok(tracks) if !tracks.is_empty() => return truncate(tracks),
            Ok(_) => tracing::debug!("Liked seeds gave nothing, using popular tracks"),
            Err(e) => tracing::warn!(error = %e, "Liked-based recommendations failed"),
        }
    }

    match catalog.popular().await {
        Ok(tracks) => truncate(tracks),
        Err(e) => {
            tracing::warn!(error = %e, "Popular tracks fetch failed");
            vec![]
        }
    }
}

fn truncate(mut tracks: Vec<Track>) -> Vec<Track> {
    tracks.truncate(ROW_SIZE);
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_track;
    use anyhow::anyhow;
    use chrono::Utc;

    fn history() -> Vec<ListeningHistoryEntry> {
        vec![ListeningHistoryEntry::from_track(&test_track("h"), Utc::now())]
    }

    #[tokio::test]
    async fn history_comes_first() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_recommend()
            .withf(|seeds| matches!(seeds, Seeds::History(_)))
            .times(1)
            .returning(|_| Ok((0..10).map(|i| test_track(&i.to_string())).collect()));
        catalog.expect_popular().never();

        let tracks = for_you(&catalog, history(), vec![test_track("l")]).await;
        assert_eq!(tracks.len(), ROW_SIZE);
    }

    #[tokio::test]
    async fn failed_history_falls_back_to_liked() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_recommend()
            .withf(|seeds| matches!(seeds, Seeds::History(_)))
            .returning(|_| Err(anyhow!("bad seeds")));
        catalog
            .expect_recommend()
            .withf(|seeds| matches!(seeds, Seeds::Liked(_)))
            .returning(|_| Ok(vec![test_track("from-liked")]));

        let tracks = for_you(&catalog, history(), vec![test_track("l")]).await;
        assert_eq!(tracks[0].id, "from-liked");
    }

    #[tokio::test]
    async fn nothing_known_means_popular() {
        let mut catalog = MockCatalog::new();
        catalog.expect_recommend().never();
        catalog.expect_trending().never();
        catalog.expect_popular().returning(|| Ok(vec![test_track("hit")]));

        let tracks = for_you(&catalog, vec![], vec![]).await;
        assert_eq!(tracks[0].id, "hit");
    }

    #[tokio::test]
    async fn everything_failing_gives_empty_row() {
        let mut catalog = MockCatalog::new();
        catalog.expect_recommend().returning(|_| Ok(vec![]));
        catalog.expect_popular().returning(|| Err(anyhow!("offline")));

        assert!(for_you(&catalog, vec![], vec![test_track("l")]).await.is_empty());
    }
}
