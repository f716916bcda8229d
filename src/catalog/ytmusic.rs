//! Free-backend catalog: artist searches for recommendations, related tracks for radio

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::library::{count_artists, ranked};
use crate::model::{BackendKind, Track, YtMusicClient};
use super::{Catalog, Seeds};

const TRENDING_QUERY: &str = "top hits 2024";
const FALLBACK_QUERY: &str = "trending music 2024";

pub struct YtMusicCatalog {
    client: YtMusicClient,
}

impl YtMusicCatalog {
    pub fn new(client: YtMusicClient) -> Self {
        Self { client }
    }
}

/// Artist to search for: one of the three most played, or the lead artist of a random liked song
fn seed_artist(seeds: &Seeds) -> Option<String> {
    let mut rng = rand::thread_rng();
    match seeds {
        Seeds::History(entries) => {
            let counts = count_artists(entries.iter().map(|e| e.artists.as_slice()), |a| {
                Some(a.name.clone()).filter(|n| !n.is_empty())
            });
            let top: Vec<String> = ranked(counts).into_iter().take(3).map(|(name, _)| name).collect();
            top.choose(&mut rng).cloned()
        }
        Seeds::Liked(liked) => liked
            .choose(&mut rng)
            .map(|t| t.primary_artist().to_string())
            .filter(|n| !n.is_empty()),
    }
}

#[async_trait]
impl Catalog for YtMusicCatalog {
    fn kind(&self) -> BackendKind {
        BackendKind::YtMusic
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        Ok(self.client.search(query).await?)
    }

    async fn radio(&self, seed: &Track) -> Result<Vec<Track>> {
        Ok(self.client.recommendations(seed.stream_id()).await?)
    }

    async fn recommend(&self, seeds: &Seeds) -> Result<Vec<Track>> {
        let Some(artist) = seed_artist(seeds) else {
            return Ok(vec![]);
        };
        tracing::debug!(artist = %artist, "Recommending from artist search");
        Ok(self.client.search(&artist).await?)
    }

    async fn trending(&self) -> Result<Vec<Track>> {
        Ok(self.client.search(TRENDING_QUERY).await?)
    }

    async fn popular(&self) -> Result<Vec<Track>> {
        Ok(self.client.search(FALLBACK_QUERY).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artist, ListeningHistoryEntry, test_track};
    use chrono::Utc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn played(artist: &str, times: usize) -> Vec<ListeningHistoryEntry> {
        let mut track = test_track(artist);
        track.artists = vec![Artist::named(artist)];
        (0..times).map(|_| ListeningHistoryEntry::from_track(&track, Utc::now())).collect()
    }

    #[test]
    fn history_seed_is_one_of_top_three() {
        let mut history = played("A", 5);
        history.extend(played("B", 4));
        history.extend(played("C", 3));
        history.extend(played("D", 1));
        let seeds = Seeds::History(history);

        for _ in 0..20 {
            let artist = seed_artist(&seeds).unwrap();
            assert!(["A", "B", "C"].contains(&artist.as_str()), "picked {}", artist);
        }
    }

    #[test]
    fn liked_seed_is_a_lead_artist() {
        let seeds = Seeds::Liked(vec![test_track("x"), test_track("y")]);
        let artist = seed_artist(&seeds).unwrap();
        assert!(artist == "Artist x" || artist == "Artist y");
    }

    #[test]
    fn no_artists_no_seed() {
        let mut track = test_track("x");
        track.artists.clear();
        assert!(seed_artist(&Seeds::Liked(vec![track])).is_none());
        assert!(seed_artist(&Seeds::History(vec![])).is_none());
    }

    async fn mount_search(server: &MockServer, query: &str, id: &str) {
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracks": {"items": [{"id": id, "name": id, "artists": [{"name": "Someone"}], "duration_ms": 1000}]}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn trending_row_and_fallback_use_different_searches() {
        let server = MockServer::start().await;
        mount_search(&server, "top hits 2024", "hit").await;
        mount_search(&server, "trending music 2024", "trend").await;
        let catalog = YtMusicCatalog::new(YtMusicClient::new(&server.uri(), Duration::from_secs(1)).unwrap());

        assert_eq!(catalog.trending().await.unwrap()[0].id, "hit");
        assert_eq!(catalog.popular().await.unwrap()[0].id, "trend");
    }
}
