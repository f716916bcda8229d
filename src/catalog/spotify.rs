//! Spotify catalog: Web API search, seeded recommendations, top tracks

use anyhow::Result;
use async_trait::async_trait;

use crate::library::{count_artists, ranked};
use crate::model::{BackendKind, SEARCH_LIMIT, SpotifyClient, Track};
use super::{Catalog, ROW_SIZE, Seeds};

const RADIO_SIZE: u32 = 20;

pub struct SpotifyCatalog {
    client: SpotifyClient,
}

impl SpotifyCatalog {
    pub fn new(client: SpotifyClient) -> Self {
        Self { client }
    }
}

/// Spotify ids only; tracks played through the other backend cannot seed Spotify
fn spotify_ids<'a>(tracks: impl IntoIterator<Item = &'a Track>, limit: usize) -> Vec<String> {
    tracks
        .into_iter()
        .filter(|t| t.source() == BackendKind::Spotify)
        .map(|t| t.id.clone())
        .take(limit)
        .collect()
}

#[async_trait]
impl Catalog for SpotifyCatalog {
    fn kind(&self) -> BackendKind {
        BackendKind::Spotify
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        Ok(self.client.search(query, SEARCH_LIMIT).await?)
    }

    async fn radio(&self, seed: &Track) -> Result<Vec<Track>> {
        Ok(self
            .client
            .recommendations(&[seed.id.clone()], &[], RADIO_SIZE)
            .await?)
    }

    async fn recommend(&self, seeds: &Seeds) -> Result<Vec<Track>> {
        let (seed_tracks, seed_artists) = match seeds {
            Seeds::History(entries) => {
                let counts = count_artists(entries.iter().map(|e| e.artists.as_slice()), |a| a.id.clone());
                let artists: Vec<String> = ranked(counts).into_iter().take(2).map(|(id, _)| id).collect();
                let tracks: Vec<String> = entries.iter().take(3).map(|e| e.track_id.clone()).collect();
                (tracks, artists)
            }
            Seeds::Liked(liked) => (spotify_ids(liked, 5), vec![]),
        };

        if seed_tracks.is_empty() && seed_artists.is_empty() {
            return Ok(vec![]);
        }
        Ok(self
            .client
            .recommendations(&seed_tracks, &seed_artists, ROW_SIZE as u32)
            .await?)
    }

    async fn trending(&self) -> Result<Vec<Track>> {
        Ok(self.client.top_tracks(ROW_SIZE as u32, "short_term").await?)
    }
}
