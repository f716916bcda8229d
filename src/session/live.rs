use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::catalog::{SpotifyCatalog, YtMusicCatalog};
use crate::model::{BackendKind, SpotifyClient, YtMusicClient};
use crate::player::{AdapterEvents, RodioElement, SpotifyAdapter, StreamAdapter};
use super::{AdapterFactory, Mounted};

/// Builds real adapters. The Spotify client is only present while logged in.
#[derive(Clone)]
pub struct LiveAdapters {
    ytmusic: YtMusicClient,
    spotify: Arc<RwLock<Option<SpotifyClient>>>,
}

impl LiveAdapters {
    pub fn new(ytmusic: YtMusicClient, spotify: Option<SpotifyClient>) -> Self {
        Self { ytmusic, spotify: Arc::new(RwLock::new(spotify)) }
    }

    pub async fn set_spotify(&self, client: Option<SpotifyClient>) {
        *self.spotify.write().await = client;
    }

    pub async fn spotify(&self) -> Option<SpotifyClient> {
        self.spotify.read().await.clone()
    }
}

#[async_trait]
impl AdapterFactory for LiveAdapters {
    async fn mount(&self, backend: BackendKind, events: AdapterEvents) -> Result<Mounted> {
        match backend {
            BackendKind::Spotify => {
                let Some(client) = self.spotify().await else {
                    bail!("Not logged in to Spotify");
                };
                Ok(Mounted {
                    adapter: Arc::new(SpotifyAdapter::start(client.clone(), events)),
                    catalog: Arc::new(SpotifyCatalog::new(client)),
                })
            }
            BackendKind::YtMusic => {
                let (element, media_events) = RodioElement::spawn()?;
                Ok(Mounted {
                    adapter: Arc::new(StreamAdapter::new(
                        self.ytmusic.clone(),
                        Arc::new(element),
                        media_events,
                        events,
                    )),
                    catalog: Arc::new(YtMusicCatalog::new(self.ytmusic.clone())),
                })
            }
        }
    }
}
