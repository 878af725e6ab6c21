pub mod config;
pub mod error;
pub mod geo;
pub mod lastfm;
pub mod models;
pub mod request;
pub mod search;
pub mod ticketmaster;

use std::sync::Arc;

use anyhow::Context;

pub use config::{AppConfig, ConfigError};
pub use error::SearchError;
pub use geo::{GeoResolver, ResolvedLocation};
pub use models::{CapacityClass, Coordinate, Event, EventLocation, SimilarArtist};
pub use request::{RequestError, SearchRequest, SortOrder};
pub use search::{
    ArtistMetadataSource, EventSource, LocationResolver, SearchConfig, SearchOutcome,
    SearchPipeline,
};

use lastfm::LastfmClient;
use ticketmaster::TicketmasterClient;

const USER_AGENT: &str = "concert-finder/0.1";

/// Entry point for the surrounding application: one instance per set of
/// credentials, one `search` call per user request.
pub struct ConcertFinder {
    pipeline: SearchPipeline,
}

impl ConcertFinder {
    /// Builds the production pipeline. The Last.fm key is optional; without
    /// it, similar-artist expansion and popularity ordering are skipped.
    pub fn new(
        ticketmaster_api_key: String,
        lastfm_api_key: Option<String>,
        config: SearchConfig,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")?;

        let events: Arc<dyn EventSource> = Arc::new(TicketmasterClient::new(
            client.clone(),
            ticketmaster_api_key,
        ));
        let metadata: Option<Arc<dyn ArtistMetadataSource>> = lastfm_api_key
            .map(|key| Arc::new(LastfmClient::new(client.clone(), key)) as Arc<dyn ArtistMetadataSource>);
        let locations: Arc<dyn LocationResolver> = Arc::new(GeoResolver::new(client));

        Ok(Self {
            pipeline: SearchPipeline::new(events, metadata, locations, config),
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        self.pipeline.search(request).await
    }
}
