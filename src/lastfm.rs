use std::time::{Duration, Instant};

use reqwest::{Client, Url};
use serde::{Deserialize, Deserializer};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;

use crate::models::SimilarArtist;

const LASTFM_URL: &str = "http://ws.audioscrobbler.com/2.0/";
const RATE_LIMIT_WINDOW_MS: u64 = 250;

#[derive(Debug, thiserror::Error)]
pub enum LastfmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("status {0}: {1}")]
    Status(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct SimilarResponse {
    #[serde(rename = "similarartists")]
    similar_artists: Option<SimilarList>,
}

#[derive(Debug, Deserialize)]
struct SimilarList {
    #[serde(default)]
    artist: Vec<SimilarDoc>,
}

#[derive(Debug, Deserialize)]
struct SimilarDoc {
    name: String,
    #[serde(rename = "match", deserialize_with = "match_score", default)]
    match_score: f64,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    artist: Option<InfoArtist>,
}

#[derive(Debug, Deserialize)]
struct InfoArtist {
    stats: Option<InfoStats>,
}

#[derive(Debug, Deserialize)]
struct InfoStats {
    listeners: Option<String>,
}

/// Last.fm encodes match scores as strings ("0.85") in JSON; accept both.
fn match_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(value) => Ok(value),
        Repr::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Music-metadata API client: similar artists for expansion, listener
/// counts for popularity ordering. Calls are spaced out by a shared
/// last-request gate.
pub struct LastfmClient {
    client: Client,
    api_key: String,
    base_url: String,
    last_request: AsyncMutex<Option<Instant>>,
}

impl LastfmClient {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: LASTFM_URL.to_string(),
            last_request: AsyncMutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
            last_request: AsyncMutex::new(None),
        }
    }

    pub async fn similar_artists(
        &self,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<SimilarArtist>, LastfmError> {
        let payload = self
            .call(&[
                ("method", "artist.getsimilar"),
                ("artist", artist),
                ("limit", &limit.to_string()),
            ])
            .await?;
        let mut similar = parse_similar_payload(&payload)?;
        similar.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        similar.truncate(limit);
        Ok(similar)
    }

    pub async fn artist_listeners(&self, artist: &str) -> Result<Option<u64>, LastfmError> {
        let payload = self
            .call(&[("method", "artist.getinfo"), ("artist", artist)])
            .await?;
        parse_listeners_payload(&payload)
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<String, LastfmError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| LastfmError::Http(err.to_string()))?;
        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("format", "json");

        self.wait_for_rate_limit().await;

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|err| LastfmError::Http(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| LastfmError::Http(err.to_string()))?;

        if !status.is_success() {
            return Err(LastfmError::Status(status.as_u16(), text));
        }

        Ok(text)
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let window = Duration::from_millis(RATE_LIMIT_WINDOW_MS);
            let elapsed = previous.elapsed();
            if elapsed < window {
                sleep(window - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait::async_trait]
impl crate::search::ArtistMetadataSource for LastfmClient {
    async fn similar_artists(
        &self,
        artist: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<SimilarArtist>> {
        Ok(LastfmClient::similar_artists(self, artist, limit).await?)
    }

    async fn listeners(&self, artist: &str) -> anyhow::Result<Option<u64>> {
        Ok(self.artist_listeners(artist).await?)
    }
}

pub(crate) fn parse_similar_payload(payload: &str) -> Result<Vec<SimilarArtist>, LastfmError> {
    let response: SimilarResponse =
        serde_json::from_str(payload).map_err(|err| LastfmError::Parse(err.to_string()))?;
    Ok(response
        .similar_artists
        .map(|list| list.artist)
        .unwrap_or_default()
        .into_iter()
        .map(|doc| SimilarArtist {
            name: doc.name,
            match_score: doc.match_score,
        })
        .collect())
}

pub(crate) fn parse_listeners_payload(payload: &str) -> Result<Option<u64>, LastfmError> {
    let response: InfoResponse =
        serde_json::from_str(payload).map_err(|err| LastfmError::Parse(err.to_string()))?;
    Ok(response
        .artist
        .and_then(|artist| artist.stats)
        .and_then(|stats| stats.listeners)
        .and_then(|listeners| listeners.trim().parse().ok()))
}
