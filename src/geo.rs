use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::models::Coordinate;

const LOOKUP_BASE_URL: &str = "https://api.zippopotam.us";
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Search center for one request, resolved from the user's zip code.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub city: String,
    pub state: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("unknown zip code: {0}")]
    NotFound(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    places: Vec<PlaceDoc>,
}

#[derive(Debug, Deserialize)]
struct PlaceDoc {
    #[serde(rename = "place name")]
    place_name: String,
    #[serde(rename = "state abbreviation")]
    state_abbreviation: String,
    latitude: String,
    longitude: String,
}

/// Postal-code lookup client. The events API takes zip codes natively;
/// this resolves the center coordinate used to verify distances post-fetch.
pub struct GeoResolver {
    client: Client,
    base_url: String,
}

impl GeoResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: LOOKUP_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn lookup(&self, zip_code: &str) -> Result<ResolvedLocation, GeoError> {
        let url = Url::parse(&format!("{}/us/{}", self.base_url, zip_code.trim()))
            .map_err(|err| GeoError::Http(err.to_string()))?;

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|err| GeoError::Http(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GeoError::NotFound(zip_code.to_string()));
        }

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GeoError::Http(err.to_string()))?;

        if !status.is_success() {
            return Err(GeoError::Http(format!("status {}: {}", status, text)));
        }

        parse_lookup(&text)
    }
}

#[async_trait::async_trait]
impl crate::search::LocationResolver for GeoResolver {
    async fn resolve(&self, zip_code: &str) -> Result<ResolvedLocation, GeoError> {
        self.lookup(zip_code).await
    }
}

pub(crate) fn parse_lookup(payload: &str) -> Result<ResolvedLocation, GeoError> {
    let response: LookupResponse =
        serde_json::from_str(payload).map_err(|err| GeoError::Parse(err.to_string()))?;

    let place = response
        .places
        .into_iter()
        .next()
        .ok_or_else(|| GeoError::Parse("lookup response has no places".to_string()))?;

    let latitude = place
        .latitude
        .trim()
        .parse::<f64>()
        .map_err(|err| GeoError::Parse(format!("bad latitude: {err}")))?;
    let longitude = place
        .longitude
        .trim()
        .parse::<f64>()
        .map_err(|err| GeoError::Parse(format!("bad longitude: {err}")))?;

    Ok(ResolvedLocation {
        coordinate: Coordinate {
            latitude,
            longitude,
        },
        city: place.place_name,
        state: place.state_abbreviation,
    })
}

/// Great-circle distance between two coordinates, in miles.
pub fn haversine_miles(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}
