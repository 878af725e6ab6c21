use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::search::planner::Query;

const DISCOVERY_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const PAGE_SIZE: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum TicketmasterError {
    #[error("http error: {0}")]
    Http(String),
    #[error("status {0}: {1}")]
    Status(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<DiscoveryEmbedded>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryEmbedded {
    #[serde(default)]
    events: Vec<RawEvent>,
}

/// One event record as returned by the Discovery API. Kept close to the
/// wire shape; normalization lives in `search::normalize`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
    pub dates: Option<RawDates>,
    #[serde(rename = "priceRanges", default)]
    pub price_ranges: Vec<RawPriceRange>,
    #[serde(rename = "_embedded")]
    pub embedded: Option<RawEventEmbedded>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEventEmbedded {
    #[serde(default)]
    pub venues: Vec<RawVenue>,
    #[serde(default)]
    pub attractions: Vec<RawAttraction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAttraction {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVenue {
    pub name: Option<String>,
    pub city: Option<RawNamed>,
    pub state: Option<RawState>,
    pub location: Option<RawLatLon>,
    #[serde(rename = "generalInfo")]
    pub general_info: Option<RawCapacityInfo>,
    #[serde(rename = "boxOfficeInfo")]
    pub box_office_info: Option<RawCapacityInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNamed {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawState {
    #[serde(rename = "stateCode")]
    pub state_code: Option<String>,
    pub name: Option<String>,
}

/// Venue coordinates arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLatLon {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Capacity may be a JSON number or a numeric string depending on the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCapacityInfo {
    pub capacity: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDates {
    pub start: Option<RawStart>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStart {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    #[serde(rename = "localDate")]
    pub local_date: Option<String>,
    #[serde(rename = "localTime")]
    pub local_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImage {
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Events-search API client. One call per planned query term.
pub struct TicketmasterClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TicketmasterClient {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DISCOVERY_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(client: Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
        }
    }

    pub async fn search_events(&self, query: &Query) -> Result<Vec<RawEvent>, TicketmasterError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| TicketmasterError::Http(err.to_string()))?;
        for (key, value) in query_params(&self.api_key, query) {
            url.query_pairs_mut().append_pair(key, &value);
        }

        tracing::debug!(term = %query.term, "querying events api");

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|err| TicketmasterError::Http(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| TicketmasterError::Http(err.to_string()))?;

        if !status.is_success() {
            return Err(TicketmasterError::Status(status.as_u16(), text));
        }

        parse_events_payload(&text)
    }
}

fn query_params(api_key: &str, query: &Query) -> Vec<(&'static str, String)> {
    vec![
        ("apikey", api_key.to_string()),
        ("keyword", query.term.clone()),
        ("postalCode", query.zip_code.clone()),
        ("radius", query.radius_miles.to_string()),
        ("unit", "miles".to_string()),
        ("classificationName", "Music".to_string()),
        (
            "startDateTime",
            query.date_from.format("%Y-%m-%dT00:00:00Z").to_string(),
        ),
        (
            "endDateTime",
            query.date_to.format("%Y-%m-%dT23:59:59Z").to_string(),
        ),
        ("size", PAGE_SIZE.to_string()),
        ("sort", "date,asc".to_string()),
    ]
}

#[async_trait::async_trait]
impl crate::search::EventSource for TicketmasterClient {
    async fn events(&self, query: &Query) -> anyhow::Result<Vec<RawEvent>> {
        Ok(self.search_events(query).await?)
    }
}

pub(crate) fn parse_events_payload(payload: &str) -> Result<Vec<RawEvent>, TicketmasterError> {
    let response: DiscoveryResponse =
        serde_json::from_str(payload).map_err(|err| TicketmasterError::Parse(err.to_string()))?;
    Ok(response
        .embedded
        .map(|embedded| embedded.events)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::planner::TermKind;
    use chrono::NaiveDate;

    const SAMPLE_PAYLOAD: &str = r#"{
        "_embedded": {
            "events": [
                {
                    "id": "G5vYZ9t8BbAfK",
                    "name": "The National: Laugh Track Tour",
                    "url": "https://www.ticketmaster.com/event/G5vYZ9t8BbAfK",
                    "images": [
                        {"url": "https://img.tm.example/small.jpg", "width": 100},
                        {"url": "https://img.tm.example/wide.jpg", "width": 640}
                    ],
                    "dates": {
                        "start": {
                            "dateTime": "2026-04-18T23:30:00Z",
                            "localDate": "2026-04-18",
                            "localTime": "19:30:00"
                        },
                        "timezone": "America/New_York"
                    },
                    "priceRanges": [
                        {"type": "standard", "currency": "USD", "min": 45.5, "max": 99.0}
                    ],
                    "_embedded": {
                        "venues": [
                            {
                                "name": "Roadrunner",
                                "city": {"name": "Boston"},
                                "state": {"name": "Massachusetts", "stateCode": "MA"},
                                "location": {"longitude": "-71.0727", "latitude": "42.3663"},
                                "generalInfo": {"capacity": "3500"}
                            }
                        ],
                        "attractions": [
                            {"name": "The National"},
                            {"name": "Soccer Mommy"}
                        ]
                    }
                },
                {
                    "id": "K8xZQ2m4CdEgH",
                    "name": "Jazz Night",
                    "dates": {"start": {"localDate": "2026-04-20"}}
                }
            ]
        },
        "page": {"size": 50, "totalElements": 2}
    }"#;

    #[test]
    fn parses_discovery_payload() {
        let events = parse_events_payload(SAMPLE_PAYLOAD).expect("parse discovery payload");
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.id.as_deref(), Some("G5vYZ9t8BbAfK"));
        let embedded = first.embedded.as_ref().expect("embedded");
        assert_eq!(embedded.attractions.len(), 2);
        assert_eq!(embedded.venues[0].name.as_deref(), Some("Roadrunner"));
        assert_eq!(first.price_ranges[0].min, Some(45.5));

        let second = &events[1];
        assert!(second.embedded.is_none());
        assert!(second.url.is_none());
    }

    #[test]
    fn empty_embedded_means_no_events() {
        let events = parse_events_payload(r#"{"page": {"totalElements": 0}}"#)
            .expect("parse empty payload");
        assert!(events.is_empty());
    }

    #[test]
    fn query_params_carry_the_whole_window() {
        let query = Query {
            term: "Radiohead".to_string(),
            kind: TermKind::Artist,
            zip_code: "02101".to_string(),
            radius_miles: 25,
            date_from: NaiveDate::from_ymd_opt(2026, 4, 1).expect("valid date"),
            date_to: NaiveDate::from_ymd_opt(2026, 5, 1).expect("valid date"),
        };
        let params = query_params("test-key", &query);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .expect("param present")
        };
        assert_eq!(get("keyword"), "Radiohead");
        assert_eq!(get("postalCode"), "02101");
        assert_eq!(get("radius"), "25");
        assert_eq!(get("startDateTime"), "2026-04-01T00:00:00Z");
        assert_eq!(get("endDateTime"), "2026-05-01T23:59:59Z");
        assert_eq!(get("classificationName"), "Music");
        assert_eq!(get("sort"), "date,asc");
    }
}
