use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Venue capacity above which an event counts as a large-venue/arena show.
pub const LARGE_VENUE_CAPACITY: u64 = 10_000;
/// Venue capacity at or below which a room counts as a small club.
pub const SMALL_VENUE_CAPACITY: u64 = 1_500;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CapacityClass {
    Small,
    Medium,
    Large,
    Unknown,
}

impl CapacityClass {
    pub fn from_capacity(capacity: Option<u64>) -> Self {
        match capacity {
            Some(seats) if seats <= SMALL_VENUE_CAPACITY => CapacityClass::Small,
            Some(seats) if seats <= LARGE_VENUE_CAPACITY => CapacityClass::Medium,
            Some(_) => CapacityClass::Large,
            None => CapacityClass::Unknown,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventLocation {
    pub coordinate: Option<Coordinate>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Event {
    pub id: String, // Ticketmaster event id, dedup key
    pub name: String,
    pub artist_names: Vec<String>,
    pub venue_name: String,
    pub capacity_class: CapacityClass,
    pub date_time: DateTime<Utc>,
    pub location: EventLocation,
    pub distance_miles: Option<f64>,
    pub source_query_terms: BTreeSet<String>,
    pub url: Option<String>,
    pub price_min_cents: Option<i64>,
    pub price_max_cents: Option<i64>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    pub listeners: Option<u64>,
}

impl Event {
    /// Headliner, when the upstream record named any performer.
    pub fn headliner(&self) -> Option<&str> {
        self.artist_names.first().map(String::as_str)
    }
}

/// One related artist from the music-metadata service. Lives only long
/// enough to feed the query planner.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SimilarArtist {
    pub name: String,
    pub match_score: f64,
}
