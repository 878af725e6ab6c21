use chrono::{Months, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_ARTISTS: usize = 10;
pub const MAX_GENRES: usize = 3;
pub const MIN_RADIUS_MILES: u32 = 10;
pub const MAX_RADIUS_MILES: u32 = 100;
pub const MAX_WINDOW_MONTHS: u32 = 6;

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}$").expect("valid zip regex"));

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Date,
    Popularity,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("'{0}' is not a valid US zip code")]
    InvalidZip(String),
    #[error("radius must be between {MIN_RADIUS_MILES} and {MAX_RADIUS_MILES} miles, got {0}")]
    RadiusOutOfRange(u32),
    #[error("at most {MAX_ARTISTS} artists allowed, got {0}")]
    TooManyArtists(usize),
    #[error("at most {MAX_GENRES} genres allowed, got {0}")]
    TooManyGenres(usize),
    #[error("artist and genre entries must be non-empty")]
    EmptyTerm,
    #[error("at least one artist or genre is required")]
    EmptyTermSet,
    #[error("date_from {0} is in the past")]
    StartInPast(NaiveDate),
    #[error("date_to {date_to} is before date_from {date_from}")]
    InvertedWindow {
        date_from: NaiveDate,
        date_to: NaiveDate,
    },
    #[error("date_to {0} is more than {MAX_WINDOW_MONTHS} months out")]
    WindowTooLong(NaiveDate),
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SearchRequest {
    pub zip_code: String,
    pub radius_miles: u32,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub exclude_large_venues: bool,
    pub expand_similar_artists: bool,
    pub sort: SortOrder,
}

impl SearchRequest {
    /// Checks every invariant before any network call is made.
    pub fn validate(&self) -> Result<(), RequestError> {
        self.validate_at(Utc::now().date_naive())
    }

    fn validate_at(&self, today: NaiveDate) -> Result<(), RequestError> {
        if !ZIP_RE.is_match(self.zip_code.trim()) {
            return Err(RequestError::InvalidZip(self.zip_code.clone()));
        }
        if !(MIN_RADIUS_MILES..=MAX_RADIUS_MILES).contains(&self.radius_miles) {
            return Err(RequestError::RadiusOutOfRange(self.radius_miles));
        }
        if self.artists.len() > MAX_ARTISTS {
            return Err(RequestError::TooManyArtists(self.artists.len()));
        }
        if self.genres.len() > MAX_GENRES {
            return Err(RequestError::TooManyGenres(self.genres.len()));
        }
        if self
            .artists
            .iter()
            .chain(self.genres.iter())
            .any(|term| term.trim().is_empty())
        {
            return Err(RequestError::EmptyTerm);
        }
        if self.artists.is_empty() && self.genres.is_empty() {
            return Err(RequestError::EmptyTermSet);
        }
        if self.date_from < today {
            return Err(RequestError::StartInPast(self.date_from));
        }
        if self.date_to < self.date_from {
            return Err(RequestError::InvertedWindow {
                date_from: self.date_from,
                date_to: self.date_to,
            });
        }
        let horizon = today
            .checked_add_months(Months::new(MAX_WINDOW_MONTHS))
            .unwrap_or(NaiveDate::MAX);
        if self.date_to > horizon {
            return Err(RequestError::WindowTooLong(self.date_to));
        }
        Ok(())
    }
}
