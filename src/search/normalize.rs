use std::collections::BTreeSet;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::geo::haversine_miles;
use crate::models::{CapacityClass, Coordinate, Event, EventLocation};
use crate::ticketmaster::{RawCapacityInfo, RawEvent, RawVenue};

/// Shows without an announced start time default to a 7 PM door.
fn default_local_time() -> NaiveTime {
    NaiveTime::from_hms_opt(19, 0, 0).expect("valid default time")
}

const TITLE_SUFFIXES: [&str; 6] = [
    " Tour",
    " Live",
    " Concert",
    " Show",
    " Presents",
    " World Tour",
];

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("record has no event id")]
    MissingId,
    #[error("record has no start date")]
    MissingDate,
    #[error("unparseable start date: {0}")]
    UnparseableDate(String),
}

/// Maps one raw upstream record into the canonical Event shape.
///
/// Records without an id or a resolvable start are dropped by the caller;
/// every other gap degrades to an unknown field.
pub fn normalize(raw: &RawEvent, term: &str, center: Coordinate) -> Result<Event, NormalizeError> {
    let id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(NormalizeError::MissingId)?
        .to_string();

    let date_time = resolve_start(raw)?;

    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown Event")
        .to_string();

    let venue = raw
        .embedded
        .as_ref()
        .and_then(|embedded| embedded.venues.first());

    let artist_names = artist_names(raw, &name);

    let coordinate = venue.and_then(venue_coordinate);
    let distance_miles = coordinate.map(|point| haversine_miles(center, point));

    let capacity_class = venue
        .map(|venue| {
            CapacityClass::from_capacity(
                capacity_from(venue.general_info.as_ref())
                    .or_else(|| capacity_from(venue.box_office_info.as_ref())),
            )
        })
        .unwrap_or(CapacityClass::Unknown);

    let price = raw.price_ranges.first();

    Ok(Event {
        id,
        name,
        artist_names,
        venue_name: venue
            .and_then(|venue| venue.name.clone())
            .unwrap_or_else(|| "Unknown Venue".to_string()),
        capacity_class,
        date_time,
        location: EventLocation {
            coordinate,
            city: venue.and_then(|venue| venue.city.as_ref()?.name.clone()),
            state: venue.and_then(|venue| {
                let state = venue.state.as_ref()?;
                state.state_code.clone().or_else(|| state.name.clone())
            }),
        },
        distance_miles,
        source_query_terms: BTreeSet::from([term.to_string()]),
        url: raw.url.clone(),
        price_min_cents: price.and_then(|range| range.min).map(dollars_to_cents),
        price_max_cents: price.and_then(|range| range.max).map(dollars_to_cents),
        currency: price.and_then(|range| range.currency.clone()),
        image_url: pick_image(raw),
        listeners: None,
    })
}

/// Prefers the upstream UTC timestamp; falls back to the local date and
/// time interpreted in the event's announced timezone.
fn resolve_start(raw: &RawEvent) -> Result<DateTime<Utc>, NormalizeError> {
    let dates = raw.dates.as_ref().ok_or(NormalizeError::MissingDate)?;
    let start = dates.start.as_ref().ok_or(NormalizeError::MissingDate)?;

    if let Some(stamp) = start.date_time.as_deref() {
        return DateTime::parse_from_rfc3339(stamp)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|_| NormalizeError::UnparseableDate(stamp.to_string()));
    }

    let local_date = start.local_date.as_deref().ok_or(NormalizeError::MissingDate)?;
    let date = NaiveDate::parse_from_str(local_date, "%Y-%m-%d")
        .map_err(|_| NormalizeError::UnparseableDate(local_date.to_string()))?;

    let time = start
        .local_time
        .as_deref()
        .and_then(parse_local_time)
        .unwrap_or_else(default_local_time);

    let naive = NaiveDateTime::new(date, time);
    let zone: Option<Tz> = dates
        .timezone
        .as_deref()
        .and_then(|name| name.parse().ok());

    match zone {
        Some(tz) => match tz.from_local_datetime(&naive) {
            LocalResult::Single(stamp) => Ok(stamp.with_timezone(&Utc)),
            LocalResult::Ambiguous(stamp, _) => Ok(stamp.with_timezone(&Utc)),
            LocalResult::None => Err(NormalizeError::UnparseableDate(naive.to_string())),
        },
        None => Ok(Utc.from_utc_datetime(&naive)),
    }
}

fn parse_local_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Performer names from the record's attractions, falling back to the event
/// title with tour/show suffixes stripped.
fn artist_names(raw: &RawEvent, event_name: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Some(embedded) = raw.embedded.as_ref() {
        for attraction in &embedded.attractions {
            let clean = match attraction.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            if !names
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(clean))
            {
                names.push(clean.to_string());
            }
        }
    }

    if names.is_empty() {
        let derived = strip_title_suffixes(event_name);
        if !derived.is_empty() {
            names.push(derived);
        }
    }

    names
}

fn strip_title_suffixes(name: &str) -> String {
    let mut title = name.to_string();
    for suffix in TITLE_SUFFIXES {
        if let Some(index) = title.find(suffix) {
            title.truncate(index);
        }
    }
    title.trim().to_string()
}

fn venue_coordinate(venue: &RawVenue) -> Option<Coordinate> {
    let location = venue.location.as_ref()?;
    let latitude = location.latitude.as_deref()?.trim().parse().ok()?;
    let longitude = location.longitude.as_deref()?.trim().parse().ok()?;
    Some(Coordinate {
        latitude,
        longitude,
    })
}

fn capacity_from(info: Option<&RawCapacityInfo>) -> Option<u64> {
    match info?.capacity.as_ref()? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn dollars_to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn pick_image(raw: &RawEvent) -> Option<String> {
    raw.images
        .iter()
        .find(|image| image.width.unwrap_or(0) >= 200)
        .or_else(|| raw.images.first())
        .and_then(|image| image.url.clone())
}
