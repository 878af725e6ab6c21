use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveTime, Utc};

use crate::models::{CapacityClass, Event};
use crate::request::{SearchRequest, SortOrder};

/// Folds a duplicate record into the canonical one. First-seen wins every
/// field except the query terms, which accumulate.
pub fn merge(mut existing: Event, incoming: Event) -> Event {
    existing.source_query_terms.extend(incoming.source_query_terms);
    existing
}

/// Collapses events sharing an id, preserving first-seen order.
pub fn dedupe(events: Vec<Event>) -> Vec<Event> {
    let mut order: Vec<Event> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for event in events {
        match by_id.get(&event.id) {
            Some(&index) => {
                let existing = order[index].clone();
                order[index] = merge(existing, event);
            }
            None => {
                by_id.insert(event.id.clone(), order.len());
                order.push(event);
            }
        }
    }
    order
}

/// Post-fetch filters: the date window, the radius, and large venues.
///
/// Events whose distance cannot be verified are excluded rather than risk
/// results outside the requested radius. Unknown capacity passes the
/// large-venue filter; only provably large rooms are dropped.
pub fn apply_filters(events: Vec<Event>, request: &SearchRequest) -> Vec<Event> {
    let window_start = request.date_from.and_time(NaiveTime::MIN).and_utc();
    let window_end = (request.date_to + Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc();
    let radius = f64::from(request.radius_miles);

    events
        .into_iter()
        .filter(|event| event.date_time >= window_start && event.date_time < window_end)
        .filter(|event| match event.distance_miles {
            Some(distance) => distance <= radius,
            None => false,
        })
        .filter(|event| {
            !(request.exclude_large_venues && event.capacity_class == CapacityClass::Large)
        })
        .collect()
}

/// Deterministic ordering: soonest first, nearest and then name breaking
/// ties. Popularity order puts the biggest listener counts first and falls
/// back to the same chain.
pub fn sort_events(events: &mut [Event], order: SortOrder) {
    match order {
        SortOrder::Date => events.sort_by(date_chain),
        SortOrder::Popularity => events.sort_by(|a, b| {
            b.listeners
                .unwrap_or(0)
                .cmp(&a.listeners.unwrap_or(0))
                .then_with(|| date_chain(a, b))
        }),
    }
}

fn date_chain(a: &Event, b: &Event) -> std::cmp::Ordering {
    a.date_time
        .cmp(&b.date_time)
        .then_with(|| {
            distance_key(a.distance_miles).total_cmp(&distance_key(b.distance_miles))
        })
        .then_with(|| a.name.cmp(&b.name))
}

fn distance_key(distance: Option<f64>) -> f64 {
    distance.unwrap_or(f64::INFINITY)
}

/// The full reduction step: dedupe, filter, sort.
pub fn aggregate(events: Vec<Event>, request: &SearchRequest) -> Vec<Event> {
    let mut events = apply_filters(dedupe(events), request);
    sort_events(&mut events, request.sort);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, EventLocation};
    use chrono::{NaiveDate, TimeZone};
    use std::collections::BTreeSet;

    fn event(id: &str, name: &str, date_time: DateTime<Utc>, distance: Option<f64>) -> Event {
        Event {
            id: id.to_string(),
            name: name.to_string(),
            artist_names: vec![name.to_string()],
            venue_name: "Club".to_string(),
            capacity_class: CapacityClass::Small,
            date_time,
            location: EventLocation {
                coordinate: Some(Coordinate {
                    latitude: 42.36,
                    longitude: -71.06,
                }),
                city: Some("Boston".to_string()),
                state: Some("MA".to_string()),
            },
            distance_miles: distance,
            source_query_terms: BTreeSet::from([name.to_string()]),
            url: None,
            price_min_cents: None,
            price_max_cents: None,
            currency: None,
            image_url: None,
            listeners: None,
        }
    }

    fn stamp(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, hour, 0, 0)
            .single()
            .expect("valid stamp")
    }

    fn request() -> SearchRequest {
        SearchRequest {
            zip_code: "02101".to_string(),
            radius_miles: 25,
            artists: vec!["A".to_string()],
            genres: vec![],
            date_from: NaiveDate::from_ymd_opt(2026, 4, 1).expect("valid date"),
            date_to: NaiveDate::from_ymd_opt(2026, 4, 30).expect("valid date"),
            exclude_large_venues: false,
            expand_similar_artists: false,
            sort: SortOrder::Date,
        }
    }

    #[test]
    fn merge_unions_terms_and_keeps_first_fields() {
        let mut first = event("e1", "Show", stamp(10, 19), Some(3.0));
        first.source_query_terms = BTreeSet::from(["Artist A".to_string()]);
        let mut second = event("e1", "Show (duplicate)", stamp(10, 20), Some(9.0));
        second.source_query_terms = BTreeSet::from(["Similar B".to_string()]);

        let merged = merge(first.clone(), second);
        assert_eq!(merged.name, "Show");
        assert_eq!(merged.date_time, stamp(10, 19));
        assert_eq!(
            merged.source_query_terms,
            BTreeSet::from(["Artist A".to_string(), "Similar B".to_string()])
        );

        // Merging an event with itself changes nothing.
        let again = merge(first.clone(), first.clone());
        assert_eq!(again.source_query_terms, first.source_query_terms);
    }

    #[test]
    fn dedupe_keeps_one_record_per_id_in_first_seen_order() {
        let mut duplicate = event("e1", "Show", stamp(10, 19), Some(3.0));
        duplicate.source_query_terms = BTreeSet::from(["other".to_string()]);
        let events = vec![
            event("e1", "Show", stamp(10, 19), Some(3.0)),
            event("e2", "Other", stamp(11, 19), Some(5.0)),
            duplicate,
        ];
        let deduped = dedupe(events);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, "e1");
        assert_eq!(deduped[1].id, "e2");
        assert!(deduped[0].source_query_terms.contains("other"));
    }

    #[test]
    fn filters_enforce_window_radius_and_venue_size() {
        let mut large = event("e4", "Arena", stamp(12, 19), Some(4.0));
        large.capacity_class = CapacityClass::Large;
        let mut unknown_cap = event("e5", "Mystery Room", stamp(12, 20), Some(4.0));
        unknown_cap.capacity_class = CapacityClass::Unknown;

        let events = vec![
            event("e1", "In Range", stamp(10, 19), Some(10.0)),
            event("e2", "Too Far", stamp(10, 19), Some(26.0)),
            event("e3", "No Distance", stamp(10, 19), None),
            large,
            unknown_cap,
            event(
                "e6",
                "Out of Window",
                Utc.with_ymd_and_hms(2026, 5, 2, 19, 0, 0)
                    .single()
                    .expect("valid stamp"),
                Some(1.0),
            ),
        ];

        let mut request = request();
        request.exclude_large_venues = true;
        let kept = apply_filters(events, &request);
        let ids: Vec<&str> = kept.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e5"]);
    }

    #[test]
    fn window_bounds_are_inclusive_whole_days() {
        let events = vec![
            event("start", "Opening Day", stamp(1, 0), Some(1.0)),
            event(
                "end",
                "Closing Night",
                Utc.with_ymd_and_hms(2026, 4, 30, 23, 59, 59)
                    .single()
                    .expect("valid stamp"),
                Some(1.0),
            ),
        ];
        let kept = apply_filters(events, &request());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn sorts_by_date_then_distance_then_name() {
        let mut events = vec![
            event("e1", "Bravo", stamp(12, 19), Some(5.0)),
            event("e2", "Alpha", stamp(12, 19), Some(5.0)),
            event("e3", "Closer", stamp(12, 19), Some(2.0)),
            event("e4", "Earlier", stamp(10, 19), Some(20.0)),
        ];
        sort_events(&mut events, SortOrder::Date);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e4", "e3", "e2", "e1"]);
    }

    #[test]
    fn popularity_sort_prefers_listeners_then_date_chain() {
        let mut small = event("e1", "Small Act", stamp(10, 19), Some(2.0));
        small.listeners = Some(10_000);
        let mut big = event("e2", "Big Act", stamp(20, 19), Some(2.0));
        big.listeners = Some(2_000_000);
        let unknown = event("e3", "No Count", stamp(11, 19), Some(2.0));

        let mut events = vec![small, unknown, big];
        sort_events(&mut events, SortOrder::Popularity);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1", "e3"]);
    }

    #[test]
    fn aggregate_output_has_unique_ids_and_stable_order() {
        let events = vec![
            event("e1", "Show", stamp(12, 19), Some(3.0)),
            event("e2", "Other", stamp(10, 19), Some(3.0)),
            event("e1", "Show", stamp(12, 19), Some(3.0)),
        ];
        let request = request();
        let first_pass = aggregate(events.clone(), &request);
        let second_pass = aggregate(events, &request);
        let ids: Vec<&str> = first_pass.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1"]);
        let second_ids: Vec<&str> = second_pass.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, second_ids);
    }
}
