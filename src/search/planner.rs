use chrono::NaiveDate;

use crate::models::SimilarArtist;
use crate::request::SearchRequest;

/// Similar artists requested per seed artist.
pub const SIMILAR_PER_SEED: usize = 5;
/// Hard cap on distinct search terms, bounding upstream fan-out.
pub const MAX_TERMS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Artist,
    Genre,
}

/// One unit of upstream search: a seed artist/genre or an expanded artist.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub value: String,
    pub kind: TermKind,
}

/// One planned upstream call, carrying the request's shared constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub term: String,
    pub kind: TermKind,
    pub zip_code: String,
    pub radius_miles: u32,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

/// User-supplied terms, order-preserving, deduplicated case-insensitively.
pub fn seed_terms(request: &SearchRequest) -> Vec<Term> {
    let mut terms: Vec<Term> = Vec::new();
    let typed = request
        .artists
        .iter()
        .map(|name| (name, TermKind::Artist))
        .chain(request.genres.iter().map(|name| (name, TermKind::Genre)));

    for (value, kind) in typed {
        let clean = value.trim();
        if clean.is_empty() {
            continue;
        }
        if !terms
            .iter()
            .any(|existing| existing.value.eq_ignore_ascii_case(clean))
        {
            terms.push(Term {
                value: clean.to_string(),
                kind,
            });
        }
    }
    terms
}

/// Folds similar-artist results into the seed set under the global term cap.
///
/// Seeds are never truncated; expanded artists are admitted highest match
/// score first until the cap is reached. Returns the final term list and a
/// per-seed report of which similar artists survived.
pub fn merge_expansions(
    seeds: Vec<Term>,
    expansions: Vec<(String, Vec<SimilarArtist>)>,
    max_terms: usize,
) -> (Vec<Term>, Vec<(String, Vec<String>)>) {
    let budget = max_terms.saturating_sub(seeds.len());

    let mut candidates: Vec<(usize, SimilarArtist)> = Vec::new();
    for (seed_index, (_, similar)) in expansions.iter().enumerate() {
        for artist in similar {
            let clean = artist.name.trim();
            if clean.is_empty() {
                continue;
            }
            let already_seeded = seeds
                .iter()
                .any(|term| term.value.eq_ignore_ascii_case(clean));
            let already_expanded = candidates
                .iter()
                .any(|(_, existing)| existing.name.eq_ignore_ascii_case(clean));
            if already_seeded || already_expanded {
                continue;
            }
            candidates.push((
                seed_index,
                SimilarArtist {
                    name: clean.to_string(),
                    match_score: artist.match_score,
                },
            ));
        }
    }

    // Lowest scores fall off first when the cap bites.
    candidates.sort_by(|a, b| b.1.match_score.total_cmp(&a.1.match_score));
    candidates.truncate(budget);

    let mut report: Vec<(String, Vec<String>)> = Vec::new();
    for (seed_index, (seed, _)) in expansions.iter().enumerate() {
        let contributed: Vec<String> = candidates
            .iter()
            .filter(|(index, _)| *index == seed_index)
            .map(|(_, artist)| artist.name.clone())
            .collect();
        if !contributed.is_empty() {
            report.push((seed.clone(), contributed));
        }
    }

    let mut terms = seeds;
    terms.extend(candidates.into_iter().map(|(_, artist)| Term {
        value: artist.name,
        kind: TermKind::Artist,
    }));

    (terms, report)
}

pub fn build_queries(terms: &[Term], request: &SearchRequest) -> Vec<Query> {
    terms
        .iter()
        .map(|term| Query {
            term: term.value.clone(),
            kind: term.kind,
            zip_code: request.zip_code.clone(),
            radius_miles: request.radius_miles,
            date_from: request.date_from,
            date_to: request.date_to,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SortOrder;
    use chrono::Days;

    fn request_with(artists: &[&str], genres: &[&str]) -> SearchRequest {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        SearchRequest {
            zip_code: "02101".to_string(),
            radius_miles: 25,
            artists: artists.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
            date_from: today,
            date_to: today + Days::new(30),
            exclude_large_venues: false,
            expand_similar_artists: true,
            sort: SortOrder::Date,
        }
    }

    fn similar(name: &str, score: f64) -> SimilarArtist {
        SimilarArtist {
            name: name.to_string(),
            match_score: score,
        }
    }

    #[test]
    fn seeds_preserve_order_and_dedup_case_insensitively() {
        let request = request_with(&["Radiohead", "radiohead", "The National"], &["jazz"]);
        let seeds = seed_terms(&request);
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].value, "Radiohead");
        assert_eq!(seeds[0].kind, TermKind::Artist);
        assert_eq!(seeds[1].value, "The National");
        assert_eq!(seeds[2].value, "jazz");
        assert_eq!(seeds[2].kind, TermKind::Genre);
    }

    #[test]
    fn expansion_skips_names_already_seeded() {
        let request = request_with(&["Radiohead", "Interpol"], &[]);
        let seeds = seed_terms(&request);
        let expansions = vec![(
            "Radiohead".to_string(),
            vec![similar("interpol", 0.9), similar("Arcade Fire", 0.8)],
        )];
        let (terms, report) = merge_expansions(seeds, expansions, MAX_TERMS);
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[2].value, "Arcade Fire");
        assert_eq!(report, vec![("Radiohead".to_string(), vec!["Arcade Fire".to_string()])]);
    }

    #[test]
    fn cap_truncates_lowest_scores_and_protects_seeds() {
        let artists: Vec<String> = (0..10).map(|n| format!("Seed {n}")).collect();
        let artist_refs: Vec<&str> = artists.iter().map(String::as_str).collect();
        let request = request_with(&artist_refs, &["jazz", "folk", "indie"]);
        let seeds = seed_terms(&request);
        assert_eq!(seeds.len(), 13);

        // 10 seeds x 5 similar = 50 candidates, scores descending by seed.
        let expansions: Vec<(String, Vec<SimilarArtist>)> = (0..10)
            .map(|seed| {
                let list = (0..5)
                    .map(|n| {
                        similar(
                            &format!("Similar {seed}-{n}"),
                            1.0 - (seed * 5 + n) as f64 / 100.0,
                        )
                    })
                    .collect();
                (format!("Seed {seed}"), list)
            })
            .collect();

        let (terms, report) = merge_expansions(seeds, expansions, MAX_TERMS);
        assert_eq!(terms.len(), MAX_TERMS);

        // Every seed term survives.
        for n in 0..10 {
            assert!(terms.iter().any(|t| t.value == format!("Seed {n}")));
        }
        for genre in ["jazz", "folk", "indie"] {
            assert!(terms.iter().any(|t| t.value == genre));
        }

        // Budget is 12; the twelve highest-scoring similar artists survive,
        // which is all of seeds 0 and 1 plus the top two of seed 2.
        let survivors: Vec<&str> = terms[13..].iter().map(|t| t.value.as_str()).collect();
        assert_eq!(survivors.len(), 12);
        assert!(survivors.contains(&"Similar 0-0"));
        assert!(survivors.contains(&"Similar 2-1"));
        assert!(!survivors.contains(&"Similar 2-2"));
        assert!(!survivors.contains(&"Similar 9-4"));

        assert_eq!(report.len(), 3);
        assert_eq!(report[2].0, "Seed 2");
        assert_eq!(report[2].1, vec!["Similar 2-0", "Similar 2-1"]);
    }

    #[test]
    fn queries_carry_request_constraints() {
        let request = request_with(&["Radiohead"], &["jazz"]);
        let terms = seed_terms(&request);
        let queries = build_queries(&terms, &request);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].term, "Radiohead");
        assert_eq!(queries[0].kind, TermKind::Artist);
        assert_eq!(queries[0].zip_code, "02101");
        assert_eq!(queries[0].radius_miles, 25);
        assert_eq!(queries[1].kind, TermKind::Genre);
        assert_eq!(queries[0].date_from, request.date_from);
        assert_eq!(queries[0].date_to, request.date_to);
    }
}
