pub mod aggregate;
pub mod normalize;
pub mod planner;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::geo::{GeoError, ResolvedLocation};
use crate::models::{Event, SimilarArtist};
use crate::request::{SearchRequest, SortOrder};
use crate::ticketmaster::RawEvent;
use planner::{Query, TermKind};

/// Per-query event fetch. Production impl is the Ticketmaster client.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn events(&self, query: &Query) -> anyhow::Result<Vec<RawEvent>>;
}

/// Music-metadata lookups backing expansion and popularity ordering.
#[async_trait]
pub trait ArtistMetadataSource: Send + Sync {
    async fn similar_artists(&self, artist: &str, limit: usize)
        -> anyhow::Result<Vec<SimilarArtist>>;
    async fn listeners(&self, artist: &str) -> anyhow::Result<Option<u64>>;
}

/// Zip code to search center. Production impl is the postal lookup client.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self, zip_code: &str) -> Result<ResolvedLocation, GeoError>;
}

/// Timing and fan-out knobs, shrunk by tests.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub per_call_timeout: Duration,
    pub total_budget: Duration,
    pub concurrency: usize,
    pub similar_per_seed: usize,
    pub max_terms: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(5),
            total_budget: Duration::from_secs(20),
            concurrency: 4,
            similar_per_seed: planner::SIMILAR_PER_SEED,
            max_terms: planner::MAX_TERMS,
        }
    }
}

/// What one search produced. `failed_terms` is advisory: a term appears
/// here when its upstream query errored, timed out, or was abandoned when
/// the total budget ran out.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub events: Vec<Event>,
    pub resolved: ResolvedLocation,
    pub failed_terms: Vec<String>,
    pub expansions: Vec<(String, Vec<String>)>,
}

/// The aggregation core: plan terms, fan out queries, normalize, merge.
pub struct SearchPipeline {
    events: Arc<dyn EventSource>,
    metadata: Option<Arc<dyn ArtistMetadataSource>>,
    locations: Arc<dyn LocationResolver>,
    config: SearchConfig,
}

impl SearchPipeline {
    pub fn new(
        events: Arc<dyn EventSource>,
        metadata: Option<Arc<dyn ArtistMetadataSource>>,
        locations: Arc<dyn LocationResolver>,
        config: SearchConfig,
    ) -> Self {
        Self {
            events,
            metadata,
            locations,
            config,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        request.validate()?;

        let resolved = match self.locations.resolve(&request.zip_code).await {
            Ok(resolved) => resolved,
            Err(GeoError::NotFound(zip)) => {
                return Err(SearchError::InvalidLocation(format!(
                    "unknown zip code: {zip}"
                )))
            }
            // Without a center no distance can be verified, so any lookup
            // failure aborts like an unknown zip.
            Err(err) => return Err(SearchError::InvalidLocation(err.to_string())),
        };
        debug!(city = %resolved.city, state = %resolved.state, "resolved search center");

        let seeds = planner::seed_terms(request);
        let expansions_raw = if request.expand_similar_artists {
            self.expand_seeds(&seeds).await
        } else {
            Vec::new()
        };
        let (terms, expansions) =
            planner::merge_expansions(seeds, expansions_raw, self.config.max_terms);
        let queries = planner::build_queries(&terms, request);

        let (raw_batches, failed_terms) = self.fan_out(queries).await;

        let mut events: Vec<Event> = Vec::new();
        for (term, records) in raw_batches {
            for record in records {
                match normalize::normalize(&record, &term, resolved.coordinate) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        debug!(term = %term, error = %err, "dropping unparseable record");
                    }
                }
            }
        }

        let mut events = aggregate::apply_filters(aggregate::dedupe(events), request);
        if request.sort == SortOrder::Popularity {
            self.decorate_listeners(&mut events).await;
        }
        aggregate::sort_events(&mut events, request.sort);

        info!(
            events = events.len(),
            terms = terms.len(),
            failed = failed_terms.len(),
            "search complete"
        );

        Ok(SearchOutcome {
            events,
            resolved,
            failed_terms,
            expansions,
        })
    }

    /// Best-effort similar-artist lookups. Any failure leaves that seed
    /// unexpanded; the search never fails here.
    async fn expand_seeds(&self, seeds: &[planner::Term]) -> Vec<(String, Vec<SimilarArtist>)> {
        let metadata = match &self.metadata {
            Some(metadata) => metadata,
            None => {
                warn!("no music-metadata source configured; skipping similar-artist expansion");
                return Vec::new();
            }
        };

        let mut expansions = Vec::new();
        for seed in seeds.iter().filter(|term| term.kind == TermKind::Artist) {
            let lookup = metadata.similar_artists(&seed.value, self.config.similar_per_seed);
            match tokio::time::timeout(self.config.per_call_timeout, lookup).await {
                Ok(Ok(similar)) if !similar.is_empty() => {
                    debug!(seed = %seed.value, found = similar.len(), "expanded seed artist");
                    expansions.push((seed.value.clone(), similar));
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    warn!(seed = %seed.value, error = %err, "similar-artist lookup failed");
                }
                Err(_) => {
                    warn!(seed = %seed.value, "similar-artist lookup timed out");
                }
            }
        }
        expansions
    }

    /// Issues every query with bounded concurrency, racing the total
    /// budget. Returns per-term raw batches plus the terms that produced
    /// nothing because of errors, timeouts, or budget expiry.
    async fn fan_out(&self, queries: Vec<Query>) -> (Vec<(String, Vec<RawEvent>)>, Vec<String>) {
        let all_terms: Vec<String> = queries.iter().map(|query| query.term.clone()).collect();
        let per_call_timeout = self.config.per_call_timeout;
        let source = Arc::clone(&self.events);

        let mut in_flight = futures::stream::iter(queries.into_iter())
            .map(|query| {
                let source = Arc::clone(&source);
                async move {
                    let result =
                        tokio::time::timeout(per_call_timeout, source.events(&query)).await;
                    (query, result)
                }
            })
            .buffer_unordered(self.config.concurrency);

        let budget = tokio::time::sleep(self.config.total_budget);
        tokio::pin!(budget);

        let mut batches: Vec<(String, Vec<RawEvent>)> = Vec::new();
        let mut succeeded: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                next = in_flight.next() => match next {
                    Some((query, Ok(Ok(records)))) => {
                        debug!(term = %query.term, records = records.len(), "query returned");
                        succeeded.insert(query.term.to_lowercase());
                        batches.push((query.term, records));
                    }
                    Some((query, Ok(Err(err)))) => {
                        warn!(term = %query.term, error = %err, "query failed; treating as empty");
                    }
                    Some((query, Err(_))) => {
                        warn!(term = %query.term, "query timed out; treating as empty");
                    }
                    None => break,
                },
                _ = &mut budget => {
                    warn!("total search budget exhausted; proceeding with partial results");
                    break;
                }
            }
        }

        let failed_terms = all_terms
            .into_iter()
            .filter(|term| !succeeded.contains(&term.to_lowercase()))
            .collect();
        (batches, failed_terms)
    }

    /// One listener-count lookup per distinct headliner, soft-failing to
    /// an unknown count.
    async fn decorate_listeners(&self, events: &mut [Event]) {
        let metadata = match &self.metadata {
            Some(metadata) => metadata,
            None => {
                warn!("no music-metadata source configured; popularity order will be arbitrary");
                return;
            }
        };

        let mut counts: HashMap<String, Option<u64>> = HashMap::new();
        for event in events.iter() {
            let headliner = match event.headliner() {
                Some(name) => name.to_lowercase(),
                None => continue,
            };
            if counts.contains_key(&headliner) {
                continue;
            }
            let lookup = metadata.listeners(&headliner);
            let count = match tokio::time::timeout(self.config.per_call_timeout, lookup).await {
                Ok(Ok(count)) => count,
                Ok(Err(err)) => {
                    warn!(artist = %headliner, error = %err, "listener lookup failed");
                    None
                }
                Err(_) => {
                    warn!(artist = %headliner, "listener lookup timed out");
                    None
                }
            };
            counts.insert(headliner, count);
        }

        for event in events.iter_mut() {
            if let Some(headliner) = event.headliner().map(str::to_lowercase) {
                event.listeners = counts.get(&headliner).copied().flatten();
            }
        }
    }
}
