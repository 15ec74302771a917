//! Merged search over the active collection and cached collections.
//!
//! Sources follow candidate order. The active collection contributes its
//! live place list; every other candidate contributes whatever the cache
//! holds (nothing, if it has not been fetched yet).
//!
//! Ranking is source order first, match quality second, insertion order
//! last. This is plain substring matching, not relevance scoring.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use waymark_types::{Collection, IndexSettings, Place};

use crate::cache::CollectionCache;

/// One collection's contribution to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSource {
    pub collection: Collection,
    pub places: Vec<Place>,
}

/// How a place matched the query. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Name equals the query
    ExactName,
    /// Name starts with the query
    NamePrefix,
    /// Name contains the query
    NameContains,
    /// Address contains the query
    AddressContains,
    /// Every query term appears somewhere in name or address
    AllTerms,
    /// Empty query listing
    Listing,
}

/// Query options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Return every place when the query is empty
    pub show_all_when_empty: bool,
    /// Maximum number of hits
    pub limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            show_all_when_empty: true,
            limit: None,
        }
    }
}

impl SearchOptions {
    pub fn from_settings(settings: &IndexSettings) -> Self {
        Self {
            show_all_when_empty: settings.show_all_when_empty,
            limit: settings.result_limit,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub place: Place,
    pub collection: Collection,
    /// Position of the source collection in candidate order
    pub source_rank: usize,
    pub match_kind: MatchKind,
}

/// Assemble sources in candidate order.
pub fn build_sources(
    candidates: &[Collection],
    active_collection_id: Option<&str>,
    active_live_places: &[Place],
    cache: &CollectionCache,
) -> Vec<SearchSource> {
    candidates
        .iter()
        .map(|collection| {
            let places = if Some(collection.id.as_str()) == active_collection_id {
                active_live_places.to_vec()
            } else {
                cache.places(&collection.id)
            };
            SearchSource {
                collection: collection.clone(),
                places,
            }
        })
        .collect()
}

/// Run a query over assembled sources.
pub fn query(sources: &[SearchSource], text: &str, opts: &SearchOptions) -> Vec<SearchHit> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() && !opts.show_all_when_empty {
        return Vec::new();
    }
    let terms: Vec<&str> = needle.split_whitespace().collect();

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut hits = Vec::new();

    for (source_rank, source) in sources.iter().enumerate() {
        let mut matched: Vec<(MatchKind, usize, &Place)> = Vec::new();

        for (position, place) in source.places.iter().enumerate() {
            if !seen.insert((source.collection.id.as_str(), place.id.as_str())) {
                continue;
            }
            let kind = if needle.is_empty() {
                Some(MatchKind::Listing)
            } else {
                match_place(place, &needle, &terms)
            };
            if let Some(kind) = kind {
                matched.push((kind, position, place));
            }
        }

        matched.sort_by_key(|(kind, position, _)| (*kind, *position));
        hits.extend(matched.into_iter().map(|(match_kind, _, place)| SearchHit {
            place: place.clone(),
            collection: source.collection.clone(),
            source_rank,
            match_kind,
        }));

        if opts.limit.is_some_and(|limit| hits.len() >= limit) {
            break;
        }
    }

    if let Some(limit) = opts.limit {
        hits.truncate(limit);
    }
    hits
}

fn match_place(place: &Place, needle: &str, terms: &[&str]) -> Option<MatchKind> {
    let name = place.name.to_lowercase();
    let address = place.address.to_lowercase();

    if name == needle {
        Some(MatchKind::ExactName)
    } else if name.starts_with(needle) {
        Some(MatchKind::NamePrefix)
    } else if name.contains(needle) {
        Some(MatchKind::NameContains)
    } else if address.contains(needle) {
        Some(MatchKind::AddressContains)
    } else if terms.len() > 1
        && terms
            .iter()
            .all(|term| name.contains(term) || address.contains(term))
    {
        Some(MatchKind::AllTerms)
    } else {
        None
    }
}

/// A snapshot of ranked sources ready to be queried.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    sources: Vec<SearchSource>,
}

impl SearchIndex {
    /// Build from candidates, the active collection's live places and the cache.
    pub fn build(
        candidates: &[Collection],
        active_collection_id: Option<&str>,
        active_live_places: &[Place],
        cache: &CollectionCache,
    ) -> Self {
        Self {
            sources: build_sources(candidates, active_collection_id, active_live_places, cache),
        }
    }

    pub fn sources(&self) -> &[SearchSource] {
        &self.sources
    }

    /// Total places across all sources.
    pub fn place_count(&self) -> usize {
        self.sources.iter().map(|s| s.places.len()).sum()
    }

    pub fn query(&self, text: &str, opts: &SearchOptions) -> Vec<SearchHit> {
        query(&self.sources, text, opts)
    }
}
