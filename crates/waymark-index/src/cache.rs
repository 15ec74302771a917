//! Per-collection place cache.
//!
//! Maps collection id to the last fetched place list. Each fetch is a full
//! snapshot of the collection, so `put` replaces the entry wholesale
//! (last write wins, no merging). A failed fetch is stored as an empty list,
//! so a collection never drops out of the index because of an error.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use waymark_types::Place;

/// Cached state of one collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheEntry {
    /// Last known places; `None` until the first fetch lands
    pub places: Option<Vec<Place>>,
    /// Whether a fetch (successful or failed) has populated this entry
    pub fetched: bool,
}

impl CacheEntry {
    /// Whether the entry holds no places (absent counts as empty).
    pub fn is_empty(&self) -> bool {
        self.places.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Shared handle to the collection cache.
///
/// Cloning is cheap; all clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct CollectionCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl CollectionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a collection, if any.
    pub fn get(&self, collection_id: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection_id)
            .cloned()
    }

    /// Replace the entry for a collection and mark it fetched.
    pub fn put(&self, collection_id: impl Into<String>, places: Vec<Place>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                collection_id.into(),
                CacheEntry {
                    places: Some(places),
                    fetched: true,
                },
            );
    }

    /// Whether an entry exists, even an empty one.
    pub fn has(&self, collection_id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(collection_id)
    }

    /// Drop the entry for a collection. Returns the removed entry.
    pub fn evict(&self, collection_id: &str) -> Option<CacheEntry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection_id)
    }

    /// Cached places for a collection, empty when nothing is cached.
    pub fn places(&self, collection_id: &str) -> Vec<Place> {
        self.get(collection_id)
            .and_then(|entry| entry.places)
            .unwrap_or_default()
    }

    /// Whether the cached place list is empty or missing.
    pub fn is_empty_for(&self, collection_id: &str) -> bool {
        self.get(collection_id).map_or(true, |entry| entry.is_empty())
    }

    /// Number of cached collections.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(id: &str) -> Place {
        Place::new(id, format!("Place {}", id), "")
    }

    #[test]
    fn test_put_and_get() {
        let cache = CollectionCache::new();
        assert!(cache.get("m1").is_none());
        assert!(!cache.has("m1"));

        cache.put("m1", vec![place("p1")]);
        let entry = cache.get("m1").unwrap();
        assert!(entry.fetched);
        assert_eq!(entry.places.unwrap().len(), 1);
        assert!(cache.has("m1"));
    }

    #[test]
    fn test_empty_entry_still_present() {
        let cache = CollectionCache::new();
        cache.put("m1", vec![]);
        assert!(cache.has("m1"));
        assert_eq!(
            cache.get("m1"),
            Some(CacheEntry {
                places: Some(vec![]),
                fetched: true
            })
        );
        assert!(cache.is_empty_for("m1"));
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let cache = CollectionCache::new();
        cache.put("m1", vec![place("p1"), place("p2")]);
        cache.put("m1", vec![place("p3")]);
        let ids: Vec<String> = cache.places("m1").into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p3"]);
    }

    #[test]
    fn test_put_idempotent() {
        let cache = CollectionCache::new();
        cache.put("m1", vec![place("p1")]);
        let first = cache.get("m1");
        cache.put("m1", vec![place("p1")]);
        assert_eq!(cache.get("m1"), first);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = CollectionCache::new();
        let other = cache.clone();
        other.put("m1", vec![place("p1")]);
        assert!(cache.has("m1"));

        cache.evict("m1");
        assert!(!other.has("m1"));
        assert!(other.is_empty_for("m1"));
    }

    #[test]
    fn test_absent_entry_counts_as_empty() {
        assert!(CacheEntry::default().is_empty());
        let cache = CollectionCache::new();
        assert!(cache.places("missing").is_empty());
    }
}
