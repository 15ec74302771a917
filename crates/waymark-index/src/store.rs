//! Data-store collaborator.
//!
//! The index never queries storage directly. It asks a [`PlaceStore`] for
//! the full place list of one collection at a time and treats any error as
//! "zero places".

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use waymark_types::Place;

use crate::error::StoreError;

/// Trait for place stores.
///
/// Implementations return a full snapshot of one collection's places.
#[async_trait]
pub trait PlaceStore: Send + Sync {
    /// List every place in the collection.
    async fn list_places(&self, collection_id: &str) -> Result<Vec<Place>, StoreError>;
}

/// In-memory place store for testing.
#[derive(Default)]
pub struct MockPlaceStore {
    /// Places returned per collection
    pub places: HashMap<String, Vec<Place>>,
    /// Simulated latency per collection
    pub delays: HashMap<String, Duration>,
    /// Collections whose fetch fails
    pub failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockPlaceStore {
    /// Set the places for a collection.
    pub fn with_places(mut self, collection_id: &str, places: Vec<Place>) -> Self {
        self.places.insert(collection_id.to_string(), places);
        self
    }

    /// Add latency to a collection's fetch.
    pub fn with_delay(mut self, collection_id: &str, delay: Duration) -> Self {
        self.delays.insert(collection_id.to_string(), delay);
        self
    }

    /// Make a collection's fetch fail.
    pub fn with_failure(mut self, collection_id: &str) -> Self {
        self.failing.insert(collection_id.to_string());
        self
    }

    /// Collection ids in the order they were requested.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times a collection was requested.
    pub fn call_count(&self, collection_id: &str) -> usize {
        self.calls().iter().filter(|id| *id == collection_id).count()
    }

    /// Highest number of fetches that were outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceStore for MockPlaceStore {
    async fn list_places(&self, collection_id: &str) -> Result<Vec<Place>, StoreError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(collection_id.to_string());

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(collection_id) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(collection_id) {
            return Err(StoreError::Network(format!("{} unreachable", collection_id)));
        }

        Ok(self.places.get(collection_id).cloned().unwrap_or_default())
    }
}
