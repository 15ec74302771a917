//! End-to-end test infrastructure for waymark.
//!
//! Provides a shared TestHarness and fixture builders for tests covering
//! candidates, background fetching, merged search and cross-collection
//! selection.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use waymark_index::{
    Catalog, PlaceStore, RecordingNotifier, RecordingSink, RecordingSwitcher, SearchSession,
};
use waymark_types::{Collection, IndexSettings, Place, Visibility, Visit};

/// Base wall-clock time for every fixture, 2024-01-29 approx.
pub const BASE_TS_MS: i64 = 1_706_540_400_000;

/// Manually advanced clock shared with a session.
#[derive(Debug, Clone)]
pub struct TestClock {
    millis: Arc<AtomicI64>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(BASE_TS_MS)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .unwrap()
    }

    pub fn advance_ms(&self, ms: i64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared test harness for E2E tests.
///
/// Owns the recording collaborators, a controllable clock and a temp dir
/// holding the fixture catalog file.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Fixture catalog written to disk
    pub catalog_path: PathBuf,
    pub catalog: Catalog,
    pub switcher: Arc<RecordingSwitcher>,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<RecordingSink>,
    pub clock: TestClock,
}

impl TestHarness {
    /// Create a harness around [`fixture_catalog`].
    pub fn new() -> Self {
        Self::with_catalog(fixture_catalog())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let catalog_path = temp_dir.path().join("catalog.json");
        let mut file = std::fs::File::create(&catalog_path).expect("Failed to create catalog");
        let json = serde_json::to_vec_pretty(&catalog).expect("Failed to serialize catalog");
        file.write_all(&json).expect("Failed to write catalog");

        Self {
            _temp_dir: temp_dir,
            catalog_path,
            catalog,
            switcher: Arc::new(RecordingSwitcher::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            sink: Arc::new(RecordingSink::default()),
            clock: TestClock::new(),
        }
    }

    /// Session wired to the harness collaborators and clock.
    pub fn session<S: PlaceStore + 'static>(
        &self,
        store: Arc<S>,
        settings: IndexSettings,
    ) -> SearchSession<S> {
        let clock = self.clock.clone();
        SearchSession::new(
            store,
            settings,
            self.switcher.clone(),
            self.notifier.clone(),
            self.sink.clone(),
        )
        .expect("Invalid test settings")
        .with_clock(move || clock.now())
    }

    /// Feed the session the catalog's view for `user_id`.
    pub fn load_catalogs<S: PlaceStore + 'static>(
        &self,
        session: &mut SearchSession<S>,
        user_id: &str,
    ) {
        session.set_catalogs(
            self.catalog.collections.clone(),
            self.catalog.own_collections(user_id),
            self.catalog.joined_collections(user_id),
        );
    }

    /// Live places for a collection as the UI would report them.
    pub fn live_places(&self, collection_id: &str) -> Vec<Place> {
        self.catalog
            .places
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A place with one visit, so it survives orphan filtering.
pub fn visited_place(id: &str, name: &str, address: &str) -> Place {
    Place::new(id, name, address).with_visit(Visit::new(
        format!("{}-v1", id),
        Utc.timestamp_millis_opt(BASE_TS_MS).unwrap(),
    ))
}

/// Catalog used by most E2E tests.
///
/// - `alice` owns `home` (default) and `garden` (private), and joined `coast`
/// - `bob` owns `coast` (shared) and `diary` (private)
/// - `demo` is public and has no owner account
pub fn fixture_catalog() -> Catalog {
    let mut catalog = Catalog {
        collections: vec![
            Collection::new("home", "alice", "Alice's places").as_default(),
            Collection::new("garden", "alice", "Gardens"),
            Collection::new("coast", "bob", "Coast trip")
                .with_visibility(Visibility::Shared)
                .with_owner_name("Bob"),
            Collection::new("diary", "bob", "Bob's diary"),
            Collection::new("demo", "system", "Demo map").with_visibility(Visibility::Public),
        ],
        ..Default::default()
    };

    catalog.places.insert(
        "home".to_string(),
        vec![
            visited_place("h1", "Corner Bakery", "1 Main St"),
            visited_place("h2", "Harbor Books", "9 Quay Rd"),
        ],
    );
    catalog.places.insert(
        "garden".to_string(),
        vec![
            visited_place("g1", "Rose Garden", "Park Lane"),
            Place::new("g2", "Unvisited Garden", ""),
        ],
    );
    catalog.places.insert(
        "coast".to_string(),
        vec![
            visited_place("c1", "Harbor Bakery", "Pier 3"),
            visited_place("c2", "Lighthouse", "Cape Road"),
        ],
    );
    catalog.places.insert(
        "diary".to_string(),
        vec![visited_place("d1", "Secret Bakery", "")],
    );
    catalog.places.insert(
        "demo".to_string(),
        vec![visited_place("m1", "Town Hall", "Market Square")],
    );
    catalog
        .memberships
        .insert("alice".to_string(), vec!["coast".to_string()]);
    catalog
}

/// Collection ids of a candidate list, in order.
pub fn ids(collections: &[Collection]) -> Vec<String> {
    collections.iter().map(|c| c.id.clone()).collect()
}
