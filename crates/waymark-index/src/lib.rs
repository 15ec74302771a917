//! # waymark-index
//!
//! Federated place search for the waymark system.
//!
//! A user can see many collections at once: their own, the ones they joined,
//! everything (admins), or a single public demo collection (guests). This
//! crate decides which collections are searchable, fetches their places in
//! the background, merges them into one ranked result list, and follows the
//! user to another collection when they pick a result that lives there.
//!
//! ## Core Concepts
//!
//! - **Candidates**: Ordered, de-duplicated collections the viewer may search
//! - **Reconciliation pass**: Plans which candidates still need fetching and
//!   fetches them one at a time under a cancellation token
//! - **Cache**: Last-known places per collection, empty on fetch failure
//! - **Pending selection**: A chosen place waiting for its collection to load
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waymark_index::{CatalogStore, Catalog, SearchSession};
//!
//! let catalog = Catalog::load("catalog.json").await?;
//! let store = Arc::new(CatalogStore::new(catalog.clone()).with_viewer("u1"));
//! let mut session = SearchSession::new(store, settings.index, switcher, notifier, sink)?;
//!
//! session.set_catalogs(catalog.collections.clone(), catalog.own_collections("u1"), catalog.joined_collections("u1"));
//! if let Some(pass) = session.set_viewer(Some(User::new("u1")), Role::Ordinary) {
//!     pass.await?;
//! }
//! let hits = session.search("bakery");
//! ```
//!
//! ## Modules
//!
//! - [`visibility`]: Candidate computation per role
//! - [`cache`]: Shared per-collection place cache
//! - [`coordinator`]: Reconciliation planning and sequential fetching
//! - [`search`]: Merged, ranked querying
//! - [`pending`]: Cross-collection selection state machine
//! - [`session`]: Wires the above together for one user
//! - [`catalog`]: JSON catalog file as a place store

pub mod cache;
pub mod catalog;
pub mod collaborators;
pub mod coordinator;
pub mod error;
pub mod pending;
pub mod search;
pub mod session;
pub mod store;
pub mod visibility;

// Re-export main types at crate root
pub use cache::{CacheEntry, CollectionCache};
pub use catalog::{Catalog, CatalogStore};
pub use collaborators::{
    CollectionSwitcher, NavigationNotice, Notifier, RecordingNotifier, RecordingSink,
    RecordingSwitcher, SelectionSink,
};
pub use coordinator::{
    drop_orphans, FetchCoordinator, FetchCoordinatorState, FetchPlan, FetchReport, MarkStatus,
};
pub use error::{IndexError, StoreError};
pub use pending::{
    PendingSelectionResolver, PendingState, ResolutionOutcome, SelectionEvent, SelectionOutcome,
};
pub use search::{MatchKind, SearchHit, SearchIndex, SearchOptions, SearchSource};
pub use session::SearchSession;
pub use store::{MockPlaceStore, PlaceStore};
pub use visibility::{VisibilityInput, VisibilityResolver};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::collaborators::{CollectionSwitcher, Notifier, SelectionSink};
    pub use crate::search::{SearchHit, SearchOptions};
    pub use crate::session::SearchSession;
    pub use crate::store::PlaceStore;
}
