//! Session driver for the federated index.
//!
//! `SearchSession` owns every piece of per-session state (inputs, cache,
//! reconciliation state, pending selection) and runs a reconciliation pass
//! whenever the viewer, the catalogs, the active collection or search focus
//! changes. Each pass executes on its own task with its own cancellation
//! token; a change to the candidate set or the viewer cancels the running
//! pass before the next one is planned. A collection the cancelled pass was
//! still fetching is fetched again by the new pass if it remains a candidate.
//!
//! Setters that schedule a pass must be called from inside a tokio runtime.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use waymark_types::{Collection, IndexSettings, Place, Role, User};

use crate::cache::CollectionCache;
use crate::collaborators::{CollectionSwitcher, Notifier, SelectionSink};
use crate::coordinator::{FetchCoordinator, FetchReport};
use crate::error::IndexError;
use crate::pending::{PendingSelectionResolver, ResolutionOutcome, SelectionOutcome};
use crate::search::{SearchHit, SearchIndex, SearchOptions};
use crate::store::PlaceStore;
use crate::visibility::{VisibilityInput, VisibilityResolver};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

type PassIds = Arc<Mutex<Vec<u64>>>;

/// Passes started since the candidate set last changed. They share one token.
///
/// Follow-up passes planned inside a task register here too, under the lock,
/// so cancelling releases their queued marks as well.
struct RunningPasses {
    pass_ids: PassIds,
    cancel: CancellationToken,
}

/// One user's search session.
pub struct SearchSession<S: PlaceStore + 'static> {
    settings: IndexSettings,
    visibility: VisibilityResolver,
    coordinator: FetchCoordinator<S>,
    resolver: PendingSelectionResolver,
    clock: Clock,

    user: Option<User>,
    role: Role,
    all_collections: Vec<Collection>,
    own_collections: Vec<Collection>,
    joined_collections: Vec<Collection>,
    active_collection_id: Option<String>,
    active_places: Vec<Place>,
    search_focused: bool,

    candidates: Vec<Collection>,
    running: Option<RunningPasses>,
}

impl<S: PlaceStore + 'static> SearchSession<S> {
    /// Create a session with validated settings.
    pub fn new(
        store: Arc<S>,
        settings: IndexSettings,
        switcher: Arc<dyn CollectionSwitcher>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn SelectionSink>,
    ) -> Result<Self, IndexError> {
        settings.validate()?;

        let coordinator = FetchCoordinator::from_settings(store, CollectionCache::new(), &settings);
        let resolver = PendingSelectionResolver::new(switcher, notifier, sink)
            .with_timeout(settings.pending_selection_timeout());

        Ok(Self {
            visibility: VisibilityResolver::new(settings.demo_collection_id.clone()),
            settings,
            coordinator,
            resolver,
            clock: Arc::new(Utc::now),
            user: None,
            role: Role::default(),
            all_collections: Vec::new(),
            own_collections: Vec::new(),
            joined_collections: Vec::new(),
            active_collection_id: None,
            active_places: Vec::new(),
            search_focused: false,
            candidates: Vec::new(),
            running: None,
        })
    }

    /// Replace the wall clock (tests drive time explicitly).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Current ordered candidate list.
    pub fn candidates(&self) -> &[Collection] {
        &self.candidates
    }

    pub fn cache(&self) -> &CollectionCache {
        self.coordinator.cache()
    }

    pub fn coordinator(&self) -> &FetchCoordinator<S> {
        &self.coordinator
    }

    pub fn resolver(&self) -> &PendingSelectionResolver {
        &self.resolver
    }

    pub fn active_collection_id(&self) -> Option<&str> {
        self.active_collection_id.as_deref()
    }

    /// Set the signed-in user and role.
    pub fn set_viewer(&mut self, user: Option<User>, role: Role) -> Option<JoinHandle<FetchReport>> {
        self.user = user;
        self.role = role;
        self.schedule_pass()
    }

    /// Replace the collection catalogs.
    pub fn set_catalogs(
        &mut self,
        all: Vec<Collection>,
        own: Vec<Collection>,
        joined: Vec<Collection>,
    ) -> Option<JoinHandle<FetchReport>> {
        self.all_collections = all;
        self.own_collections = own;
        self.joined_collections = joined;
        self.schedule_pass()
    }

    /// Change the active collection. Its live places arrive separately
    /// through [`update_active_places`](Self::update_active_places).
    pub fn set_active_collection(&mut self, collection_id: Option<String>) -> Option<JoinHandle<FetchReport>> {
        if self.active_collection_id != collection_id {
            self.active_places.clear();
        }
        self.active_collection_id = collection_id;
        self.schedule_pass()
    }

    /// Mark the search box focused or blurred.
    pub fn set_search_focused(&mut self, focused: bool) -> Option<JoinHandle<FetchReport>> {
        self.search_focused = focused;
        self.schedule_pass()
    }

    /// Live place list of the active collection changed.
    ///
    /// Never triggers a fetch. Feeds the pending-selection resolver.
    pub fn update_active_places(&mut self, collection_id: &str, places: Vec<Place>) -> ResolutionOutcome {
        let now = (self.clock)();
        let outcome = self.resolver.on_live_places(collection_id, &places, now);
        if self.active_collection_id.as_deref() == Some(collection_id) {
            self.active_places = places;
        } else {
            debug!(collection_id, "Ignoring live places for inactive collection");
        }
        outcome
    }

    /// Snapshot of the merged index.
    pub fn index(&self) -> SearchIndex {
        SearchIndex::build(
            &self.candidates,
            self.active_collection_id.as_deref(),
            &self.active_places,
            self.coordinator.cache(),
        )
    }

    /// Query with the configured options.
    pub fn search(&self, text: &str) -> Vec<SearchHit> {
        self.search_with(text, &SearchOptions::from_settings(&self.settings))
    }

    /// Query with explicit options.
    pub fn search_with(&self, text: &str, opts: &SearchOptions) -> Vec<SearchHit> {
        self.index().query(text, opts)
    }

    /// Select a search hit; may switch the active collection.
    pub fn select(&mut self, hit: &SearchHit) -> SelectionOutcome {
        let now = (self.clock)();
        self.resolver
            .select(hit, self.active_collection_id.as_deref(), now)
    }

    /// User left the search flow.
    pub fn navigate_away(&mut self) -> bool {
        self.resolver.cancel()
    }

    /// Tear the session down: cancel fetching, drop pending selection and
    /// forget everything fetched so far.
    pub fn logout(&mut self) {
        self.cancel_running();
        self.resolver.cancel();
        self.user = None;
        self.candidates.clear();
        self.active_places.clear();
        self.coordinator.reset();
        self.coordinator.cache().clear();
        info!("Search session logged out");
    }

    fn cancel_running(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            let pass_ids = running
                .pass_ids
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for &pass_id in pass_ids.iter() {
                let released = self.coordinator.abort_pass(pass_id);
                debug!(pass_id, released, "Cancelled fetch pass");
            }
        }
    }

    /// Recompute candidates and run a reconciliation pass.
    ///
    /// Returns the task handle when the pass has anything to fetch.
    pub fn schedule_pass(&mut self) -> Option<JoinHandle<FetchReport>> {
        let candidates = self.visibility.compute_candidates(&VisibilityInput {
            user: self.user.as_ref(),
            role: self.role,
            active_collection_id: self.active_collection_id.as_deref(),
            all_collections: &self.all_collections,
            own_collections: &self.own_collections,
            joined_collections: &self.joined_collections,
        });

        // Collections the cancelled passes were still fetching; their results
        // are discarded, so they are planned again once they come back
        let mut carried = Vec::new();
        if candidates != self.candidates || self.user.is_none() {
            if self.running.is_some() {
                carried = self.coordinator.state().in_flight_ids();
            }
            self.cancel_running();
        }
        self.candidates = candidates;
        carried.retain(|id| {
            self.active_collection_id.as_deref() != Some(id.as_str())
                && self.candidates.iter().any(|c| &c.id == id)
        });

        let now = (self.clock)();
        let plan = self.coordinator.reconcile(
            &self.candidates,
            self.active_collection_id.as_deref(),
            self.search_focused,
            now,
        );
        if plan.is_empty() && carried.is_empty() {
            return None;
        }

        let running = self.running.get_or_insert_with(|| RunningPasses {
            pass_ids: PassIds::default(),
            cancel: CancellationToken::new(),
        });
        running
            .pass_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(plan.pass_id);
        let cancel = running.cancel.clone();
        let pass_ids = running.pass_ids.clone();

        let coordinator = self.coordinator.clone();
        let candidates = self.candidates.clone();
        let active = self.active_collection_id.clone();
        let clock = self.clock.clone();
        Some(tokio::spawn(async move {
            let mut report = coordinator.execute(plan, &cancel).await;
            if carried.is_empty()
                || !coordinator
                    .wait_until_not_in_flight(&carried, &cancel)
                    .await
            {
                return report;
            }

            let followup = {
                let mut pass_ids = pass_ids.lock().unwrap_or_else(PoisonError::into_inner);
                if cancel.is_cancelled() {
                    return report;
                }
                let plan = coordinator.reconcile(&candidates, active.as_deref(), false, clock());
                pass_ids.push(plan.pass_id);
                plan
            };
            if !followup.is_empty() {
                debug!(
                    pass_id = report.pass_id,
                    followup = followup.pass_id,
                    "Refetching collections interrupted by cancellation"
                );
                report.absorb(coordinator.execute(followup, &cancel).await);
            }
            report
        }))
    }
}
