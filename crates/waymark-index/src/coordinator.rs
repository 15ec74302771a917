//! Fetch coordination for non-active collections.
//!
//! A reconciliation pass has two halves:
//!
//! 1. [`FetchCoordinatorState::reconcile`] is a pure planning step. It walks
//!    the candidates in order, skips the active collection, plans every
//!    collection not yet in the fetched set, and (while search is focused)
//!    re-plans collections whose cache is empty once the global refresh
//!    throttle has elapsed. Planned ids are marked fetched before the plan is
//!    returned, so a second pass started before any fetch resolves cannot
//!    enqueue them again.
//! 2. [`FetchCoordinator::execute`] runs the plan sequentially through the
//!    [`PlaceStore`], writing each snapshot (minus orphaned places) into the
//!    [`CollectionCache`]. Failures are cached as empty lists. A cancellation
//!    token is checked before each fetch and after each await; results that
//!    arrive after cancellation are discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waymark_types::{Collection, IndexSettings, Place};

use crate::cache::CollectionCache;
use crate::store::PlaceStore;

/// Default minimum interval between throttled refreshes of empty caches.
pub const DEFAULT_REFRESH_THROTTLE_MS: u64 = 5000;

/// Collections to fetch in one pass, in candidate order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchPlan {
    /// Pass that produced this plan
    pub pass_id: u64,
    /// Collections to fetch, in order
    pub collection_ids: Vec<String>,
    /// Subset re-planned by the empty-cache refresh rule
    pub refreshed: Vec<String>,
}

impl FetchPlan {
    /// Whether this pass needs no network activity.
    pub fn is_empty(&self) -> bool {
        self.collection_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collection_ids.len()
    }
}

/// Outcome of executing one plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    pub pass_id: u64,
    /// Fetched and cached
    pub fetched: Vec<String>,
    /// Store error; cached as empty
    pub failed: Vec<String>,
    /// Completed after cancellation; result dropped
    pub discarded: Vec<String>,
    /// Never started because of cancellation
    pub skipped: Vec<String>,
    /// Orphaned places filtered out across the pass
    pub orphans_dropped: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl FetchReport {
    /// Fold a follow-up pass into this report. Keeps this report's pass id.
    pub fn absorb(&mut self, other: FetchReport) {
        self.fetched.extend(other.fetched);
        self.failed.extend(other.failed);
        self.discarded.extend(other.discarded);
        self.skipped.extend(other.skipped);
        self.orphans_dropped += other.orphans_dropped;
        self.cancelled |= other.cancelled;
        self.elapsed_ms += other.elapsed_ms;
    }
}

/// Progress of a marked collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkStatus {
    /// Planned, fetch not started
    Queued,
    /// Fetch outstanding
    InFlight,
    /// Cache entry written (possibly empty after a failure)
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mark {
    pass_id: u64,
    status: MarkStatus,
}

/// Session-scoped reconciliation state.
///
/// Holds the fetched set and the single global refresh timestamp. The
/// throttle is shared by every collection, not tracked per collection.
#[derive(Debug, Clone, Default)]
pub struct FetchCoordinatorState {
    /// Collection id -> pass that marked it and how far it got
    fetched: HashMap<String, Mark>,
    last_global_refresh: Option<DateTime<Utc>>,
    next_pass_id: u64,
}

impl FetchCoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a collection is in the fetched set.
    pub fn is_fetched(&self, collection_id: &str) -> bool {
        self.fetched.contains_key(collection_id)
    }

    /// Progress of a marked collection.
    pub fn status(&self, collection_id: &str) -> Option<MarkStatus> {
        self.fetched.get(collection_id).map(|mark| mark.status)
    }

    /// Ids in the fetched set, sorted.
    pub fn fetched_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.fetched.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids whose fetch is outstanding, sorted.
    pub fn in_flight_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .fetched
            .iter()
            .filter(|(_, mark)| mark.status == MarkStatus::InFlight)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// When the last throttled refresh ran.
    pub fn last_global_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_global_refresh
    }

    fn set_status(&mut self, collection_id: &str, pass_id: u64, status: MarkStatus) {
        if let Some(mark) = self.fetched.get_mut(collection_id) {
            if mark.pass_id == pass_id {
                mark.status = status;
            }
        }
    }

    /// Remove an unsettled mark, but only if `pass_id` placed it.
    ///
    /// A later pass may have re-marked the id; that mark must survive.
    pub fn release(&mut self, collection_id: &str, pass_id: u64) -> bool {
        match self.fetched.get(collection_id) {
            Some(mark) if mark.pass_id == pass_id && mark.status != MarkStatus::Settled => {
                self.fetched.remove(collection_id);
                true
            }
            _ => false,
        }
    }

    /// Release every queued mark of a pass. In-flight marks stay until the
    /// fetch returns, so no collection is ever fetched twice at once.
    pub fn abort_pass(&mut self, pass_id: u64) -> usize {
        let before = self.fetched.len();
        self.fetched
            .retain(|_, mark| !(mark.pass_id == pass_id && mark.status == MarkStatus::Queued));
        before - self.fetched.len()
    }

    /// Forget every mark and the refresh timestamp.
    pub fn reset(&mut self) {
        self.fetched.clear();
        self.last_global_refresh = None;
    }

    /// Plan the fetches for one pass.
    ///
    /// `throttle` is the minimum interval between refreshes of empty caches.
    /// Every planned id is marked in the fetched set before returning.
    pub fn reconcile(
        &mut self,
        candidates: &[Collection],
        cache: &CollectionCache,
        active_collection_id: Option<&str>,
        search_focused: bool,
        now: DateTime<Utc>,
        throttle: chrono::Duration,
    ) -> FetchPlan {
        self.next_pass_id += 1;
        let pass_id = self.next_pass_id;

        // Decided once per pass so every empty cache in this pass is eligible.
        let throttle_open = self
            .last_global_refresh
            .map_or(true, |last| now - last > throttle);

        let mut plan = FetchPlan {
            pass_id,
            ..Default::default()
        };

        for collection in candidates {
            let id = collection.id.as_str();
            if Some(id) == active_collection_id {
                continue;
            }
            if plan.collection_ids.iter().any(|planned| planned == id) {
                continue;
            }

            match self.fetched.get(id).map(|mark| mark.status) {
                None => plan.collection_ids.push(id.to_string()),
                Some(MarkStatus::Settled)
                    if search_focused
                        && throttle_open
                        && cache.is_empty_for(id) =>
                {
                    self.fetched.remove(id);
                    plan.collection_ids.push(id.to_string());
                    plan.refreshed.push(id.to_string());
                }
                Some(_) => {}
            }
        }

        if !plan.refreshed.is_empty() {
            self.last_global_refresh = Some(now);
        }

        for id in &plan.collection_ids {
            self.fetched.insert(
                id.clone(),
                Mark {
                    pass_id,
                    status: MarkStatus::Queued,
                },
            );
        }

        plan
    }
}

/// Runs reconciliation passes against a place store.
pub struct FetchCoordinator<S: PlaceStore + 'static> {
    store: Arc<S>,
    cache: CollectionCache,
    state: Arc<Mutex<FetchCoordinatorState>>,
    /// Signalled whenever a pass finishes and its marks are settled or released
    settled: Arc<Notify>,
    refresh_throttle: chrono::Duration,
}

impl<S: PlaceStore + 'static> Clone for FetchCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            state: self.state.clone(),
            settled: self.settled.clone(),
            refresh_throttle: self.refresh_throttle,
        }
    }
}

impl<S: PlaceStore + 'static> FetchCoordinator<S> {
    /// Create a coordinator writing into `cache`.
    pub fn new(store: Arc<S>, cache: CollectionCache) -> Self {
        Self {
            store,
            cache,
            state: Arc::new(Mutex::new(FetchCoordinatorState::new())),
            settled: Arc::new(Notify::new()),
            refresh_throttle: chrono::Duration::milliseconds(DEFAULT_REFRESH_THROTTLE_MS as i64),
        }
    }

    /// Create a coordinator using the throttle from settings.
    pub fn from_settings(store: Arc<S>, cache: CollectionCache, settings: &IndexSettings) -> Self {
        Self::new(store, cache).with_refresh_throttle(settings.refresh_throttle())
    }

    /// Set the refresh throttle.
    pub fn with_refresh_throttle(mut self, throttle: chrono::Duration) -> Self {
        self.refresh_throttle = throttle;
        self
    }

    /// The cache this coordinator writes into.
    pub fn cache(&self) -> &CollectionCache {
        &self.cache
    }

    /// Copy of the current reconciliation state.
    pub fn state(&self) -> FetchCoordinatorState {
        self.lock_state().clone()
    }

    /// Forget fetched marks and the refresh timestamp (e.g. on logout).
    pub fn reset(&self) {
        self.lock_state().reset();
    }

    /// Release the queued marks of a cancelled pass right away, so the next
    /// reconcile can plan them without waiting for the old task to notice.
    pub fn abort_pass(&self, pass_id: u64) -> usize {
        self.lock_state().abort_pass(pass_id)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FetchCoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plan a pass. See [`FetchCoordinatorState::reconcile`].
    pub fn reconcile(
        &self,
        candidates: &[Collection],
        active_collection_id: Option<&str>,
        search_focused: bool,
        now: DateTime<Utc>,
    ) -> FetchPlan {
        let plan = self.lock_state().reconcile(
            candidates,
            &self.cache,
            active_collection_id,
            search_focused,
            now,
            self.refresh_throttle,
        );
        if !plan.is_empty() {
            debug!(
                pass_id = plan.pass_id,
                planned = plan.len(),
                refreshed = plan.refreshed.len(),
                "Reconciliation planned fetches"
            );
        }
        plan
    }

    /// Execute a plan sequentially, one collection at a time.
    ///
    /// Never fails: store errors become empty cache entries.
    pub async fn execute(&self, plan: FetchPlan, cancel: &CancellationToken) -> FetchReport {
        let start = Instant::now();
        let pass_id = plan.pass_id;
        let ids = plan.collection_ids;
        let mut report = FetchReport {
            pass_id,
            ..Default::default()
        };

        for (i, id) in ids.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped = ids[i..].to_vec();
                break;
            }

            debug!(pass_id, collection_id = %id, "Fetching collection places");
            self.lock_state()
                .set_status(id, pass_id, MarkStatus::InFlight);
            let result = self.store.list_places(id).await;

            if cancel.is_cancelled() {
                debug!(pass_id, collection_id = %id, "Pass cancelled, discarding fetched places");
                report.discarded.push(id.clone());
                report.skipped = ids[i + 1..].to_vec();
                break;
            }

            match result {
                Ok(places) => {
                    let total = places.len();
                    let kept = drop_orphans(places);
                    report.orphans_dropped += total - kept.len();
                    debug!(
                        collection_id = %id,
                        places = kept.len(),
                        orphans = total - kept.len(),
                        "Cached collection places"
                    );
                    self.cache.put(id.clone(), kept);
                    report.fetched.push(id.clone());
                }
                Err(e) => {
                    warn!(collection_id = %id, error = %e, "Failed to fetch collection places");
                    self.cache.put(id.clone(), Vec::new());
                    report.failed.push(id.clone());
                }
            }
            self.lock_state()
                .set_status(id, pass_id, MarkStatus::Settled);
        }

        if !report.discarded.is_empty() || !report.skipped.is_empty() {
            let mut state = self.lock_state();
            for id in report.discarded.iter().chain(report.skipped.iter()) {
                state.release(id, pass_id);
            }
        }

        report.cancelled = cancel.is_cancelled();
        report.elapsed_ms = start.elapsed().as_millis() as u64;
        self.settled.notify_waiters();

        info!(
            pass_id,
            fetched = report.fetched.len(),
            failed = report.failed.len(),
            discarded = report.discarded.len(),
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed_ms,
            "Fetch pass finished"
        );

        report
    }

    /// Wait until none of `ids` has a fetch outstanding.
    ///
    /// Returns `false` if `cancel` fires first.
    pub async fn wait_until_not_in_flight(&self, ids: &[String], cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            // Register before checking, so a pass finishing in between is not missed
            notified.as_mut().enable();

            let busy = {
                let state = self.lock_state();
                ids.iter()
                    .any(|id| state.status(id) == Some(MarkStatus::InFlight))
            };
            if !busy {
                return true;
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut notified => {}
            }
        }
    }

    /// Plan and execute in one call.
    pub async fn run_pass(
        &self,
        candidates: &[Collection],
        active_collection_id: Option<&str>,
        search_focused: bool,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> FetchReport {
        let plan = self.reconcile(candidates, active_collection_id, search_focused, now);
        self.execute(plan, cancel).await
    }
}

/// Keep only places with at least one visit.
pub fn drop_orphans(places: Vec<Place>) -> Vec<Place> {
    places.into_iter().filter(|p| !p.is_orphan()).collect()
}
