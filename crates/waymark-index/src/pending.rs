//! Two-phase selection across collections.
//!
//! Selecting a hit from the active collection resolves immediately. A hit
//! from any other collection first switches the active collection, then
//! waits for that collection's live place list to arrive and resolves
//! against the fresh copy of the place.
//!
//! ```text
//! Idle --select(other collection)--> AwaitingCollectionData
//! AwaitingCollectionData --live places contain id--> Idle (callback fires)
//! AwaitingCollectionData --select--> AwaitingCollectionData (overwritten)
//! AwaitingCollectionData --deadline / navigate away--> Idle (abandoned)
//! ```
//!
//! The wait is bounded: a selection whose target never shows the place
//! (deleted concurrently, say) is abandoned after the configured timeout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waymark_types::{Collection, IndexSettings, Place};

use crate::collaborators::{CollectionSwitcher, NavigationNotice, Notifier, SelectionSink};
use crate::search::SearchHit;

/// Resolver state.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingState {
    Idle,
    AwaitingCollectionData {
        place: Place,
        target: Collection,
        requested_at: DateTime<Utc>,
    },
}

/// Result of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Place was in the active collection; callback already invoked
    Resolved,
    /// Collection switch requested; waiting for its data
    Pending,
}

/// Result of feeding an event to the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// Nothing was pending
    Idle,
    /// Still waiting for the target collection
    StillPending,
    /// Callback invoked with this place
    Resolved(Place),
    /// Pending selection dropped (deadline or navigation)
    Abandoned,
}

/// Messages that drive the resolver.
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    /// User picked a search hit
    Select {
        hit: SearchHit,
        active_collection_id: Option<String>,
    },
    /// Live place list of the active collection changed
    LivePlaces {
        collection_id: String,
        places: Vec<Place>,
    },
    /// User left the search flow
    NavigatedAway,
}

/// State machine for cross-collection selection.
pub struct PendingSelectionResolver {
    state: PendingState,
    switcher: Arc<dyn CollectionSwitcher>,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn SelectionSink>,
    timeout: chrono::Duration,
}

impl PendingSelectionResolver {
    /// Create an idle resolver.
    pub fn new(
        switcher: Arc<dyn CollectionSwitcher>,
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn SelectionSink>,
    ) -> Self {
        Self {
            state: PendingState::Idle,
            switcher,
            notifier,
            sink,
            timeout: IndexSettings::default().pending_selection_timeout(),
        }
    }

    /// Set the bounded wait for the target collection.
    pub fn with_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &PendingState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PendingState::AwaitingCollectionData { .. })
    }

    /// Handle a user selection. Overwrites any earlier pending selection.
    pub fn select(
        &mut self,
        hit: &SearchHit,
        active_collection_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> SelectionOutcome {
        if Some(hit.collection.id.as_str()) == active_collection_id {
            if self.is_pending() {
                debug!("Selection in active collection replaces pending selection");
            }
            self.state = PendingState::Idle;
            self.sink.on_resolved(&hit.place, &hit.collection);
            return SelectionOutcome::Resolved;
        }

        if let PendingState::AwaitingCollectionData { place, .. } = &self.state {
            debug!(previous = %place.id, "Overwriting pending selection");
        }

        info!(
            place_id = %hit.place.id,
            collection_id = %hit.collection.id,
            "Switching collection for selection"
        );
        self.state = PendingState::AwaitingCollectionData {
            place: hit.place.clone(),
            target: hit.collection.clone(),
            requested_at: now,
        };
        self.switcher.set_active_collection(&hit.collection);
        self.notifier
            .notify(NavigationNotice::for_collection(&hit.collection));
        SelectionOutcome::Pending
    }

    /// Feed a live place update for the active collection.
    pub fn on_live_places(
        &mut self,
        collection_id: &str,
        places: &[Place],
        now: DateTime<Utc>,
    ) -> ResolutionOutcome {
        if self.expire(now) {
            return ResolutionOutcome::Abandoned;
        }

        let (place_id, target) = match &self.state {
            PendingState::Idle => return ResolutionOutcome::Idle,
            PendingState::AwaitingCollectionData { place, target, .. } => (&place.id, target),
        };

        if target.id != collection_id {
            return ResolutionOutcome::StillPending;
        }

        match places.iter().find(|p| &p.id == place_id) {
            Some(fresh) => {
                let fresh = fresh.clone();
                let target = target.clone();
                self.state = PendingState::Idle;
                debug!(place_id = %fresh.id, collection_id, "Pending selection resolved");
                self.sink.on_resolved(&fresh, &target);
                ResolutionOutcome::Resolved(fresh)
            }
            None => ResolutionOutcome::StillPending,
        }
    }

    /// Abandon the pending selection if its deadline has passed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match &self.state {
            PendingState::AwaitingCollectionData { requested_at, .. } => {
                now - *requested_at > self.timeout
            }
            PendingState::Idle => false,
        };
        if expired {
            self.abandon("deadline passed");
        }
        expired
    }

    /// Drop the pending selection (user navigated away).
    pub fn cancel(&mut self) -> bool {
        if self.is_pending() {
            self.abandon("navigated away");
            true
        } else {
            false
        }
    }

    fn abandon(&mut self, reason: &str) {
        if let PendingState::AwaitingCollectionData { place, target, .. } = &self.state {
            warn!(
                place_id = %place.id,
                collection_id = %target.id,
                reason,
                "Abandoning pending selection"
            );
        }
        self.state = PendingState::Idle;
    }

    /// Time left before the pending selection is abandoned.
    ///
    /// `None` when idle, or when the deadline lies beyond what a timestamp
    /// can represent.
    pub fn time_until_deadline(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        match &self.state {
            PendingState::AwaitingCollectionData { requested_at, .. } => {
                let deadline = requested_at.checked_add_signed(self.timeout)?;
                Some((deadline - now).to_std().unwrap_or_default())
            }
            PendingState::Idle => None,
        }
    }

    /// Apply one event.
    pub fn handle(&mut self, event: SelectionEvent, now: DateTime<Utc>) -> ResolutionOutcome {
        match event {
            SelectionEvent::Select {
                hit,
                active_collection_id,
            } => match self.select(&hit, active_collection_id.as_deref(), now) {
                SelectionOutcome::Resolved => ResolutionOutcome::Resolved(hit.place),
                SelectionOutcome::Pending => ResolutionOutcome::StillPending,
            },
            SelectionEvent::LivePlaces {
                collection_id,
                places,
            } => self.on_live_places(&collection_id, &places, now),
            SelectionEvent::NavigatedAway => {
                if self.cancel() {
                    ResolutionOutcome::Abandoned
                } else {
                    ResolutionOutcome::Idle
                }
            }
        }
    }

    /// Consume events until the channel closes or `cancel` fires.
    ///
    /// A pending selection is abandoned when its deadline timer fires.
    /// Returns the resolver so callers can inspect the final state.
    pub async fn run_listener(
        mut self,
        mut events: mpsc::Receiver<SelectionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        loop {
            let wait = self.time_until_deadline(Utc::now());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep_or_forever(wait) => self.abandon("deadline passed"),
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event, Utc::now());
                    }
                    None => break,
                },
            }
        }
        self
    }
}

async fn sleep_or_forever(wait: Option<std::time::Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use waymark_types::{Visibility, Visit};

    use crate::collaborators::{RecordingNotifier, RecordingSink, RecordingSwitcher};
    use crate::search::MatchKind;

    struct Fixture {
        switcher: Arc<RecordingSwitcher>,
        notifier: Arc<RecordingNotifier>,
        sink: Arc<RecordingSink>,
        resolver: PendingSelectionResolver,
    }

    fn fixture() -> Fixture {
        let switcher = Arc::new(RecordingSwitcher::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = Arc::new(RecordingSink::default());
        let resolver = PendingSelectionResolver::new(switcher.clone(), notifier.clone(), sink.clone());
        Fixture {
            switcher,
            notifier,
            sink,
            resolver,
        }
    }

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn hit(collection_id: &str, place_id: &str) -> SearchHit {
        SearchHit {
            place: Place::new(place_id, "Harbor Bar", "1 Quay"),
            collection: Collection::new(collection_id, "u2", "Coast trip")
                .with_visibility(Visibility::Shared)
                .with_owner_name("Alex"),
            source_rank: 0,
            match_kind: MatchKind::NamePrefix,
        }
    }

    #[test]
    fn test_same_collection_resolves_immediately() {
        let mut f = fixture();
        let outcome = f.resolver.select(&hit("t", "p1"), Some("t"), ts(0));
        assert_eq!(outcome, SelectionOutcome::Resolved);
        assert!(!f.resolver.is_pending());
        assert_eq!(f.sink.resolved().len(), 1);
        assert!(f.switcher.switched().is_empty());
        assert!(f.notifier.notices().is_empty());
    }

    #[test]
    fn test_cross_collection_switches_and_notifies() {
        let mut f = fixture();
        let outcome = f.resolver.select(&hit("t", "p1"), Some("home"), ts(0));
        assert_eq!(outcome, SelectionOutcome::Pending);
        assert!(f.resolver.is_pending());
        assert_eq!(f.switcher.switched(), vec!["t"]);

        let notices = f.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].name, "Coast trip");
        assert_eq!(notices[0].owner, "Alex");
        assert_eq!(notices[0].visibility, Visibility::Shared);
        assert!(f.sink.resolved().is_empty());
    }

    #[test]
    fn test_resolves_once_with_fresh_place() {
        let mut f = fixture();
        f.resolver.select(&hit("t", "p1"), Some("home"), ts(0));

        // Update for the old collection is ignored.
        let outcome = f
            .resolver
            .on_live_places("home", &[Place::new("p1", "Other", "")], ts(10));
        assert_eq!(outcome, ResolutionOutcome::StillPending);

        // Target data without the place keeps waiting.
        let outcome = f.resolver.on_live_places("t", &[], ts(20));
        assert_eq!(outcome, ResolutionOutcome::StillPending);

        let fresh = Place::new("p1", "Harbor Bar (renamed)", "1 Quay")
            .with_visit(Visit::new("v1", ts(0)));
        let outcome = f.resolver.on_live_places("t", &[fresh.clone()], ts(30));
        assert_eq!(outcome, ResolutionOutcome::Resolved(fresh.clone()));
        assert_eq!(f.resolver.state(), &PendingState::Idle);

        // A second update does not fire the callback again.
        let outcome = f.resolver.on_live_places("t", &[fresh.clone()], ts(40));
        assert_eq!(outcome, ResolutionOutcome::Idle);

        let resolved = f.sink.resolved();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0], ("t".to_string(), fresh));
    }

    #[test]
    fn test_new_selection_overwrites_pending() {
        let mut f = fixture();
        f.resolver.select(&hit("t", "p1"), Some("home"), ts(0));
        f.resolver.select(&hit("u", "p9"), Some("home"), ts(5));

        let outcome = f
            .resolver
            .on_live_places("t", &[Place::new("p1", "Harbor Bar", "")], ts(10));
        assert_eq!(outcome, ResolutionOutcome::StillPending);

        let outcome = f
            .resolver
            .on_live_places("u", &[Place::new("p9", "Lighthouse", "")], ts(20));
        assert!(matches!(outcome, ResolutionOutcome::Resolved(p) if p.id == "p9"));
        assert_eq!(f.switcher.switched(), vec!["t", "u"]);
        assert_eq!(f.sink.resolved().len(), 1);
    }

    #[test]
    fn test_deadline_abandons() {
        let mut f = fixture();
        f.resolver = f.resolver.with_timeout(chrono::Duration::milliseconds(1000));
        f.resolver.select(&hit("t", "p1"), Some("home"), ts(0));

        assert!(!f.resolver.expire(ts(1000)));
        let outcome = f
            .resolver
            .on_live_places("t", &[Place::new("p1", "Harbor Bar", "")], ts(1001));
        assert_eq!(outcome, ResolutionOutcome::Abandoned);
        assert!(f.sink.resolved().is_empty());
    }

    #[test]
    fn test_navigate_away() {
        let mut f = fixture();
        assert_eq!(
            f.resolver.handle(SelectionEvent::NavigatedAway, ts(0)),
            ResolutionOutcome::Idle
        );
        f.resolver.select(&hit("t", "p1"), Some("home"), ts(0));
        assert_eq!(
            f.resolver.handle(SelectionEvent::NavigatedAway, ts(1)),
            ResolutionOutcome::Abandoned
        );
        assert!(!f.resolver.is_pending());
    }

    #[test]
    fn test_time_until_deadline() {
        let mut f = fixture();
        assert!(f.resolver.time_until_deadline(ts(0)).is_none());
        f.resolver = f.resolver.with_timeout(chrono::Duration::milliseconds(500));
        f.resolver.select(&hit("t", "p1"), None, ts(0));
        assert_eq!(
            f.resolver.time_until_deadline(ts(200)),
            Some(std::time::Duration::from_millis(300))
        );
        assert_eq!(
            f.resolver.time_until_deadline(ts(900)),
            Some(std::time::Duration::ZERO)
        );
    }

    #[test]
    fn test_unrepresentable_deadline_is_none() {
        let mut f = fixture();
        f.resolver = f.resolver.with_timeout(chrono::Duration::MAX);
        f.resolver.select(&hit("t", "p1"), None, Utc::now());
        assert!(f.resolver.is_pending());
        assert!(f.resolver.time_until_deadline(Utc::now()).is_none());
        assert!(!f.resolver.expire(Utc::now()));
    }

    #[tokio::test]
    async fn test_listener_resolves_from_events() {
        let f = fixture();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let listener = tokio::spawn(f.resolver.run_listener(rx, cancel.clone()));

        tx.send(SelectionEvent::Select {
            hit: hit("t", "p1"),
            active_collection_id: Some("home".to_string()),
        })
        .await
        .unwrap();
        tx.send(SelectionEvent::LivePlaces {
            collection_id: "t".to_string(),
            places: vec![Place::new("p1", "Harbor Bar", "")],
        })
        .await
        .unwrap();
        drop(tx);

        let resolver = listener.await.unwrap();
        assert!(!resolver.is_pending());
        assert_eq!(f.sink.resolved().len(), 1);
        assert_eq!(f.switcher.switched(), vec!["t"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_abandons_on_deadline() {
        let f = fixture();
        let resolver = f
            .resolver
            .with_timeout(chrono::Duration::milliseconds(200));
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let listener = tokio::spawn(resolver.run_listener(rx, cancel.clone()));

        tx.send(SelectionEvent::Select {
            hit: hit("t", "p1"),
            active_collection_id: Some("home".to_string()),
        })
        .await
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        cancel.cancel();

        let resolver = listener.await.unwrap();
        assert!(!resolver.is_pending());
        assert!(f.sink.resolved().is_empty());
        drop(tx);
    }
}
