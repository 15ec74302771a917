//! UI-side collaborators called during cross-collection navigation.
//!
//! All three are fire-and-forget: the index never waits on them and ignores
//! whatever happens on their side.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use waymark_types::{Collection, Place, Visibility};

/// Notice shown when a selection moves the user to another collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationNotice {
    pub visibility: Visibility,
    pub name: String,
    pub owner: String,
}

impl NavigationNotice {
    /// Describe the destination collection.
    pub fn for_collection(collection: &Collection) -> Self {
        Self {
            visibility: collection.visibility,
            name: collection.name.clone(),
            owner: collection.owner_label().to_string(),
        }
    }
}

/// Switches the active collection.
///
/// The result is observed later as a live place update for the new
/// collection, not through this call.
pub trait CollectionSwitcher: Send + Sync {
    fn set_active_collection(&self, collection: &Collection);
}

/// Delivers transient notices to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: NavigationNotice);
}

/// Receives a resolved selection (typically pans the map and opens the place).
pub trait SelectionSink: Send + Sync {
    fn on_resolved(&self, place: &Place, collection: &Collection);
}

/// Switcher that records requested collection ids.
#[derive(Debug, Default)]
pub struct RecordingSwitcher {
    switched: Mutex<Vec<String>>,
}

impl RecordingSwitcher {
    /// Requested collection ids, oldest first.
    pub fn switched(&self) -> Vec<String> {
        self.switched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CollectionSwitcher for RecordingSwitcher {
    fn set_active_collection(&self, collection: &Collection) {
        self.switched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(collection.id.clone());
    }
}

/// Notifier that records notices.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<NavigationNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<NavigationNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: NavigationNotice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

/// Sink that records resolved (collection id, place) pairs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    resolved: Mutex<Vec<(String, Place)>>,
}

impl RecordingSink {
    pub fn resolved(&self) -> Vec<(String, Place)> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SelectionSink for RecordingSink {
    fn on_resolved(&self, place: &Place, collection: &Collection) {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((collection.id.clone(), place.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_uses_owner_name() {
        let collection = Collection::new("m1", "u7", "Road trip")
            .with_visibility(Visibility::Shared)
            .with_owner_name("Sam");
        let notice = NavigationNotice::for_collection(&collection);
        assert_eq!(notice.visibility, Visibility::Shared);
        assert_eq!(notice.name, "Road trip");
        assert_eq!(notice.owner, "Sam");
    }

    #[test]
    fn test_recorders() {
        let collection = Collection::new("m1", "u7", "Road trip");
        let switcher = RecordingSwitcher::default();
        switcher.set_active_collection(&collection);
        assert_eq!(switcher.switched(), vec!["m1"]);

        let sink = RecordingSink::default();
        sink.on_resolved(&Place::new("p1", "Diner", ""), &collection);
        assert_eq!(sink.resolved()[0].0, "m1");
    }
}
