//! JSON catalog file used as a place store.
//!
//! ```json
//! {
//!   "collections": [{ "id": "home", "owner_id": "u1", "name": "Home" }],
//!   "places": { "home": [{ "id": "p1", "name": "Bakery", "visits": [] }] },
//!   "memberships": { "u2": ["home"] }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waymark_types::{Collection, Place, Visibility};

use crate::error::{IndexError, StoreError};
use crate::store::PlaceStore;

/// Parsed catalog file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub collections: Vec<Collection>,

    /// Places keyed by collection id
    #[serde(default)]
    pub places: HashMap<String, Vec<Place>>,

    /// Joined collection ids keyed by user id
    #[serde(default)]
    pub memberships: HashMap<String, Vec<String>>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a catalog file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&raw)?;
        debug!(
            path = %path.display(),
            collections = catalog.collections.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    pub fn collection(&self, collection_id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == collection_id)
    }

    /// Collections owned by the user.
    pub fn own_collections(&self, user_id: &str) -> Vec<Collection> {
        self.collections
            .iter()
            .filter(|c| c.owner_id == user_id)
            .cloned()
            .collect()
    }

    /// Collections the user joined, through the membership table or the
    /// collection's own member list. Owned collections are excluded.
    pub fn joined_collections(&self, user_id: &str) -> Vec<Collection> {
        let listed = self.memberships.get(user_id);
        self.collections
            .iter()
            .filter(|c| c.owner_id != user_id)
            .filter(|c| {
                c.members.iter().any(|m| m == user_id)
                    || listed.is_some_and(|ids| ids.iter().any(|id| *id == c.id))
            })
            .cloned()
            .collect()
    }
}

/// Place store answering from a loaded [`Catalog`].
///
/// With a viewer set, private collections the viewer cannot access are
/// refused the way a remote store would refuse them.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    catalog: Catalog,
    viewer: Option<String>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            viewer: None,
        }
    }

    pub fn with_viewer(mut self, user_id: impl Into<String>) -> Self {
        self.viewer = Some(user_id.into());
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[async_trait]
impl PlaceStore for CatalogStore {
    async fn list_places(&self, collection_id: &str) -> Result<Vec<Place>, StoreError> {
        let places = self.catalog.places.get(collection_id);

        match self.catalog.collection(collection_id) {
            Some(collection) => {
                if let Some(viewer) = &self.viewer {
                    if collection.visibility == Visibility::Private
                        && !collection.is_accessible_by(viewer)
                    {
                        return Err(StoreError::PermissionDenied(collection_id.to_string()));
                    }
                }
            }
            // Synthesized collections (the demo) may only exist as place lists.
            None if places.is_none() => {
                return Err(StoreError::NotFound(collection_id.to_string()));
            }
            None => {}
        }

        Ok(places.cloned().unwrap_or_default())
    }
}
