//! Collection ("map") descriptors.
//!
//! A collection is an independently-permissioned namespace of places with an
//! owner and a visibility level. Descriptors are read-only snapshots; the
//! collection-management service owns the real records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who may see a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Anyone, including guests
    Public,
    /// Owner plus members who joined through a share code
    Shared,
    /// Owner only
    #[default]
    Private,
}

impl Visibility {
    /// Lowercase label used in notices and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Shared => "shared",
            Visibility::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collection of places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Globally unique identifier
    pub id: String,

    /// User id of the owner
    pub owner_id: String,

    /// Display name of the owner, when the catalog carries it
    #[serde(default)]
    pub owner_name: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Visibility level
    #[serde(default)]
    pub visibility: Visibility,

    /// Whether this is the owner's default collection
    #[serde(default)]
    pub is_default: bool,

    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds", default = "epoch")]
    pub created_at: DateTime<Utc>,

    /// Code other users can join with (shared collections only)
    #[serde(default)]
    pub share_code: Option<String>,

    /// User ids of members besides the owner
    #[serde(default)]
    pub members: Vec<String>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Collection {
    /// Create a private, non-default collection.
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            owner_name: None,
            name: name.into(),
            visibility: Visibility::Private,
            is_default: false,
            created_at: epoch(),
            share_code: None,
            members: Vec::new(),
        }
    }

    /// Minimal descriptor for a collection known only by id.
    ///
    /// Used when visibility resolution needs a collection that none of the
    /// provided catalogs contain (the demo map for guests and admins).
    pub fn placeholder(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            visibility: Visibility::Public,
            ..Self::new(id, "", "")
        }
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as the owner's default collection.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Set the owner's display name.
    pub fn with_owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = Some(owner_name.into());
        self
    }

    /// Set the member list.
    pub fn with_members(mut self, members: Vec<String>) -> Self {
        self.members = members;
        self
    }

    /// Ordering weight for candidate lists.
    ///
    /// Default collection = 0, shared non-default = 1, everything else = 2.
    pub fn weight(&self) -> u8 {
        if self.is_default {
            0
        } else if self.visibility == Visibility::Shared {
            1
        } else {
            2
        }
    }

    /// Owner label for notices: display name, else owner id.
    pub fn owner_label(&self) -> &str {
        self.owner_name.as_deref().unwrap_or(&self.owner_id)
    }

    /// Whether the given user owns or is a member of this collection.
    pub fn is_accessible_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.members.iter().any(|m| m == user_id)
    }
}
