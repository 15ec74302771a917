//! Candidate resolution: which collections a viewer's search may cover.
//!
//! The result depends on the viewer's role:
//! - Guest: the active collection only (normally the public demo map)
//! - Admin: the full system catalog, plus the demo map if missing
//! - Ordinary: own and joined collections, minus the demo map
//!
//! Output is deduplicated by id (first occurrence wins) and stably sorted
//! by [`Collection::weight`].

use std::collections::HashSet;

use tracing::debug;
use waymark_types::{Collection, Role, User};

/// Inputs for one candidate computation.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityInput<'a> {
    /// Signed-in user, `None` when nobody is authenticated
    pub user: Option<&'a User>,
    pub role: Role,
    /// Id of the collection currently on screen
    pub active_collection_id: Option<&'a str>,
    /// Every collection in the system (only meaningful for admins)
    pub all_collections: &'a [Collection],
    /// Collections owned by the user
    pub own_collections: &'a [Collection],
    /// Collections the user joined
    pub joined_collections: &'a [Collection],
}

/// Computes ordered candidate lists.
#[derive(Debug, Clone)]
pub struct VisibilityResolver {
    demo_collection_id: String,
}

impl VisibilityResolver {
    /// Create a resolver that treats `demo_collection_id` as the public demo map.
    pub fn new(demo_collection_id: impl Into<String>) -> Self {
        Self {
            demo_collection_id: demo_collection_id.into(),
        }
    }

    /// Id of the well-known demo collection.
    pub fn demo_collection_id(&self) -> &str {
        &self.demo_collection_id
    }

    /// Compute the ordered candidate set. Pure; absent inputs give an empty list.
    pub fn compute_candidates(&self, input: &VisibilityInput<'_>) -> Vec<Collection> {
        if input.user.is_none() {
            return Vec::new();
        }

        let raw: Vec<Collection> = match input.role {
            Role::Guest => match input.active_collection_id {
                Some(active_id) => vec![self.find_or_placeholder(active_id, input)],
                None => Vec::new(),
            },
            Role::Admin => {
                let mut all = input.all_collections.to_vec();
                if !all.iter().any(|c| c.id == self.demo_collection_id) {
                    all.push(Collection::placeholder(self.demo_collection_id.as_str()));
                }
                all
            }
            Role::Ordinary => input
                .own_collections
                .iter()
                .chain(input.joined_collections.iter())
                .filter(|c| c.id != self.demo_collection_id)
                .cloned()
                .collect(),
        };

        let candidates = sort_by_weight(dedup_by_id(raw));
        debug!(
            role = %input.role,
            count = candidates.len(),
            "Computed search candidates"
        );
        candidates
    }

    fn find_or_placeholder(&self, id: &str, input: &VisibilityInput<'_>) -> Collection {
        input
            .all_collections
            .iter()
            .chain(input.own_collections.iter())
            .chain(input.joined_collections.iter())
            .find(|c| c.id == id)
            .cloned()
            .unwrap_or_else(|| Collection::placeholder(id))
    }
}

/// Drop repeated ids, keeping the first occurrence in place.
pub fn dedup_by_id(collections: Vec<Collection>) -> Vec<Collection> {
    let mut seen = HashSet::new();
    collections
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// Stable sort by weight: default, then shared, then the rest.
pub fn sort_by_weight(mut collections: Vec<Collection>) -> Vec<Collection> {
    collections.sort_by_key(Collection::weight);
    collections
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_types::Visibility;

    fn ids(collections: &[Collection]) -> Vec<&str> {
        collections.iter().map(|c| c.id.as_str()).collect()
    }

    fn input<'a>(
        user: Option<&'a User>,
        role: Role,
        active: Option<&'a str>,
        all: &'a [Collection],
        own: &'a [Collection],
        joined: &'a [Collection],
    ) -> VisibilityInput<'a> {
        VisibilityInput {
            user,
            role,
            active_collection_id: active,
            all_collections: all,
            own_collections: own,
            joined_collections: joined,
        }
    }

    #[test]
    fn test_no_user_is_empty() {
        let all = vec![Collection::new("a", "u1", "A")];
        let resolver = VisibilityResolver::new("demo");
        let result = resolver.compute_candidates(&input(None, Role::Admin, None, &all, &all, &[]));
        assert!(result.is_empty());
    }

    #[test]
    fn test_guest_sees_only_active() {
        let user = User::new("guest");
        let all = vec![
            Collection::new("a", "u1", "A"),
            Collection::new("demo", "staff", "Demo").with_visibility(Visibility::Public),
            Collection::new("b", "u2", "B").as_default(),
        ];
        let resolver = VisibilityResolver::new("demo");
        let result =
            resolver.compute_candidates(&input(Some(&user), Role::Guest, Some("demo"), &all, &[], &[]));
        assert_eq!(ids(&result), vec!["demo"]);
        assert_eq!(result[0].name, "Demo");
    }

    #[test]
    fn test_guest_synthesizes_missing_active() {
        let user = User::new("guest");
        let resolver = VisibilityResolver::new("demo");
        let result =
            resolver.compute_candidates(&input(Some(&user), Role::Guest, Some("demo"), &[], &[], &[]));
        assert_eq!(result, vec![Collection::placeholder("demo")]);
    }

    #[test]
    fn test_guest_without_active_is_empty() {
        let user = User::new("guest");
        let resolver = VisibilityResolver::new("demo");
        let result = resolver.compute_candidates(&input(Some(&user), Role::Guest, None, &[], &[], &[]));
        assert!(result.is_empty());
    }

    #[test]
    fn test_admin_appends_demo() {
        let user = User::new("mod");
        let all = vec![
            Collection::new("a", "u1", "A"),
            Collection::new("b", "u2", "B"),
        ];
        let resolver = VisibilityResolver::new("demo");
        let result = resolver.compute_candidates(&input(Some(&user), Role::Admin, None, &all, &[], &[]));
        assert_eq!(ids(&result), vec!["a", "b", "demo"]);
    }

    #[test]
    fn test_admin_keeps_catalog_demo() {
        let user = User::new("mod");
        let all = vec![
            Collection::new("demo", "staff", "Demo tour").with_visibility(Visibility::Public),
            Collection::new("a", "u1", "A"),
        ];
        let resolver = VisibilityResolver::new("demo");
        let result = resolver.compute_candidates(&input(Some(&user), Role::Admin, None, &all, &[], &[]));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Demo tour");
    }

    #[test]
    fn test_ordinary_excludes_demo_and_dedups() {
        let user = User::new("u1");
        let own = vec![
            Collection::new("home", "u1", "Home").as_default(),
            Collection::new("demo", "staff", "Demo"),
        ];
        let joined = vec![
            Collection::new("trip", "u2", "Trip").with_visibility(Visibility::Shared),
            Collection::new("home", "u1", "Home again"),
        ];
        let resolver = VisibilityResolver::new("demo");
        let result =
            resolver.compute_candidates(&input(Some(&user), Role::Ordinary, None, &[], &own, &joined));
        assert_eq!(ids(&result), vec!["home", "trip"]);
        assert_eq!(result[0].name, "Home");
    }

    #[test]
    fn test_dedup_keeps_first_position() {
        let list = vec![
            Collection::new("x", "u", "first"),
            Collection::new("y", "u", "y"),
            Collection::new("x", "u", "second"),
        ];
        let result = dedup_by_id(list);
        assert_eq!(ids(&result), vec!["x", "y"]);
        assert_eq!(result[0].name, "first");
    }

    #[test]
    fn test_weight_ordering_is_stable() {
        // Weights [2, 0, 1, 0]
        let list = vec![
            Collection::new("private", "u", "P"),
            Collection::new("default-1", "u", "D1").as_default(),
            Collection::new("shared", "u", "S").with_visibility(Visibility::Shared),
            Collection::new("default-2", "u", "D2").as_default(),
        ];
        let result = sort_by_weight(list);
        assert_eq!(ids(&result), vec!["default-1", "default-2", "shared", "private"]);
    }
}
