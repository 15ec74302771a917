//! # waymark-types
//!
//! Shared domain types for the waymark place index.
//!
//! This crate defines the data structures used throughout the system:
//! - Collections: independently-permissioned maps with an owner and visibility
//! - Places: locations inside a collection, each with logged visits
//! - Viewer: the signed-in user and their role
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use waymark_types::{Collection, Visibility};
//!
//! let trip = Collection::new("m-1", "u-1", "Lisbon trip").with_visibility(Visibility::Shared);
//! assert_eq!(trip.weight(), 1);
//! ```

pub mod collection;
pub mod config;
pub mod error;
pub mod place;
pub mod viewer;

pub use collection::{Collection, Visibility};
pub use config::{IndexSettings, Settings, MAX_INTERVAL_MS};
pub use error::TypesError;
pub use place::{Coordinates, Place, Visit};
pub use viewer::{Role, User};
