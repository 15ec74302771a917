//! Error types for the index crate.
//!
//! None of these escape the search index itself: fetch failures are turned
//! into empty cache entries and catalog errors surface only to the binary
//! that loads a catalog file.

use thiserror::Error;

/// Failure reported by a place store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The caller may not read the collection
    #[error("Permission denied for collection {0}")]
    PermissionDenied(String),

    /// The collection does not exist
    #[error("Collection not found: {0}")]
    NotFound(String),
}

/// Errors raised while loading or validating index inputs.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Catalog file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file is not valid JSON for the expected shape
    #[error("Catalog parse error: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(#[from] waymark_types::TypesError),
}
