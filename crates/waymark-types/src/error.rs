//! Error types for the waymark domain crate.

use thiserror::Error;

/// Unified error type for domain and settings operations.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypesError::Config("missing file".to_string());
        assert!(err.to_string().contains("Configuration error"));

        let err = TypesError::InvalidInput("rating 9".to_string());
        assert_eq!(err.to_string(), "Invalid input: rating 9");
    }
}
