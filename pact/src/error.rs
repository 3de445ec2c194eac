//! Engine error types using thiserror 2.0.
//!
//! Only conditions that abort an operation live here. Per-interaction
//! failures (mismatches, unmatched requests, state setup and network
//! failures during verification) are recorded in outcomes and reports
//! instead of being returned as errors.

use crate::config::ConfigError;
use pact_common::CommonError;
use thiserror::Error;

/// Engine errors.
#[derive(Error, Debug)]
pub enum PactError {
    /// Ambiguous or conflicting interactions, invalid builder input or a
    /// contract written for another provider
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Contract document is unreadable, incomplete or has an unsupported version
    #[error("Malformed contract document: {0}")]
    MalformedDocument(String),

    /// The guest test callback reported a failure
    #[error("Consumer test failed: {0}")]
    TestFailed(String),

    /// Mock server could not be started or stopped cleanly
    #[error("Mock server error: {0}")]
    Server(String),

    /// Invalid engine configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport error (from pact-common)
    #[error(transparent)]
    Common(#[from] CommonError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PactError {
    /// Check if this error must stop the run before any network activity.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::MalformedDocument(_) | Self::Config(_)
        )
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a malformed document error.
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }

    /// Create a mock server error.
    #[must_use]
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }
}

/// Result type for engine operations.
pub type PactResult<T> = Result<T, PactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PactError::malformed("missing field `consumer`");
        assert_eq!(
            err.to_string(),
            "Malformed contract document: missing field `consumer`"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(PactError::configuration("overlap").is_fatal());
        assert!(PactError::malformed("version").is_fatal());
        assert!(PactError::Config(ConfigError::InvalidTimeout).is_fatal());
        assert!(!PactError::TestFailed("assertion".to_string()).is_fatal());
        assert!(!PactError::server("bind").is_fatal());
    }

    #[test]
    fn test_from_common_error() {
        let err: PactError = CommonError::timeout("slow provider").into();
        assert!(matches!(err, PactError::Common(_)));
        assert_eq!(err.to_string(), "Operation timed out: slow provider");
    }
}
