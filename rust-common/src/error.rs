//! Centralized transport error types.
//!
//! This module provides the error type shared by every component that talks
//! HTTP, with built-in classification of transport failures.

use thiserror::Error;

/// Common error type for transport operations.
///
/// Errors are classified so callers can tell a slow peer from an absent one.
#[derive(Error, Debug)]
pub enum CommonError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Peer is unreachable or refused the connection
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CommonError {
    /// Classify a `reqwest` failure.
    ///
    /// Timeouts and connection failures get their own variants; everything
    /// else is kept as the raw [`CommonError::Http`] error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pact_common::CommonError;
    ///
    /// let err = reqwest::Client::new().get("not a url").build().unwrap_err();
    /// assert!(matches!(CommonError::from_reqwest(err), CommonError::InvalidInput(_)));
    /// ```
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else if err.is_builder() {
            Self::InvalidInput(err.to_string())
        } else {
            Self::Http(err)
        }
    }

    /// Check if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Create a timeout error with the given message.
    #[must_use]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
