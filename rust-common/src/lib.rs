//! Shared library for cross-cutting concerns of the pact contract testing engine.
//!
//! This crate provides centralized implementations for:
//! - Transport error types with timeout and connection failure classification
//! - HTTP client configuration and building
//! - Tracing subscriber initialisation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::CommonError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
