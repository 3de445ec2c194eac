//! Shared test utilities for the pact contract testing engine.
//!
//! This crate provides:
//! - Proptest generators for matcher trees, interactions and documents
//! - A recording provider state handler
//! - Test fixtures for the Todo consumer/provider pair

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
