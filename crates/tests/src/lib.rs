//! Integration tests for the admission gateway.
//!
//! This crate contains the following test modules:
//!
//! - `pipeline_tests`: end-to-end admission scenarios against an in-memory store
//! - `quota_concurrency_tests`: fixed-window behavior under concurrent load and plan changes
//! - `failure_mode_tests`: store outages, slow backends and swallowed expiry failures
//! - `http_tests`: the full router, including cookies, status mapping and health
//! - `mock_infrastructure`: a fault-injecting store and fixture helpers
//!
//! ## Running Tests
//!
//! No external services are needed; every test runs against [`admit_core::store::MemoryStore`]
//! or a [`mock_infrastructure::FaultyStore`] wrapped around it.
//!
//! ```bash
//! cargo test --package tests
//! ```



#[cfg(test)]
mod failure_mode_tests;

#[cfg(test)]
mod http_tests;

/// Mock infrastructure for testing
pub mod mock_infrastructure;
