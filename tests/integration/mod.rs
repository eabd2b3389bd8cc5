//! Integration test suite for pweave
//!
//! End-to-end tests against a real SQLite database on disk and the `pweave`
//! binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **store**: Write-time validation and cached depths in the SQLite store
//! - **library**: Two-pass import and export round trips
//! - **bulk**: Batched fetching and bulk resolution over the store
//! - **commands**: The `pweave` binary, one subcommand at a time
//! - **config**: Global config file and environment overrides

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod bulk;
mod commands;
mod config;
mod library;
mod store;
