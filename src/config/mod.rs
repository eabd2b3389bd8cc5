//! Configuration management for promptweave
//!
//! Two layers:
//!
//! 1. **Global Configuration** (`~/.promptweave/config.toml`) - database location and
//!    engine limits, read by the CLI ([`GlobalConfig`])
//! 2. **Engine Configuration** ([`EngineConfig`]) - the validated limits handed to
//!    the validator and resolvers
//!
//! Library callers that never touch the filesystem build an [`EngineConfig`]
//! directly; its [`Default`] matches a missing config file.

pub mod global;

pub use global::{BulkConfig, GlobalConfig, ResolutionConfig};

use crate::constants::{MAX_NESTING_DEPTH, default_max_parallel};

/// Limits applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Ceiling on compound nesting depth.
    pub max_depth: usize,
    /// Concurrent per-prompt resolutions during bulk resolve.
    pub max_parallel: usize,
}

impl EngineConfig {
    /// Default limits with a different nesting ceiling.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
            max_parallel: default_max_parallel(),
        }
    }
}
