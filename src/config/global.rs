//! Global configuration management for promptweave.
//!
//! This module handles the user configuration file (`~/.promptweave/config.toml`)
//! which stores the database location and the engine limits used by the CLI.
//!
//! # Configuration File Location
//!
//! - **Unix/macOS**: `~/.promptweave/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\promptweave\config.toml`
//!
//! The location can be overridden with `--config` or the `PROMPTWEAVE_CONFIG`
//! environment variable (both handled by the CLI parser).
//!
//! # File Format
//!
//! ```toml
//! # SQLite database holding the prompt tables
//! database = "/home/me/prompts.db"
//!
//! [resolution]
//! # Ceiling on compound nesting, enforced by validation and resolution
//! max_depth = 5
//!
//! [bulk]
//! # Concurrent per-prompt resolutions during bulk resolve
//! max_parallel = 16
//! ```
//!
//! A missing file yields the defaults; a present but invalid file is an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::EngineConfig;
use crate::constants::{MAX_NESTING_DEPTH, default_max_parallel};
use crate::core::PromptError;

const fn default_max_depth() -> usize {
    MAX_NESTING_DEPTH
}

fn is_default_max_depth(depth: &usize) -> bool {
    *depth == default_max_depth()
}

/// Resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Ceiling on compound nesting depth. Must be at least 1.
    #[serde(default = "default_max_depth", skip_serializing_if = "is_default_max_depth")]
    pub max_depth: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Bulk resolution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Concurrent per-prompt resolutions. Defaults to `max(10, 2 × cores)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

/// Global configuration structure for promptweave.
///
/// # Examples
///
/// ```rust,no_run
/// use promptweave::config::GlobalConfig;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = GlobalConfig::load_with_optional(None).await?;
/// let engine = config.engine_config()?;
/// println!("ceiling: {}", engine.max_depth);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Path of the SQLite database. Defaults to `prompts.db` next to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Resolution settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Bulk resolution settings.
    #[serde(default)]
    pub bulk: BulkConfig,
}

impl GlobalConfig {
    /// Load global configuration from an optional path.
    ///
    /// If a path is provided, loads from that path. Otherwise, loads from the
    /// default location. A file that doesn't exist yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The file contains invalid TOML syntax
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load global configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save global configuration to a specific file path.
    ///
    /// Creates parent directories as needed and writes pretty-formatted TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Directory holding the config file and the default database.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("promptweave")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".promptweave")
        };
        Ok(dir)
    }

    /// Default file path for the global configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Database path: the configured one, or `prompts.db` in the config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no database is configured and the config directory
    /// cannot be determined.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("prompts.db")),
        }
    }

    /// Validate the settings and build the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Config`] when `max_depth` or `max_parallel` is zero.
    pub fn engine_config(&self) -> Result<EngineConfig, PromptError> {
        if self.resolution.max_depth == 0 {
            return Err(PromptError::Config {
                message: "resolution.max_depth must be at least 1".to_string(),
            });
        }

        let max_parallel = match self.bulk.max_parallel {
            Some(0) => {
                return Err(PromptError::Config {
                    message: "bulk.max_parallel must be at least 1".to_string(),
                });
            }
            Some(n) => n,
            None => default_max_parallel(),
        };

        Ok(EngineConfig {
            max_depth: self.resolution.max_depth,
            max_parallel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_global_config_default() {
        let config = GlobalConfig::default();
        assert!(config.database.is_none());
        assert_eq!(config.resolution.max_depth, 5);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.max_depth, 5);
        assert!(engine.max_parallel >= 1);
    }

    #[tokio::test]
    async fn test_global_config_save_load() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("nested").join("config.toml");

        let config = GlobalConfig {
            database: Some(temp.path().join("prompts.db")),
            resolution: ResolutionConfig {
                max_depth: 3,
            },
            bulk: BulkConfig {
                max_parallel: Some(4),
            },
        };
        config.save_to(&config_path).await.unwrap();

        let loaded = GlobalConfig::load_from(&config_path).await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.engine_config().unwrap().max_parallel, 4);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config =
            GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(&config_path, "[resolution\nmax_depth = ").unwrap();

        assert!(GlobalConfig::load_from(&config_path).await.is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = GlobalConfig::default();
        config.resolution.max_depth = 0;
        assert!(matches!(config.engine_config(), Err(PromptError::Config { .. })));

        let mut config = GlobalConfig::default();
        config.bulk.max_parallel = Some(0);
        assert!(matches!(config.engine_config(), Err(PromptError::Config { .. })));
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let config: GlobalConfig = toml::from_str("[bulk]\nmax_parallel = 2\n").unwrap();
        assert_eq!(config.resolution.max_depth, 5);
        assert_eq!(config.bulk.max_parallel, Some(2));
    }
}
