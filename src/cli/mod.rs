//! Command-line interface for promptweave.
//!
//! Each command lives in its own module with its own argument structure and
//! `execute` method. Commands share a [`common::CommandContext`] that opens the
//! prompt database and carries the engine limits from the global configuration.
//!
//! # Available Commands
//!
//! ## Library Management
//! - `import` - Two-pass import of a TOML or JSON prompt library
//! - `export` - Write every stored prompt as a library file
//! - `attach` - Append a validated component to a compound prompt
//!
//! ## Resolution
//! - `resolve` - Resolve one prompt into its final text
//! - `preview` - Resolve an unsaved component list against the store
//! - `bulk` - Resolve many prompts with a bounded number of batch fetches
//!
//! ## Inspection
//! - `deps` - Prompts a prompt resolves through, and prompts referencing it
//! - `check` - Store-wide cycle check and cached depth drift report
//!
//! # Global Options
//!
//! - `--db` - Path of the SQLite database (overrides the config file)
//! - `--config` - Path to a custom config file (also `PROMPTWEAVE_CONFIG`)
//! - `--verbose` / `--quiet` - Log level
//!
//! # Example
//!
//! ```bash
//! pweave import prompts.toml
//! pweave resolve code-review
//! pweave bulk --all --json
//! ```

mod attach;
mod bulk;
mod check;
pub mod common;
mod deps;
mod export;
mod import;
mod preview;
mod resolve;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runtime configuration for CLI execution.
///
/// Holds what the global flags decide, so tests and programmatic callers can
/// run a command without going through argument parsing.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter level: `"debug"`, `"info"` or `"error"`.
    ///
    /// When `None`, `RUST_LOG` decides.
    pub log_level: Option<String>,

    /// Custom path to the global configuration file.
    pub config_path: Option<PathBuf>,

    /// Database path overriding the configured one.
    pub database: Option<PathBuf>,
}

impl CliConfig {
    /// Create a new CLI configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the database at `path`.
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    /// Read the global configuration from `path`.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }
}

/// Compose, validate and resolve compound prompts.
#[derive(Parser)]
#[command(
    name = "pweave",
    about = "Compose prompts from other prompts and resolve them into text",
    version,
    author,
    long_about = "pweave manages a SQLite library of prompts. A prompt is either literal text \
                  or a compound prompt assembled from an ordered list of components that wrap \
                  other prompts. References are validated on write and resolved recursively."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    ///
    /// Shows each resolution step and batch fetch pass. Mutually exclusive
    /// with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom global configuration file.
    ///
    /// Defaults to `~/.promptweave/config.toml`.
    #[arg(short, long, global = true, env = "PROMPTWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Path of the SQLite prompt database.
    ///
    /// Overrides the `database` key of the config file.
    #[arg(long, global = true, env = "PROMPTWEAVE_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a prompt library (TOML or JSON).
    ///
    /// See [`import::ImportCommand`].
    Import(import::ImportCommand),

    /// Export every stored prompt as a library file.
    ///
    /// See [`export::ExportCommand`].
    Export(export::ExportCommand),

    /// Resolve a prompt into its final text.
    ///
    /// See [`resolve::ResolveCommand`].
    Resolve(resolve::ResolveCommand),

    /// Resolve an unsaved component list against the stored prompts.
    ///
    /// See [`preview::PreviewCommand`].
    Preview(preview::PreviewCommand),

    /// Resolve many prompts at once.
    ///
    /// See [`bulk::BulkCommand`].
    Bulk(bulk::BulkCommand),

    /// Append a component to a compound prompt.
    ///
    /// See [`attach::AttachCommand`].
    Attach(attach::AttachCommand),

    /// Show what a prompt depends on and what depends on it.
    ///
    /// See [`deps::DepsCommand`].
    Deps(deps::DepsCommand),

    /// Check the whole store for cycles and stale cached depths.
    ///
    /// See [`check::CheckCommand`].
    Check(check::CheckCommand),
}

impl Cli {
    /// Execute the CLI with the configuration its flags describe.
    ///
    /// # Errors
    ///
    /// Returns the failing command's error for [`crate::core::user_friendly_error`].
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Build a [`CliConfig`] from the parsed CLI arguments.
    ///
    /// `--verbose` selects `debug`, `--quiet` selects `error`, otherwise `info`.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
            database: self.db.clone(),
        }
    }

    /// Execute the CLI with a specific configuration.
    ///
    /// # Errors
    ///
    /// Returns the failing command's error.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Import(cmd) => cmd.execute(&config).await,
            Commands::Export(cmd) => cmd.execute(&config).await,
            Commands::Resolve(cmd) => cmd.execute(&config).await,
            Commands::Preview(cmd) => cmd.execute(&config).await,
            Commands::Bulk(cmd) => cmd.execute(&config).await,
            Commands::Attach(cmd) => cmd.execute(&config).await,
            Commands::Deps(cmd) => cmd.execute(&config).await,
            Commands::Check(cmd) => cmd.execute(&config).await,
        }
    }
}
