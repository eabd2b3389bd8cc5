//! Common test utilities for pweave integration tests
//!
//! [`TestProject`] owns a temporary directory holding the database, a config
//! file path and any library files a test writes. Commands run the real
//! binary with `--db` and `--config` pointing inside it.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use promptweave::core::PromptId;
use promptweave::store::SqliteStore;

/// Isolated database and config location for one test.
pub struct TestProject {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    root: PathBuf,
    db_path: PathBuf,
    config_path: PathBuf,
}

impl TestProject {
    /// Create an empty project. The config file is not written until asked.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        Ok(Self {
            db_path: root.join("prompts.db"),
            config_path: root.join("config.toml"),
            root,
            _temp_dir: temp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Open the project database directly.
    pub fn store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path).context("Failed to open test database")
    }

    /// Write the global config file.
    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(&self.config_path, content).context("Failed to write config")
    }

    /// Write a file under the project root and return its path.
    pub fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {name}"))?;
        Ok(path)
    }

    /// A `pweave` command bound to this project's database and config.
    pub fn pweave(&self) -> Command {
        let mut cmd = Command::cargo_bin("pweave").expect("pweave binary is built for tests");
        cmd.arg("--db")
            .arg(&self.db_path)
            .arg("--config")
            .arg(&self.config_path)
            .env("NO_COLOR", "1")
            .env_remove("PROMPTWEAVE_CONFIG")
            .env_remove("PROMPTWEAVE_DB")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Import `content` as a TOML library through the binary.
    pub fn import(&self, content: &str) -> Result<()> {
        let path = self.write_file("library.toml", content)?;
        self.pweave().arg("import").arg(&path).assert().success();
        Ok(())
    }

    /// Id of the prompt with `slug`.
    pub fn id_of(&self, slug: &str) -> Result<PromptId> {
        self.store()?
            .find_by_slug(slug)?
            .map(|p| p.id)
            .with_context(|| format!("no prompt '{slug}'"))
    }
}

/// Library with a three-level chain and a shared leaf.
///
/// `review` → `checklist` → `tone`, and `review` also uses `tone` directly.
pub const REVIEW_LIBRARY: &str = r#"
[[prompts]]
slug = "tone"
title = "Tone"
text = "Be concise and kind."

[[prompts]]
slug = "checklist"
components = [
    { before = "Check the following:" },
    { prompt = "tone", after = "Flag anything unclear." },
]

[[prompts]]
slug = "review"
title = "Code review"
components = [
    { prompt = "checklist", before = "You are reviewing a pull request." },
    { prompt = "tone" },
]
"#;

/// Expected text of `review` in [`REVIEW_LIBRARY`].
pub const REVIEW_TEXT: &str = "You are reviewing a pull request.\n\n\
Check the following:\n\nBe concise and kind.\n\nFlag anything unclear.\n\n\
Be concise and kind.";
