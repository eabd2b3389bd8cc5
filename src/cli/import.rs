//! Import a prompt library into the store.
//!
//! # Examples
//!
//! ```bash
//! pweave import prompts.toml
//! pweave import shared.json --format json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use super::common::CommandContext;
use crate::library::{LibraryFile, LibraryFormat, import_library};

/// Command to import a library file.
///
/// The library is validated as a whole before anything is written: slugs must
/// be new, references must name prompts of the library or the store, and the
/// resulting graph must be acyclic and within the nesting ceiling.
#[derive(Args, Debug)]
pub struct ImportCommand {
    /// Library file to import.
    file: PathBuf,

    /// File format; guessed from the extension when omitted.
    #[arg(short, long, value_enum)]
    format: Option<LibraryFormat>,
}

impl ImportCommand {
    /// Execute the import command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let library = LibraryFile::load(&self.file, self.format).await?;
        let ctx = CommandContext::open(config).await?;

        let report = import_library(&ctx.store, &library, ctx.engine.max_depth)?;

        println!(
            "{} {} prompts ({} compound, {} components) from {}",
            "Imported".green().bold(),
            report.prompts,
            report.compound,
            report.components,
            self.file.display()
        );
        Ok(())
    }
}
