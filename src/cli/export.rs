//! Export the store as a prompt library.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::CliConfig;
use super::common::CommandContext;
use crate::library::{LibraryFormat, export_library};

/// Command to export every stored prompt.
///
/// Writes to stdout unless `--output` is given. Component references are
/// written as slugs so the file imports into any store.
#[derive(Args, Debug)]
pub struct ExportCommand {
    /// File to write; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format; guessed from `--output` when omitted, TOML on stdout.
    #[arg(short, long, value_enum)]
    format: Option<LibraryFormat>,
}

impl ExportCommand {
    /// Execute the export command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let ctx = CommandContext::open(config).await?;
        let library = export_library(&ctx.store)?;

        match &self.output {
            Some(path) => {
                let format = self.format.unwrap_or_else(|| LibraryFormat::from_path(path));
                library.save(path, format).await?;
                tracing::info!("Exported {} prompts to {}", library.prompts.len(), path.display());
            }
            None => {
                let rendered = library.render(self.format.unwrap_or_default())?;
                println!("{}", rendered.trim_end());
            }
        }
        Ok(())
    }
}
