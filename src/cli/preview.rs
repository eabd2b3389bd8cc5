//! Preview an unsaved component list.
//!
//! The file holds the component list a compound prompt would have, in library
//! syntax:
//!
//! ```toml
//! [[components]]
//! before = "Draft intro"
//!
//! [[components]]
//! prompt = "persona"
//! ```

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::CliConfig;
use super::common::CommandContext;
use crate::graph::validate_component_list;
use crate::library::{ComponentList, LibraryFormat, components_from_slugs};
use crate::resolver::PromptResolver;

/// Command to resolve a component list that is not stored.
#[derive(Args, Debug)]
pub struct PreviewCommand {
    /// File with a `components` list.
    file: PathBuf,

    /// File format; guessed from the extension when omitted.
    #[arg(short, long, value_enum)]
    format: Option<LibraryFormat>,
}

impl PreviewCommand {
    /// Execute the preview command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let content = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Failed to read components from {}", self.file.display()))?;
        let format = self.format.unwrap_or_else(|| LibraryFormat::from_path(&self.file));
        let list = ComponentList::parse(&content, format)?;

        let ctx = CommandContext::open(config).await?;
        let components = components_from_slugs(&ctx.store, &list.components)?;
        validate_component_list(&components)?;

        let resolver = PromptResolver::new(ctx.store.as_ref(), ctx.engine.max_depth);
        println!("{}", resolver.preview_components(&components)?);
        Ok(())
    }
}
