//! Append a component to a compound prompt.
//!
//! # Examples
//!
//! ```bash
//! pweave attach review --prompt persona
//! pweave attach review --before "Summary:" --prompt summary
//! pweave attach review --after "Thanks."
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::CommandContext;
use crate::store::NewComponent;

/// Command to attach a component.
///
/// A referenced prompt is validated before anything is written: it must
/// exist, must not lead back to the compound prompt, and must keep nesting
/// within the configured ceiling.
#[derive(Args, Debug)]
pub struct AttachCommand {
    /// Slug or id of the compound prompt.
    compound: String,

    /// Slug or id of the prompt the component references.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Text placed before the referenced content.
    #[arg(long)]
    before: Option<String>,

    /// Text placed after the referenced content.
    #[arg(long)]
    after: Option<String>,
}

impl AttachCommand {
    /// Execute the attach command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let ctx = CommandContext::open(config).await?;
        let compound = ctx.find_prompt(&self.compound)?;
        let referenced = self.prompt.as_deref().map(|key| ctx.find_prompt(key)).transpose()?;

        let component = ctx.store.attach_component(
            compound.id,
            NewComponent {
                prompt: referenced.as_ref().map(|p| p.id),
                text_before: self.before,
                text_after: self.after,
            },
            ctx.engine.max_depth,
        )?;

        let target = referenced.map_or_else(|| "text".to_string(), |p| format!("'{}'", p.slug));
        println!(
            "{} {} at position {} of '{}'",
            "Attached".green().bold(),
            target,
            component.position,
            compound.slug
        );
        Ok(())
    }
}
