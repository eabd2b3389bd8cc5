//! Resolve one prompt into its final text.
//!
//! # Examples
//!
//! ```bash
//! pweave resolve code-review        # by slug
//! pweave resolve 12                 # by id
//! pweave resolve code-review --json # text, depth and used prompt ids
//! ```

use anyhow::Result;
use clap::Args;

use super::CliConfig;
use super::common::CommandContext;
use crate::resolver::PromptResolver;

/// Command to resolve a single prompt.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Slug or id of the prompt.
    prompt: String,

    /// Print the full resolution result as JSON.
    #[arg(long)]
    json: bool,
}

impl ResolveCommand {
    /// Execute the resolve command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let ctx = CommandContext::open(config).await?;
        let prompt = ctx.find_prompt(&self.prompt)?;

        let resolver = PromptResolver::new(ctx.store.as_ref(), ctx.engine.max_depth);
        let result = resolver.resolve(prompt.id)?;

        if self.json {
            let output = serde_json::json!({
                "id": prompt.id,
                "slug": prompt.slug,
                "resolved_text": result.resolved_text,
                "depth_reached": result.depth_reached,
                "used_prompt_ids": result.used_prompt_ids,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", result.resolved_text);
        }
        Ok(())
    }
}
