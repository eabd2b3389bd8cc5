//! Show a prompt's dependencies and dependents.
//!
//! Dependencies are every prompt the resolution passes through. Dependents are
//! the compound prompts that reference this one directly; a prompt with
//! dependents cannot be deleted.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::HashMap;

use super::CliConfig;
use super::common::CommandContext;
use crate::core::PromptId;
use crate::graph::ReferenceGraph;
use crate::resolver::PromptResolver;

/// Command to inspect the references around one prompt.
#[derive(Args, Debug)]
pub struct DepsCommand {
    /// Slug or id of the prompt.
    prompt: String,

    /// Print as JSON.
    #[arg(long)]
    json: bool,
}

impl DepsCommand {
    /// Execute the deps command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let ctx = CommandContext::open(config).await?;
        let prompt = ctx.find_prompt(&self.prompt)?;

        let resolver = PromptResolver::new(ctx.store.as_ref(), ctx.engine.max_depth);
        let mut used = resolver.dependencies(prompt.id)?;
        used.remove(&prompt.id);

        let slugs: HashMap<PromptId, String> =
            ctx.store.list_prompts()?.into_iter().map(|p| (p.id, p.slug)).collect();
        let slug_of = |id: &PromptId| slugs.get(id).cloned().unwrap_or_else(|| id.to_string());

        let mut graph = ReferenceGraph::new();
        graph.add_prompt(prompt.slug.clone());
        for (from, to) in ctx.store.all_references()? {
            graph.add_reference(slug_of(&from), slug_of(&to));
        }
        let dependents = graph.dependents_of(&prompt.slug);

        if self.json {
            let output = serde_json::json!({
                "slug": prompt.slug,
                "used": used.iter().map(slug_of).collect::<Vec<_>>(),
                "dependents": dependents,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        print!("{}", graph.to_tree_string(&prompt.slug));
        println!();
        println!("{} {}", "Uses:".bold(), used.len());
        if dependents.is_empty() {
            println!("{} none", "Used by:".bold());
        } else {
            println!("{} {}", "Used by:".bold(), dependents.join(", "));
        }
        Ok(())
    }
}
