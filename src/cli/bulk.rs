//! Resolve many prompts at once.
//!
//! Data is fetched in one batch per nesting level, then every prompt resolves
//! from memory. A prompt that fails to resolve is reported without affecting
//! the others.
//!
//! # Examples
//!
//! ```bash
//! pweave bulk intro review summary
//! pweave bulk --all --json
//! ```

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::CliConfig;
use super::common::CommandContext;
use crate::core::PromptId;
use crate::resolver::bulk_resolve;

/// Command to bulk-resolve prompts.
#[derive(Args, Debug)]
pub struct BulkCommand {
    /// Slugs or ids of the prompts to resolve.
    prompts: Vec<String>,

    /// Resolve every stored prompt.
    #[arg(long, conflicts_with = "prompts")]
    all: bool,

    /// Print results and the summary as JSON.
    #[arg(long)]
    json: bool,
}

impl BulkCommand {
    /// Execute the bulk command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        if !self.all && self.prompts.is_empty() {
            bail!("Name at least one prompt, or pass --all");
        }

        let ctx = CommandContext::open(config).await?;
        let prompts = if self.all {
            ctx.store.list_prompts()?
        } else {
            self.prompts.iter().map(|key| ctx.find_prompt(key)).collect::<Result<Vec<_>>>()?
        };

        let ids: Vec<PromptId> = prompts.iter().map(|p| p.id).collect();
        let slugs: HashMap<PromptId, &str> = prompts.iter().map(|p| (p.id, p.slug.as_str())).collect();
        let slug_of = |id: &PromptId| slugs.get(id).map_or_else(|| id.to_string(), |s| (*s).to_string());

        let outcome = bulk_resolve(Arc::clone(&ctx.store), &ids, &ctx.engine).await?;

        if self.json {
            let resolved: BTreeMap<String, &String> =
                outcome.resolved_texts.iter().map(|(id, text)| (slug_of(id), text)).collect();
            let errors: BTreeMap<String, String> =
                outcome.errors.iter().map(|(id, error)| (slug_of(id), error.to_string())).collect();
            let output = serde_json::json!({
                "resolved": resolved,
                "errors": errors,
                "success_count": outcome.success_count,
                "error_count": outcome.error_count,
                "queries_executed": outcome.queries_executed,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let mut seen = HashSet::new();
        for id in ids.iter().filter(|id| seen.insert(**id)) {
            println!("{}", format!("── {} ({id})", slug_of(id)).bold());
            if let Some(text) = outcome.resolved_texts.get(id) {
                println!("{text}");
            } else if let Some(error) = outcome.errors.get(id) {
                println!("{} {error}", "error:".red());
            }
            println!();
        }

        println!(
            "{} resolved, {} failed, {} batch {}",
            outcome.success_count.to_string().green(),
            if outcome.error_count > 0 {
                outcome.error_count.to_string().red()
            } else {
                outcome.error_count.to_string().normal()
            },
            outcome.queries_executed,
            if outcome.queries_executed == 1 { "pass" } else { "passes" }
        );
        Ok(())
    }
}
