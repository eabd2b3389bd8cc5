//! Store-wide consistency check.
//!
//! Writes through `attach` and `import` keep the graph valid, but a database
//! edited by other tools may not be. This command looks for:
//!
//! - reference cycles
//! - malformed component lists (gaps, duplicates, empty components)
//! - components referencing prompts that no longer exist
//! - prompts nesting deeper than the ceiling
//! - cached `max_depth` values that disagree with the graph (`--fix` rewrites them)

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::collections::HashMap;

use super::CliConfig;
use super::common::CommandContext;
use crate::core::{PromptError, PromptId};
use crate::graph::{GraphValidator, ReferenceGraph, validate_prompt_components};
use crate::source::PromptSource;

/// Command to check the store.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Rewrite stale cached depths instead of reporting them as problems.
    #[arg(long)]
    fix: bool,
}

impl CheckCommand {
    /// Execute the check command.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let ctx = CommandContext::open(config).await?;
        let prompts = ctx.store.list_prompts()?;
        let known: HashMap<PromptId, &str> = prompts.iter().map(|p| (p.id, p.slug.as_str())).collect();

        let mut problems = Vec::new();
        let mut graph = ReferenceGraph::new();
        for prompt in &prompts {
            graph.add_prompt(prompt.id);
            if let Some(record) = ctx.store.fetch(prompt.id)? {
                let components: Vec<_> = record.components.into_iter().map(|c| c.component).collect();
                if let Err(error) = validate_prompt_components(prompt.is_compound, &components) {
                    problems.push(format!("'{}': {error}", prompt.slug));
                }
            }
        }
        for (from, to) in ctx.store.all_references()? {
            if !known.contains_key(&to) {
                problems.push(format!("'{}' references missing prompt {to}", known.get(&from).unwrap_or(&"?")));
                continue;
            }
            graph.add_reference(from, to);
        }

        if let Some(cycle) = graph.find_cycle() {
            // Depths are meaningless on a cyclic graph.
            return Err(PromptError::CircularReference {
                path: cycle.0,
            }
            .into());
        }

        let validator = GraphValidator::new(ctx.store.as_ref(), ctx.engine.max_depth);
        let mut memo = HashMap::new();
        let mut fixed = 0;
        for prompt in prompts.iter().filter(|p| p.is_compound) {
            match validator.compute_depth(prompt.id, &mut memo) {
                Ok(depth) => {
                    let actual = u32::try_from(depth).unwrap_or(u32::MAX);
                    if prompt.max_depth == Some(actual) {
                        continue;
                    }
                    if self.fix {
                        ctx.store.set_max_depth(prompt.id, Some(actual))?;
                        fixed += 1;
                    } else {
                        problems.push(format!(
                            "'{}' caches max_depth {:?} but nests {} levels",
                            prompt.slug, prompt.max_depth, actual
                        ));
                    }
                }
                Err(error) => problems.push(format!("'{}': {error}", prompt.slug)),
            }
        }

        if fixed > 0 {
            println!("{} {} cached depths", "Fixed".green().bold(), fixed);
        }
        if problems.is_empty() {
            println!(
                "{} {} prompts, {} references, no problems",
                "Checked".green().bold(),
                graph.node_count(),
                graph.edge_count()
            );
            return Ok(());
        }

        for problem in &problems {
            eprintln!("{} {problem}", "problem:".yellow());
        }
        bail!("{} problems found in {}", problems.len(), ctx.database_path.display())
    }
}
