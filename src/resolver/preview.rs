//! Resolution of component lists that are not saved yet.
//!
//! An editor previewing a compound prompt has a candidate component list but
//! no stored row for it. Each referenced prompt goes through the same
//! recursion as [`PromptResolver::resolve`], starting at depth 0, so anything
//! that resolves on its own also previews.

use std::collections::BTreeSet;

use super::{PromptResolver, join_parts};
use crate::core::{Component, Result};
use crate::source::PromptSource;

impl<S: PromptSource + ?Sized> PromptResolver<'_, S> {
    /// Resolve an unsaved component list into text.
    ///
    /// Components are taken in ascending position order and joined exactly as
    /// a stored compound prompt would be. Components without a reference never
    /// touch the source.
    ///
    /// # Errors
    ///
    /// Any error [`resolve`](Self::resolve) raises for a referenced prompt.
    pub fn preview_components(&self, components: &[Component]) -> Result<String> {
        let mut ordered: Vec<&Component> = components.iter().collect();
        ordered.sort_by_key(|c| c.position);

        let mut visited = BTreeSet::new();
        let mut parts = Vec::with_capacity(ordered.len() * 3);

        for component in ordered {
            if let Some(before) = &component.text_before {
                parts.push(before.clone());
            }
            if let Some(child) = component.component_prompt_id {
                parts.push(self.resolve_at(child, 0, &mut visited)?.text);
            }
            if let Some(after) = &component.text_after {
                parts.push(after.clone());
            }
        }

        tracing::debug!(
            "Previewed {} components through {} stored prompts",
            components.len(),
            visited.len()
        );
        Ok(join_parts(parts))
    }
}
