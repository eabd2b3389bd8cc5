//! Compound prompt resolution.
//!
//! Resolution expands a prompt into its final text. A non-compound prompt
//! resolves to its literal text. A compound prompt resolves by walking its
//! components in ascending position order and collecting *parts*:
//!
//! 1. the component's `text_before`, when set
//! 2. the resolved text of the referenced prompt, when the component has one
//! 3. the component's `text_after`, when set
//!
//! Parts whose trimmed content is empty are dropped, and the rest are joined
//! with [`PART_SEPARATOR`]. Dropping happens before joining, so whitespace-only
//! text never leaves a stray separator behind.
//!
//! # Entry Points
//!
//! Every entry point reduces to the same recursion in [`PromptResolver`]; they
//! differ only in the [`PromptSource`] they hand it:
//!
//! - [`PromptResolver::resolve`] reads through any source (a store, a closure)
//! - [`preview`] resolves a component list that has not been saved yet
//! - [`bulk`] batch-fetches many prompts into a [`PromptMap`](crate::source::PromptMap)
//!   and resolves each one from memory
//!
//! # Depth
//!
//! The root prompt sits at depth 0 and every referenced prompt one level below
//! its parent. Resolving past the ceiling fails with
//! [`PromptError::MaxDepthExceeded`]; resolution performs no cycle check of its
//! own, so the ceiling is also what terminates a walk over cyclic data.
//!
//! # Example
//!
//! ```rust,no_run
//! use promptweave::core::{Component, Prompt, PromptId, PromptRecord};
//! use promptweave::resolver::PromptResolver;
//! use promptweave::source::PromptMap;
//!
//! let mut greeting = PromptRecord::bare(Prompt::compound(1, "greeting"));
//! greeting.components.push(Component::reference(0, 2).with_before("Hello,").into());
//! let map: PromptMap =
//!     vec![greeting, PromptRecord::bare(Prompt::simple(2, "name", "world"))].into_iter().collect();
//!
//! let resolver = PromptResolver::new(&map, 5);
//! assert_eq!(resolver.resolve_text(PromptId(1))?, "Hello,\n\nworld");
//! # Ok::<(), promptweave::core::PromptError>(())
//! ```

pub mod bulk;
pub mod preview;

pub use bulk::{BulkFetch, BulkResolution, bulk_fetch, bulk_resolve, resolve_one};

use std::collections::BTreeSet;

use crate::constants::PART_SEPARATOR;
use crate::core::{Component, PromptError, PromptId, ResolutionResult, Result};
use crate::source::PromptSource;

/// Resolves prompts through a fetch capability.
///
/// Holds no state between calls; the visited set lives for one top-level call.
pub struct PromptResolver<'a, S: PromptSource + ?Sized> {
    source: &'a S,
    ceiling: usize,
}

/// Text and deepest level produced by one subtree.
struct Expanded {
    text: String,
    depth_reached: usize,
}

impl<'a, S: PromptSource + ?Sized> PromptResolver<'a, S> {
    /// Create a resolver reading from `source` and enforcing `ceiling`.
    pub fn new(source: &'a S, ceiling: usize) -> Self {
        Self {
            source,
            ceiling,
        }
    }

    /// Resolve `id` into its final text.
    ///
    /// # Errors
    ///
    /// - [`PromptError::NotFound`] when `id` or any referenced id has no prompt
    /// - [`PromptError::MaxDepthExceeded`] when a reference lies below the ceiling
    /// - any error of the underlying source
    ///
    /// Failures anywhere in the tree abort the whole call; there is no partial result.
    pub fn resolve(&self, id: PromptId) -> Result<ResolutionResult> {
        let mut visited = BTreeSet::new();
        let expanded = self.resolve_at(id, 0, &mut visited)?;

        tracing::debug!(
            "Resolved {} (depth {}, {} prompts used)",
            id,
            expanded.depth_reached,
            visited.len()
        );

        Ok(ResolutionResult {
            resolved_text: expanded.text,
            depth_reached: expanded.depth_reached,
            used_prompt_ids: visited,
        })
    }

    /// Resolve `id` and keep only the text.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_text(&self, id: PromptId) -> Result<String> {
        self.resolve(id).map(|result| result.resolved_text)
    }

    /// Every prompt id `id` resolves through, itself included.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn dependencies(&self, id: PromptId) -> Result<BTreeSet<PromptId>> {
        self.resolve(id).map(|result| result.used_prompt_ids)
    }

    fn resolve_at(&self, id: PromptId, depth: usize, visited: &mut BTreeSet<PromptId>) -> Result<Expanded> {
        if depth > self.ceiling {
            return Err(PromptError::MaxDepthExceeded {
                ceiling: self.ceiling,
                depth,
            });
        }

        let record = self.source.fetch(id)?.ok_or(PromptError::NotFound {
            id,
        })?;
        visited.insert(id);

        if !record.prompt.is_compound {
            return Ok(Expanded {
                text: record.prompt.literal_text().to_string(),
                depth_reached: depth,
            });
        }

        // Stored order is not trusted; sort by position.
        self.expand_components(&record.sorted_components(), depth, visited)
    }

    /// Expand an ordered component list owned by a prompt at `depth`.
    fn expand_components(
        &self,
        components: &[&Component],
        depth: usize,
        visited: &mut BTreeSet<PromptId>,
    ) -> Result<Expanded> {
        let mut parts = Vec::with_capacity(components.len() * 3);
        let mut depth_reached = depth;

        for component in components {
            if let Some(before) = &component.text_before {
                parts.push(before.clone());
            }
            if let Some(child) = component.component_prompt_id {
                let nested = self.resolve_at(child, depth + 1, visited)?;
                depth_reached = depth_reached.max(nested.depth_reached);
                parts.push(nested.text);
            }
            if let Some(after) = &component.text_after {
                parts.push(after.clone());
            }
        }

        Ok(Expanded {
            text: join_parts(parts),
            depth_reached,
        })
    }
}

/// Join parts with [`PART_SEPARATOR`], dropping parts that are blank once trimmed.
///
/// Kept parts are joined as-is, without trimming.
pub fn join_parts<I>(parts: I) -> String
where
    I: IntoIterator<Item = String>,
{
    parts.into_iter().filter(|part| !part.trim().is_empty()).collect::<Vec<_>>().join(PART_SEPARATOR)
}
