//! Graph Validator: gates writes to the prompt reference graph.
//!
//! References live as rows in a relational table, so every walk here tracks
//! ancestors as an explicit set of ids threaded through the recursion, never as
//! marker fields on shared objects.
//!
//! Three checks need data access and live on [`GraphValidator`]:
//! [`detect_cycle`](GraphValidator::detect_cycle),
//! [`compute_depth`](GraphValidator::compute_depth) and
//! [`validate_new_component`](GraphValidator::validate_new_component).
//! The structural checks [`validate_component_list`] and
//! [`validate_prompt_components`] are pure.

use std::collections::{HashMap, HashSet};

use crate::core::{Component, PromptError, PromptId, PromptRecord, Result};
use crate::source::PromptSource;

/// Validates prompt references against a fetch capability.
pub struct GraphValidator<'a, S: PromptSource + ?Sized> {
    source: &'a S,
    ceiling: usize,
}

impl<'a, S: PromptSource + ?Sized> GraphValidator<'a, S> {
    /// Create a validator reading from `source` and enforcing `ceiling`.
    pub fn new(source: &'a S, ceiling: usize) -> Self {
        Self {
            source,
            ceiling,
        }
    }

    fn fetch_required(&self, id: PromptId) -> Result<PromptRecord> {
        self.source.fetch(id)?.ok_or(PromptError::NotFound {
            id,
        })
    }

    /// Walk the reference graph depth-first from `id` and fail on the first cycle.
    ///
    /// Components without a prompt reference are skipped. Non-compound prompts
    /// end the walk.
    ///
    /// # Errors
    ///
    /// - [`PromptError::CircularReference`] with the path from `id` to the repeated id
    /// - [`PromptError::NotFound`] when a visited id has no prompt
    pub fn detect_cycle(&self, id: PromptId) -> Result<()> {
        self.detect_cycle_with_ancestors(id, &[])
    }

    /// Like [`detect_cycle`](Self::detect_cycle), with `ancestors` already on the path.
    ///
    /// Seeding a compound prompt's id here answers "would referencing `id`
    /// from that compound create a cycle?" before the component exists.
    ///
    /// # Errors
    ///
    /// Same as [`detect_cycle`](Self::detect_cycle); the reported path starts
    /// with the seeded ancestors.
    pub fn detect_cycle_with_ancestors(&self, id: PromptId, ancestors: &[PromptId]) -> Result<()> {
        let mut walk = CycleWalk {
            path: ancestors.to_vec(),
            on_path: ancestors.iter().copied().collect(),
            finished: HashSet::new(),
        };

        if walk.on_path.contains(&id) {
            let mut path = walk.path;
            path.push(id);
            return Err(PromptError::CircularReference {
                path,
            });
        }

        self.visit(id, &mut walk)
    }

    fn visit(&self, id: PromptId, walk: &mut CycleWalk) -> Result<()> {
        walk.path.push(id);
        walk.on_path.insert(id);

        let record = self.fetch_required(id)?;
        if record.prompt.is_compound {
            for child in record.referenced_ids() {
                if walk.on_path.contains(&child) {
                    let mut path = walk.path.clone();
                    path.push(child);
                    tracing::debug!("Cycle detected while walking from {}: {:?}", walk.path[0], path);
                    return Err(PromptError::CircularReference {
                        path,
                    });
                }
                if walk.finished.contains(&child) {
                    continue;
                }
                self.visit(child, walk)?;
            }
        }

        walk.path.pop();
        walk.on_path.remove(&id);
        walk.finished.insert(id);
        Ok(())
    }

    /// Nesting depth of `id`, memoized in `memo`.
    ///
    /// A non-compound prompt has depth 0. A compound prompt has depth
    /// `1 + max(depth of referenced prompts)`; components without a reference
    /// contribute nothing, so a compound prompt of pure literal text has depth 0.
    ///
    /// The ceiling is enforced the moment any path from `id` is seen to exceed
    /// it, which also bounds the walk on cyclic data. Pass the same `memo` to
    /// several calls to share work; a diamond-shaped graph fetches each node once.
    ///
    /// # Errors
    ///
    /// - [`PromptError::MaxDepthExceeded`] as soon as the depth would pass the ceiling
    /// - [`PromptError::NotFound`] when a visited id has no prompt
    pub fn compute_depth(&self, id: PromptId, memo: &mut HashMap<PromptId, usize>) -> Result<usize> {
        self.depth_at(id, 0, memo)
    }

    /// [`compute_depth`](Self::compute_depth) with a fresh memo.
    ///
    /// # Errors
    ///
    /// Same as [`compute_depth`](Self::compute_depth).
    pub fn depth_of(&self, id: PromptId) -> Result<usize> {
        self.compute_depth(id, &mut HashMap::new())
    }

    /// Depth of `id`, reached `level` compound hops below the walk's root.
    fn depth_at(&self, id: PromptId, level: usize, memo: &mut HashMap<PromptId, usize>) -> Result<usize> {
        if let Some(&depth) = memo.get(&id) {
            self.check_ceiling(level + depth)?;
            return Ok(depth);
        }

        let record = self.fetch_required(id)?;
        let mut depth = 0;

        if record.prompt.is_compound {
            for child in record.referenced_ids() {
                // A reference below this level already puts the root one hop deeper.
                self.check_ceiling(level + 1)?;
                let child_depth = self.depth_at(child, level + 1, memo)?;
                depth = depth.max(child_depth + 1);
                self.check_ceiling(level + depth)?;
            }
        }

        memo.insert(id, depth);
        Ok(depth)
    }

    fn check_ceiling(&self, depth: usize) -> Result<()> {
        if depth > self.ceiling {
            return Err(PromptError::MaxDepthExceeded {
                ceiling: self.ceiling,
                depth,
            });
        }
        Ok(())
    }

    /// Check that `candidate` may become a component of `compound_id`.
    ///
    /// In order: the candidate exists, it is not the compound itself, attaching
    /// it creates no cycle, and `1 + depth(candidate)` stays within the ceiling.
    ///
    /// # Errors
    ///
    /// [`PromptError::NotFound`], [`PromptError::CircularReference`] or
    /// [`PromptError::MaxDepthExceeded`] for the first failing check.
    pub fn validate_new_component(&self, compound_id: PromptId, candidate: PromptId) -> Result<()> {
        self.fetch_required(candidate)?;

        if candidate == compound_id {
            return Err(PromptError::CircularReference {
                path: vec![compound_id, candidate],
            });
        }

        self.detect_cycle_with_ancestors(candidate, &[compound_id])?;

        let depth = self.depth_of(candidate)?;
        self.check_ceiling(depth + 1)?;

        tracing::debug!(
            "Component {} accepted for {} (resulting depth {})",
            candidate,
            compound_id,
            depth + 1
        );
        Ok(())
    }
}

/// Mutable state of one cycle walk.
struct CycleWalk {
    path: Vec<PromptId>,
    on_path: HashSet<PromptId>,
    finished: HashSet<PromptId>,
}

/// Structural check of a compound prompt's component list. No data access.
///
/// The list must be non-empty, positions must be unique and run contiguously
/// from 0, and every component must carry a reference or some text.
///
/// # Errors
///
/// [`PromptError::InvalidComponent`] describing the first violation.
pub fn validate_component_list(components: &[Component]) -> Result<()> {
    if components.is_empty() {
        return Err(PromptError::invalid_component("a compound prompt needs at least one component"));
    }

    if let Some(empty) = components.iter().find(|c| c.is_empty()) {
        return Err(PromptError::invalid_component(format!(
            "component at position {} has no prompt reference and no text",
            empty.position
        )));
    }

    let mut positions: Vec<u32> = components.iter().map(|c| c.position).collect();
    positions.sort_unstable();

    for (expected, &actual) in (0u32..).zip(positions.iter()) {
        if actual < expected {
            return Err(PromptError::invalid_component(format!("duplicate position {actual}")));
        }
        if actual > expected {
            return Err(PromptError::invalid_component(format!(
                "positions must be contiguous from 0; position {expected} is missing"
            )));
        }
    }

    Ok(())
}

/// Check that a component list is consistent with the owning prompt's compound flag.
///
/// Non-compound prompts carry no components; compound prompts carry a valid list.
///
/// # Errors
///
/// [`PromptError::InvalidComponent`] describing the inconsistency.
pub fn validate_prompt_components(is_compound: bool, components: &[Component]) -> Result<()> {
    if !is_compound {
        if components.is_empty() {
            return Ok(());
        }
        return Err(PromptError::invalid_component(
            "a prompt that is not compound cannot have components",
        ));
    }
    validate_component_list(components)
}
