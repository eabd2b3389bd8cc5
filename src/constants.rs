//! Global constants used throughout the promptweave codebase.
//!
//! This module contains the nesting ceiling, the join separator, and the
//! parallelism parameters shared by the resolvers and the CLI.

/// Maximum nesting depth of compound prompt references (5).
///
/// Both the Graph Validator and the resolvers enforce this ceiling. It also
/// bounds the number of batch passes issued by bulk fetching, which is what
/// guarantees termination on a corrupted (cyclic) reference table.
pub const MAX_NESTING_DEPTH: usize = 5;

/// Separator placed between non-empty parts of a resolved compound prompt.
pub const PART_SEPARATOR: &str = "\n\n";

/// Display prefix of [`crate::core::PromptError::NotFound`].
pub const PROMPT_NOT_FOUND: &str = "Prompt not found";

/// Minimum number of parallel resolutions regardless of CPU count.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
///
/// Per-id resolution is CPU-bound work over an in-memory map, so the
/// multiplier stays small.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
///
/// Used as a fallback when `std::thread::available_parallelism()` returns an error.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default concurrency for bulk resolution: `max(MIN_PARALLELISM, cores × multiplier)`.
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    std::cmp::max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)
}
