//! Test utilities for promptweave
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`init_test_logging`] installs a test-friendly tracing subscriber once
//! - [`PromptMapBuilder`] assembles an in-memory prompt graph, joining
//!   component stubs the way a store fetch would
//! - [`CountingSource`] wraps a source and counts fetches and batch passes
//!
//! # Example
//!
//! ```rust,no_run
//! use promptweave::resolver::PromptResolver;
//! use promptweave::test_utils::PromptMapBuilder;
//!
//! let map = PromptMapBuilder::new()
//!     .simple(1, "tone", "Be concise.")
//!     .compound(2, "review", &[(Some(1), Some("Review this."), None)])
//!     .build();
//!
//! let text = PromptResolver::new(&map, 5).resolve_text(2.into()).unwrap();
//! assert_eq!(text, "Review this.\n\nBe concise.");
//! ```

use std::collections::BTreeMap;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::{Component, ComponentRecord, Prompt, PromptError, PromptId, PromptRecord};
use crate::source::{BatchSource, PromptMap, PromptSource};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, tests run without a subscriber.
///
/// ```bash
/// RUST_LOG=promptweave=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// One component given as `(referenced id, text_before, text_after)`.
pub type ComponentSpec<'a> = (Option<i64>, Option<&'a str>, Option<&'a str>);

/// Builder for in-memory prompt graphs.
///
/// Components are numbered by their order in the slice. `build` attaches each
/// referenced prompt's core fields as a stub, so the result looks like what
/// [`crate::store::SqliteStore`] returns. References to ids never added stay
/// dangling, which is how tests model a deleted prompt.
#[derive(Debug, Default)]
pub struct PromptMapBuilder {
    prompts: BTreeMap<PromptId, Prompt>,
    components: BTreeMap<PromptId, Vec<Component>>,
}

impl PromptMapBuilder {
    /// Start an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-compound prompt.
    #[must_use]
    pub fn simple(mut self, id: i64, slug: &str, text: &str) -> Self {
        self.prompts.insert(PromptId(id), Prompt::simple(id, slug, text));
        self
    }

    /// Add a non-compound prompt without text.
    #[must_use]
    pub fn empty(mut self, id: i64, slug: &str) -> Self {
        let mut prompt = Prompt::simple(id, slug, "");
        prompt.text = None;
        self.prompts.insert(PromptId(id), prompt);
        self
    }

    /// Add a compound prompt with components in slice order.
    #[must_use]
    pub fn compound(mut self, id: i64, slug: &str, components: &[ComponentSpec<'_>]) -> Self {
        let components = components
            .iter()
            .zip(0u32..)
            .map(|(&(prompt, before, after), position)| Component {
                position,
                component_prompt_id: prompt.map(PromptId),
                text_before: before.map(str::to_string),
                text_after: after.map(str::to_string),
            })
            .collect();
        self.prompts.insert(PromptId(id), Prompt::compound(id, slug));
        self.components.insert(PromptId(id), components);
        self
    }

    /// Add a compound prompt made of plain references.
    #[must_use]
    pub fn references(self, id: i64, slug: &str, targets: &[i64]) -> Self {
        let specs: Vec<ComponentSpec<'_>> = targets.iter().map(|&t| (Some(t), None, None)).collect();
        self.compound(id, slug, &specs)
    }

    /// Build the records, joining referenced stubs.
    #[must_use]
    pub fn build(self) -> PromptMap {
        self.records().into_iter().collect()
    }

    /// Build the records without collecting them into a map.
    #[must_use]
    pub fn records(self) -> Vec<PromptRecord> {
        let Self {
            prompts,
            mut components,
        } = self;

        prompts
            .values()
            .map(|prompt| {
                let components = components
                    .remove(&prompt.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|component| ComponentRecord {
                        referenced: component.component_prompt_id.and_then(|id| prompts.get(&id).cloned()),
                        component,
                    })
                    .collect();
                PromptRecord {
                    prompt: prompt.clone(),
                    components,
                }
            })
            .collect()
    }
}

/// Source wrapper counting how often each capability is used.
#[derive(Debug)]
pub struct CountingSource<S> {
    inner: S,
    fetches: AtomicUsize,
    batches: AtomicUsize,
}

impl<S> CountingSource<S> {
    /// Wrap `inner` with zeroed counters.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
        }
    }

    /// Number of single fetches so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of batch round trips so far.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl<S: PromptSource> PromptSource for CountingSource<S> {
    fn fetch(&self, id: PromptId) -> Result<Option<PromptRecord>, PromptError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(id)
    }
}

impl<S: BatchSource> BatchSource for CountingSource<S> {
    fn fetch_batch(&self, ids: &[PromptId]) -> Result<Vec<PromptRecord>, PromptError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_batch(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::PromptResolver;

    #[test]
    fn test_builder_joins_stubs() {
        let map = PromptMapBuilder::new()
            .simple(1, "leaf", "x")
            .references(2, "root", &[1, 9])
            .build();

        let root = map.get(PromptId(2)).unwrap();
        assert_eq!(root.components.len(), 2);
        assert_eq!(root.components[0].referenced.as_ref().map(|p| p.slug.as_str()), Some("leaf"));
        assert!(root.components[1].referenced.is_none());
    }

    #[test]
    fn test_counting_source_counts_each_fetch() {
        let source = CountingSource::new(
            PromptMapBuilder::new()
                .simple(1, "a", "A")
                .simple(2, "b", "B")
                .references(3, "both", &[1, 2])
                .build(),
        );

        let text = PromptResolver::new(&source, 5).resolve_text(PromptId(3)).unwrap();
        assert_eq!(text, "A\n\nB");
        assert_eq!(source.fetches(), 3);
        assert_eq!(source.batches(), 0);

        source.fetch_batch(&[PromptId(1), PromptId(2)]).unwrap();
        assert_eq!(source.batches(), 1);
    }
}
