//! Fetch capabilities: where the engine reads prompts from.
//!
//! The recursive algorithms are written once against [`PromptSource`], a
//! `fetch(id) -> record | none` capability. Swapping the implementation is how
//! the engine switches between a live store and a pre-populated map:
//!
//! - [`crate::store::SqliteStore`] reads the relational tables directly
//! - [`PromptMap`] answers from memory with no data access, which is what bulk
//!   resolution hands to the single resolver after its batch passes
//! - any `Fn(PromptId) -> Result<Option<PromptRecord>>` closure
//!
//! [`BatchSource`] is the second capability, used only by bulk fetching: one
//! call returns many records in a single round trip.

use std::collections::HashMap;

use crate::core::{Prompt, PromptError, PromptId, PromptRecord};

/// Fetch one prompt with one level of components.
///
/// Returns `Ok(None)` when no prompt has the id. `Err` is reserved for failures
/// of the source itself.
pub trait PromptSource {
    /// Fetch the record for `id`.
    fn fetch(&self, id: PromptId) -> Result<Option<PromptRecord>, PromptError>;
}

impl<F> PromptSource for F
where
    F: Fn(PromptId) -> Result<Option<PromptRecord>, PromptError>,
{
    fn fetch(&self, id: PromptId) -> Result<Option<PromptRecord>, PromptError> {
        self(id)
    }
}

/// Fetch many prompts, each with one level of components, in one round trip.
///
/// Ids with no stored prompt are simply absent from the returned records.
pub trait BatchSource {
    /// Fetch the records for `ids`.
    fn fetch_batch(&self, ids: &[PromptId]) -> Result<Vec<PromptRecord>, PromptError>;
}

impl<S: BatchSource + ?Sized> BatchSource for &S {
    fn fetch_batch(&self, ids: &[PromptId]) -> Result<Vec<PromptRecord>, PromptError> {
        (**self).fetch_batch(ids)
    }
}

impl<S: BatchSource + ?Sized> BatchSource for std::sync::Arc<S> {
    fn fetch_batch(&self, ids: &[PromptId]) -> Result<Vec<PromptRecord>, PromptError> {
        (**self).fetch_batch(ids)
    }
}

/// In-memory prompt records keyed by id.
///
/// Lookups are pure map reads. Besides full records the map may hold *stubs*:
/// a referenced prompt's core fields without its components. Stubs let leaf
/// lookups succeed without another round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptMap {
    records: HashMap<PromptId, PromptRecord>,
}

impl PromptMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a full record, replacing any stub or earlier record for the id.
    pub fn insert(&mut self, record: PromptRecord) {
        self.records.insert(record.id(), record);
    }

    /// Insert a referenced prompt's core fields unless the id is already present.
    pub fn insert_stub(&mut self, prompt: Prompt) {
        self.records.entry(prompt.id).or_insert_with(|| PromptRecord::bare(prompt));
    }

    /// Look up a record without cloning.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptRecord> {
        self.records.get(&id)
    }

    /// Whether the map holds a record or stub for `id`.
    #[must_use]
    pub fn contains(&self, id: PromptId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of records and stubs held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over every held record.
    pub fn records(&self) -> impl Iterator<Item = &PromptRecord> {
        self.records.values()
    }
}

impl FromIterator<PromptRecord> for PromptMap {
    fn from_iter<I: IntoIterator<Item = PromptRecord>>(iter: I) -> Self {
        let mut map = Self::new();
        for record in iter {
            map.insert(record);
        }
        map
    }
}

impl PromptSource for PromptMap {
    fn fetch(&self, id: PromptId) -> Result<Option<PromptRecord>, PromptError> {
        Ok(self.records.get(&id).cloned())
    }
}

impl BatchSource for PromptMap {
    fn fetch_batch(&self, ids: &[PromptId]) -> Result<Vec<PromptRecord>, PromptError> {
        Ok(ids.iter().filter_map(|id| self.records.get(id).cloned()).collect())
    }
}
