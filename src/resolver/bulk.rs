//! Bulk fetching and resolution.
//!
//! Resolving N prompts one at a time costs a fetch per prompt per nesting
//! level. [`bulk_fetch`] instead expands a breadth-first frontier: each pass
//! fetches every pending prompt in one [`BatchSource::fetch_batch`] call, and
//! the next frontier is the set of compound prompts those records reference.
//! The number of round trips is therefore bounded by the nesting depth, not by N.
//!
//! [`bulk_resolve`] then resolves every requested id against the fetched
//! [`PromptMap`] with the ordinary [`PromptResolver`]; the map answers every
//! lookup from memory, so no further data access happens.
//!
//! # Concurrency
//!
//! Passes are sequential because each frontier depends on the previous pass.
//! Per-id resolution reads only the finished map, so it runs concurrently with
//! `buffer_unordered`, each id on the blocking pool.
//!
//! # Error Containment
//!
//! A failing id becomes an entry in [`BulkResolution::errors`]; the other ids
//! resolve normally. Only a failure of the batch fetch itself fails the call.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use super::PromptResolver;
use crate::config::EngineConfig;
use crate::core::{PromptError, PromptId, Result};
use crate::source::{BatchSource, PromptMap};

/// Records gathered by [`bulk_fetch`].
#[derive(Debug, Clone, Default)]
pub struct BulkFetch {
    /// Full records of every fetched prompt, plus stubs of referenced prompts.
    pub records: PromptMap,
    /// Batch fetch calls actually issued.
    pub passes: usize,
}

/// Outcome of [`bulk_resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResolution {
    /// Resolved text per successfully resolved id.
    pub resolved_texts: BTreeMap<PromptId, String>,
    /// Error per failed id.
    pub errors: BTreeMap<PromptId, PromptError>,
    /// Number of ids that resolved.
    pub success_count: usize,
    /// Number of ids that failed.
    pub error_count: usize,
    /// Batch fetch passes issued; at most `ceiling + 1`.
    pub queries_executed: usize,
}

/// Fetch `ids` and everything needed to resolve them, one batch per level.
///
/// Each pass fetches the frontier minus the ids fetched so far. Full records go
/// into the map; each component's referenced prompt goes in as a stub unless a
/// record is already present, so non-compound leaves need no pass of their own.
/// Referenced compound prompts form the next frontier. At most `ceiling + 1`
/// passes run, which bounds the loop even on cyclic data.
///
/// # Errors
///
/// Returns the first error raised by `source`.
pub fn bulk_fetch<B>(source: &B, ids: &[PromptId], ceiling: usize) -> Result<BulkFetch>
where
    B: BatchSource + ?Sized,
{
    let mut result = BulkFetch::default();
    let mut current: BTreeSet<PromptId> = ids.iter().copied().collect();
    let mut fetched: HashSet<PromptId> = HashSet::new();
    let mut depth = 0;

    while !current.is_empty() && depth <= ceiling {
        let to_fetch: Vec<PromptId> = current.iter().copied().filter(|id| !fetched.contains(id)).collect();
        if to_fetch.is_empty() {
            break;
        }

        let batch = source.fetch_batch(&to_fetch)?;
        result.passes += 1;
        tracing::debug!(
            "Bulk fetch pass {}: requested {}, received {}",
            result.passes,
            to_fetch.len(),
            batch.len()
        );

        let mut next = BTreeSet::new();
        for record in batch {
            fetched.insert(record.id());

            let stubs: Vec<_> = record.components.iter().filter_map(|c| c.referenced.clone()).collect();
            result.records.insert(record);

            for stub in stubs {
                if stub.is_compound {
                    next.insert(stub.id);
                }
                result.records.insert_stub(stub);
            }
        }

        current = next;
        depth += 1;
    }

    Ok(result)
}

/// Resolve one id against a bulk-fetched map.
///
/// Non-compound prompts take their text directly without entering the recursion.
fn resolve_from_map(records: &PromptMap, id: PromptId, ceiling: usize) -> Result<String> {
    match records.get(id) {
        None => Err(PromptError::NotFound {
            id,
        }),
        Some(record) if !record.prompt.is_compound => Ok(record.prompt.literal_text().to_string()),
        Some(_) => PromptResolver::new(records, ceiling).resolve_text(id),
    }
}

/// Resolve many prompts with a bounded number of batch fetches.
///
/// Duplicate ids are resolved once. Output is identical, per id, to resolving
/// each id with [`PromptResolver::resolve`] against the same data.
///
/// # Errors
///
/// Fails only when the batch fetch fails or its task panics. Per-id failures are
/// reported in [`BulkResolution::errors`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use promptweave::config::EngineConfig;
/// use promptweave::core::PromptId;
/// use promptweave::resolver::bulk_resolve;
/// use promptweave::store::SqliteStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = Arc::new(SqliteStore::open_in_memory()?);
/// let outcome = bulk_resolve(store, &[PromptId(1), PromptId(2)], &EngineConfig::default()).await?;
/// println!("{} resolved in {} passes", outcome.success_count, outcome.queries_executed);
/// # Ok(())
/// # }
/// ```
pub async fn bulk_resolve<B>(source: Arc<B>, ids: &[PromptId], config: &EngineConfig) -> Result<BulkResolution>
where
    B: BatchSource + Send + Sync + ?Sized + 'static,
{
    let mut seen = HashSet::new();
    let unique: Vec<PromptId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if unique.is_empty() {
        return Ok(BulkResolution::default());
    }

    let ceiling = config.max_depth;
    let fetch_ids = unique.clone();
    let fetched = tokio::task::spawn_blocking(move || bulk_fetch(source.as_ref(), &fetch_ids, ceiling))
        .await
        .map_err(|e| PromptError::Other {
            message: format!("Bulk fetch task failed: {e}"),
        })??;

    let passes = fetched.passes;
    let records = Arc::new(fetched.records);
    let concurrency = config.max_parallel.max(1);

    let outcomes: Vec<(PromptId, Result<String>)> = stream::iter(unique)
        .map(|id| {
            let records = Arc::clone(&records);
            async move {
                let outcome = tokio::task::spawn_blocking(move || resolve_from_map(&records, id, ceiling))
                    .await
                    .unwrap_or_else(|e| {
                        Err(PromptError::Other {
                            message: format!("Resolution task failed: {e}"),
                        })
                    });
                (id, outcome)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut resolution = BulkResolution {
        queries_executed: passes,
        ..BulkResolution::default()
    };
    for (id, outcome) in outcomes {
        match outcome {
            Ok(text) => {
                resolution.resolved_texts.insert(id, text);
            }
            Err(error) => {
                tracing::warn!("Failed to resolve {}: {}", id, error);
                resolution.errors.insert(id, error);
            }
        }
    }
    resolution.success_count = resolution.resolved_texts.len();
    resolution.error_count = resolution.errors.len();

    tracing::debug!(
        "Bulk resolve: {} ok, {} failed, {} passes",
        resolution.success_count,
        resolution.error_count,
        resolution.queries_executed
    );
    Ok(resolution)
}

/// Resolve a single prompt through the bulk path.
///
/// # Errors
///
/// Returns the id's resolution error, or the batch fetch error.
pub async fn resolve_one<B>(source: Arc<B>, id: PromptId, config: &EngineConfig) -> Result<String>
where
    B: BatchSource + Send + Sync + ?Sized + 'static,
{
    let mut resolution = bulk_resolve(source, &[id], config).await?;
    if let Some(error) = resolution.errors.remove(&id) {
        return Err(error);
    }
    resolution.resolved_texts.remove(&id).ok_or(PromptError::NotFound {
        id,
    })
}
