use std::sync::Arc;

use promptweave::config::EngineConfig;
use promptweave::core::{PromptError, PromptId};
use promptweave::library::{LibraryFile, LibraryFormat, import_library};
use promptweave::resolver::{PromptResolver, bulk_fetch, bulk_resolve, resolve_one};
use promptweave::store::{NewComponent, NewPrompt, SqliteStore};
use promptweave::test_utils::CountingSource;

use crate::common::{REVIEW_LIBRARY, REVIEW_TEXT};

fn review_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let library = LibraryFile::parse(REVIEW_LIBRARY, LibraryFormat::Toml).unwrap();
    import_library(&store, &library, 5).unwrap();
    store
}

fn id(store: &SqliteStore, slug: &str) -> PromptId {
    store.find_by_slug(slug).unwrap().unwrap().id
}

#[tokio::test]
async fn test_bulk_matches_single_resolution() {
    let store = Arc::new(review_store());
    let ids: Vec<PromptId> = store.list_prompts().unwrap().iter().map(|p| p.id).collect();

    let outcome = bulk_resolve(Arc::clone(&store), &ids, &EngineConfig::default()).await.unwrap();
    assert_eq!(outcome.success_count, 3);
    assert_eq!(outcome.error_count, 0);

    let resolver = PromptResolver::new(store.as_ref(), EngineConfig::default().max_depth);
    for id in &ids {
        assert_eq!(outcome.resolved_texts[id], resolver.resolve_text(*id).unwrap());
    }
    assert_eq!(outcome.resolved_texts[&ids[2]], REVIEW_TEXT);
}

#[tokio::test]
async fn test_bulk_uses_one_batch_per_level() {
    let store = review_store();
    let review = id(&store, "review");
    let source = Arc::new(CountingSource::new(store));

    let outcome = bulk_resolve(Arc::clone(&source), &[review], &EngineConfig::default()).await.unwrap();

    // review, then checklist; tone arrives as a stub both times.
    assert_eq!(outcome.queries_executed, 2);
    assert_eq!(source.batches(), 2);
    assert_eq!(source.fetches(), 0);
    assert_eq!(outcome.resolved_texts[&review], REVIEW_TEXT);
}

#[test]
fn test_bulk_fetch_pass_count_is_bounded_by_ceiling() {
    let store = SqliteStore::open_in_memory().unwrap();
    let leaf = store.create_prompt(&NewPrompt::simple("leaf", "x")).unwrap();
    let mut below = leaf;
    for level in 1..=4 {
        let compound = store.create_prompt(&NewPrompt::compound(format!("level-{level}"))).unwrap();
        store
            .attach_component(
                compound,
                NewComponent {
                    prompt: Some(below),
                    ..NewComponent::default()
                },
                5,
            )
            .unwrap();
        below = compound;
    }

    assert_eq!(bulk_fetch(&store, &[below], 5).unwrap().passes, 4);
    assert_eq!(bulk_fetch(&store, &[below], 1).unwrap().passes, 2);
}

#[tokio::test]
async fn test_bulk_isolates_per_id_failures() {
    let store = Arc::new(review_store());
    let review = id(&store, "review");
    let tone = id(&store, "tone");
    let missing = PromptId(999);

    let outcome = bulk_resolve(Arc::clone(&store), &[review, missing, tone, review], &EngineConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.error_count, 1);
    assert_eq!(
        outcome.errors[&missing],
        PromptError::NotFound {
            id: missing
        }
    );
    assert_eq!(outcome.errors[&missing].to_string(), "Prompt not found: #999");
}

#[tokio::test]
async fn test_bulk_reports_depth_errors_under_low_ceiling() {
    let store = Arc::new(review_store());
    let review = id(&store, "review");
    let checklist = id(&store, "checklist");

    let config = EngineConfig::with_max_depth(1);
    let outcome = bulk_resolve(Arc::clone(&store), &[review, checklist], &config).await.unwrap();

    assert!(outcome.resolved_texts.contains_key(&checklist));
    assert!(matches!(outcome.errors[&review], PromptError::MaxDepthExceeded { ceiling: 1, depth: 2 }));

    let err = resolve_one(store, review, &config).await.unwrap_err();
    assert!(matches!(err, PromptError::MaxDepthExceeded { .. }));
}

#[tokio::test]
async fn test_bulk_with_no_ids_issues_no_queries() {
    let source = Arc::new(CountingSource::new(review_store()));
    let outcome = bulk_resolve(Arc::clone(&source), &[], &EngineConfig::default()).await.unwrap();
    assert_eq!(outcome, Default::default());
    assert_eq!(source.batches(), 0);
}
