use promptweave::core::PromptError;
use promptweave::library::{LibraryFile, LibraryFormat, export_library, import_library};
use promptweave::resolver::PromptResolver;
use promptweave::store::{NewPrompt, SqliteStore};

use crate::common::{REVIEW_LIBRARY, REVIEW_TEXT, TestProject};

fn review_library() -> LibraryFile {
    LibraryFile::parse(REVIEW_LIBRARY, LibraryFormat::Toml).unwrap()
}

#[test]
fn test_import_creates_rows_components_and_depths() {
    let store = SqliteStore::open_in_memory().unwrap();
    let report = import_library(&store, &review_library(), 5).unwrap();

    assert_eq!(report.prompts, 3);
    assert_eq!(report.compound, 2);
    assert_eq!(report.components, 4);

    let review = store.find_by_slug("review").unwrap().unwrap();
    let checklist = store.find_by_slug("checklist").unwrap().unwrap();
    let tone = store.find_by_slug("tone").unwrap().unwrap();
    assert_eq!(review.max_depth, Some(2));
    assert_eq!(checklist.max_depth, Some(1));
    assert_eq!(tone.max_depth, None);
    assert_eq!(report.ids["review"], review.id);

    let result = PromptResolver::new(&store, 5).resolve(review.id).unwrap();
    assert_eq!(result.resolved_text, REVIEW_TEXT);
    assert_eq!(result.depth_reached, 2);
    assert_eq!(result.used_prompt_ids.len(), 3);
}

#[test]
fn test_import_handles_forward_references() {
    // `outer` is listed before the prompt it uses.
    let library = LibraryFile::parse(
        r#"
[[prompts]]
slug = "outer"
components = [{ prompt = "inner", after = "!" }]

[[prompts]]
slug = "inner"
text = "hello"
"#,
        LibraryFormat::Toml,
    )
    .unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    import_library(&store, &library, 5).unwrap();

    let outer = store.find_by_slug("outer").unwrap().unwrap();
    assert_eq!(PromptResolver::new(&store, 5).resolve_text(outer.id).unwrap(), "hello\n\n!");
}

#[test]
fn test_import_rejects_cycle_without_writing() {
    let library = LibraryFile::parse(
        r#"
[[prompts]]
slug = "a"
components = [{ prompt = "b" }]

[[prompts]]
slug = "b"
components = [{ prompt = "a" }]
"#,
        LibraryFormat::Toml,
    )
    .unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    let err = import_library(&store, &library, 5).unwrap_err();
    assert!(matches!(err, PromptError::Library { ref reason } if reason.contains("circular reference")));
    assert!(store.list_prompts().unwrap().is_empty());
}

#[test]
fn test_import_rejects_depth_over_ceiling() {
    let store = SqliteStore::open_in_memory().unwrap();
    let err = import_library(&store, &review_library(), 1).unwrap_err();
    assert!(matches!(err, PromptError::MaxDepthExceeded { ceiling: 1, .. }));
    assert!(store.list_prompts().unwrap().is_empty());
}

#[test]
fn test_import_references_existing_store_prompts() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.create_prompt(&NewPrompt::simple("signature", "-- the team")).unwrap();

    let library = LibraryFile::parse(
        r#"{"prompts": [{"slug": "mail", "components": [{"before": "Hi,"}, {"prompt": "signature"}]}]}"#,
        LibraryFormat::Json,
    )
    .unwrap();
    import_library(&store, &library, 5).unwrap();

    let mail = store.find_by_slug("mail").unwrap().unwrap();
    assert_eq!(PromptResolver::new(&store, 5).resolve_text(mail.id).unwrap(), "Hi,\n\n-- the team");

    // Importing the same library again collides on the slug.
    let err = import_library(&store, &library, 5).unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn test_import_rejects_unknown_slug_with_suggestion() {
    let library = LibraryFile::parse(
        r#"
[[prompts]]
slug = "greeting"
text = "hi"

[[prompts]]
slug = "wrapper"
components = [{ prompt = "greting" }]
"#,
        LibraryFormat::Toml,
    )
    .unwrap();

    let store = SqliteStore::open_in_memory().unwrap();
    let err = import_library(&store, &library, 5).unwrap_err();
    assert!(err.to_string().contains("did you mean 'greeting'?"), "{err}");
}

#[tokio::test]
async fn test_export_then_import_into_fresh_database() {
    let project = TestProject::new().unwrap();
    let source = project.store().unwrap();
    import_library(&source, &review_library(), 5).unwrap();

    let exported = export_library(&source).unwrap();
    let path = project.root().join("export.json");
    exported.save(&path, LibraryFormat::Json).await.unwrap();

    let reloaded = LibraryFile::load(&path, None).await.unwrap();
    assert_eq!(reloaded, exported);

    let target = SqliteStore::open_in_memory().unwrap();
    import_library(&target, &reloaded, 5).unwrap();
    let review = target.find_by_slug("review").unwrap().unwrap();
    assert_eq!(PromptResolver::new(&target, 5).resolve_text(review.id).unwrap(), REVIEW_TEXT);
    assert_eq!(review.title.as_deref(), Some("Code review"));
}
