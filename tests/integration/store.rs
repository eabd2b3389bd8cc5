use promptweave::core::{PromptError, PromptId};
use promptweave::graph::GraphValidator;
use promptweave::resolver::PromptResolver;
use promptweave::store::{NewComponent, NewPrompt, SqliteStore};
use promptweave::test_utils::init_test_logging;

use crate::common::TestProject;

fn reference(id: PromptId) -> NewComponent {
    NewComponent {
        prompt: Some(id),
        ..NewComponent::default()
    }
}

#[test]
fn test_store_persists_across_reopen() {
    init_test_logging(None);
    let project = TestProject::new().unwrap();

    let (leaf, root) = {
        let store = project.store().unwrap();
        let leaf = store.create_prompt(&NewPrompt::simple("leaf", "Leaf text")).unwrap();
        let root = store.create_prompt(&NewPrompt::compound("root").with_title("Root")).unwrap();
        store
            .attach_component(
                root,
                NewComponent {
                    prompt: Some(leaf),
                    text_before: Some("Intro".to_string()),
                    text_after: None,
                },
                5,
            )
            .unwrap();
        (leaf, root)
    };

    let store = SqliteStore::open(project.db_path()).unwrap();
    let root_prompt = store.get_prompt(root).unwrap().unwrap();
    assert_eq!(root_prompt.title.as_deref(), Some("Root"));
    assert_eq!(root_prompt.max_depth, Some(1));

    let result = PromptResolver::new(&store, 5).resolve(root).unwrap();
    assert_eq!(result.resolved_text, "Intro\n\nLeaf text");
    assert_eq!(result.depth_reached, 1);
    assert_eq!(result.used_prompt_ids, [leaf, root].into_iter().collect());
}

#[test]
fn test_attach_rejects_cycle_and_leaves_store_unchanged() {
    let store = SqliteStore::open_in_memory().unwrap();
    let a = store.create_prompt(&NewPrompt::compound("a")).unwrap();
    let b = store.create_prompt(&NewPrompt::compound("b")).unwrap();
    let c = store.create_prompt(&NewPrompt::compound("c")).unwrap();
    store.attach_component(a, reference(b), 5).unwrap();
    store.attach_component(b, reference(c), 5).unwrap();

    let err = store.attach_component(c, reference(a), 5).unwrap_err();
    assert!(matches!(err, PromptError::CircularReference { .. }));
    assert!(store.dependents(a).unwrap().is_empty());

    let err = store.attach_component(a, reference(a), 5).unwrap_err();
    assert_eq!(
        err,
        PromptError::CircularReference {
            path: vec![a, a]
        }
    );
}

#[test]
fn test_attach_enforces_ceiling() {
    let store = SqliteStore::open_in_memory().unwrap();
    let leaf = store.create_prompt(&NewPrompt::simple("leaf", "x")).unwrap();
    let mut below = leaf;
    for level in 1..=3 {
        let id = store.create_prompt(&NewPrompt::compound(format!("level-{level}"))).unwrap();
        store.attach_component(id, reference(below), 3).unwrap();
        below = id;
    }
    assert_eq!(store.get_prompt(below).unwrap().unwrap().max_depth, Some(3));

    let top = store.create_prompt(&NewPrompt::compound("top")).unwrap();
    let err = store.attach_component(top, reference(below), 3).unwrap_err();
    assert!(matches!(err, PromptError::MaxDepthExceeded { ceiling: 3, .. }));

    // The same reference is fine under a higher ceiling.
    store.attach_component(top, reference(below), 4).unwrap();
    assert_eq!(GraphValidator::new(&store, 4).depth_of(top).unwrap(), 4);
}

#[test]
fn test_attach_appends_positions() {
    let store = SqliteStore::open_in_memory().unwrap();
    let leaf = store.create_prompt(&NewPrompt::simple("leaf", "L")).unwrap();
    let root = store.create_prompt(&NewPrompt::compound("root")).unwrap();

    let first = store.attach_component(root, reference(leaf), 5).unwrap();
    let second = store
        .attach_component(
            root,
            NewComponent {
                text_after: Some("done".to_string()),
                ..NewComponent::default()
            },
            5,
        )
        .unwrap();
    assert_eq!((first.position, second.position), (0, 1));

    let err = store.attach_component(root, NewComponent::default(), 5).unwrap_err();
    assert!(matches!(err, PromptError::InvalidComponent { .. }));

    let err = store.attach_component(leaf, reference(root), 5).unwrap_err();
    assert!(matches!(err, PromptError::InvalidComponent { .. }));

    assert_eq!(PromptResolver::new(&store, 5).resolve_text(root).unwrap(), "L\n\ndone");
}

#[test]
fn test_delete_refused_while_referenced() {
    let store = SqliteStore::open_in_memory().unwrap();
    let leaf = store.create_prompt(&NewPrompt::simple("leaf", "L")).unwrap();
    let root = store.create_prompt(&NewPrompt::compound("root")).unwrap();
    store.attach_component(root, reference(leaf), 5).unwrap();

    let err = store.delete_prompt(leaf).unwrap_err();
    assert!(err.to_string().contains("still referenced by root"));

    store.delete_prompt(root).unwrap();
    store.delete_prompt(leaf).unwrap();
    assert!(store.list_prompts().unwrap().is_empty());
}
