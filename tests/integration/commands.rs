use predicates::prelude::*;

use crate::common::{REVIEW_LIBRARY, REVIEW_TEXT, TestProject};

#[test]
fn test_import_and_resolve() {
    let project = TestProject::new().unwrap();
    let library = project.write_file("library.toml", REVIEW_LIBRARY).unwrap();

    project
        .pweave()
        .arg("import")
        .arg(&library)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 3 prompts (2 compound, 4 components)"));

    project
        .pweave()
        .args(["resolve", "review"])
        .assert()
        .success()
        .stdout(format!("{REVIEW_TEXT}\n"));
}

#[test]
fn test_resolve_json_output() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();
    let review = project.id_of("review").unwrap();

    let output = project.pweave().args(["resolve", "--json", &review.to_string()]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["slug"], "review");
    assert_eq!(json["depth_reached"], 2);
    assert_eq!(json["resolved_text"], REVIEW_TEXT);
    assert_eq!(json["used_prompt_ids"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_resolve_unknown_slug_suggests() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    project
        .pweave()
        .args(["resolve", "reveiw"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No prompt with slug 'reveiw'"))
        .stderr(predicate::str::contains("Did you mean: review?"));
}

#[test]
fn test_attach_validates_references() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    project
        .pweave()
        .args(["attach", "checklist", "--prompt", "tone", "--before", "Again:"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Attached 'tone' at position 2 of 'checklist'"));

    project
        .pweave()
        .args(["attach", "checklist", "--prompt", "review"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Circular reference detected"));

    project
        .pweave()
        .args(["attach", "tone", "--after", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not compound"));
}

#[test]
fn test_preview_resolves_unsaved_components() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();
    let draft = project
        .write_file(
            "draft.toml",
            r#"
[[components]]
before = "Draft:"

[[components]]
prompt = "checklist"
"#,
        )
        .unwrap();

    project
        .pweave()
        .arg("preview")
        .arg(&draft)
        .assert()
        .success()
        .stdout("Draft:\n\nCheck the following:\n\nBe concise and kind.\n\nFlag anything unclear.\n");

    // Nothing was stored.
    assert_eq!(project.store().unwrap().list_prompts().unwrap().len(), 3);
}

#[test]
fn test_bulk_summary_and_json() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    project
        .pweave()
        .args(["bulk", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 resolved, 0 failed, 1 batch pass"));

    let output = project.pweave().args(["bulk", "review", "tone", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success_count"], 2);
    assert_eq!(json["resolved"]["review"], REVIEW_TEXT);
    assert_eq!(json["resolved"]["tone"], "Be concise and kind.");

    project.pweave().arg("bulk").assert().failure().stderr(predicate::str::contains("--all"));
}

#[test]
fn test_deps_lists_uses_and_dependents() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    let output = project.pweave().args(["deps", "tone", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["used"], serde_json::json!([]));
    assert_eq!(json["dependents"], serde_json::json!(["checklist", "review"]));

    project
        .pweave()
        .args(["deps", "review"])
        .assert()
        .success()
        .stdout(predicate::str::contains("├── checklist"))
        .stdout(predicate::str::contains("Uses: 2"))
        .stdout(predicate::str::contains("Used by: none"));
}

#[test]
fn test_check_reports_and_fixes_depth_drift() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    project.pweave().arg("check").assert().success().stdout(predicate::str::contains("no problems"));

    let review = project.id_of("review").unwrap();
    project.store().unwrap().set_max_depth(review, Some(9)).unwrap();

    project
        .pweave()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'review' caches max_depth Some(9) but nests 2 levels"));

    project.pweave().args(["check", "--fix"]).assert().success().stdout(predicate::str::contains("Fixed 1"));
    assert_eq!(project.store().unwrap().get_prompt(review).unwrap().unwrap().max_depth, Some(2));
}

#[test]
fn test_export_round_trips_through_stdout() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    let output = project.pweave().args(["export", "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let other = TestProject::new().unwrap();
    let path = other.write_file("copy.json", &String::from_utf8(output.stdout).unwrap()).unwrap();
    other.pweave().arg("import").arg(&path).assert().success();
    other.pweave().args(["resolve", "review"]).assert().success().stdout(format!("{REVIEW_TEXT}\n"));
}
