use clap::Parser;
use predicates::prelude::*;
use serial_test::serial;

use promptweave::cli::Cli;
use promptweave::config::GlobalConfig;

use crate::common::{REVIEW_LIBRARY, TestProject};

#[test]
fn test_config_ceiling_applies_to_resolution() {
    let project = TestProject::new().unwrap();
    project.import(REVIEW_LIBRARY).unwrap();

    project.write_config("[resolution]\nmax_depth = 1\n").unwrap();
    project
        .pweave()
        .args(["resolve", "review"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Maximum nesting depth of 1 exceeded"));

    project.pweave().args(["resolve", "checklist"]).assert().success();
}

#[test]
fn test_invalid_config_is_rejected() {
    let project = TestProject::new().unwrap();
    project.write_config("[bulk]\nmax_parallel = 0\n").unwrap();

    project
        .pweave()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_parallel"));
}

#[test]
fn test_database_key_used_without_db_flag() {
    let project = TestProject::new().unwrap();
    let db = project.root().join("from-config.db");
    project.write_config(&format!("database = {:?}\n", db.display().to_string())).unwrap();
    let library = project.write_file("library.toml", REVIEW_LIBRARY).unwrap();

    assert_cmd::Command::cargo_bin("pweave")
        .unwrap()
        .env("PROMPTWEAVE_CONFIG", project.config_path())
        .env_remove("PROMPTWEAVE_DB")
        .arg("import")
        .arg(&library)
        .assert()
        .success();

    assert!(db.exists());
    assert!(!project.db_path().exists());
}

#[tokio::test]
async fn test_missing_config_file_yields_defaults() {
    let project = TestProject::new().unwrap();
    let config = GlobalConfig::load_with_optional(Some(project.config_path().to_path_buf())).await.unwrap();

    assert_eq!(config, GlobalConfig::default());
    let engine = config.engine_config().unwrap();
    assert_eq!(engine.max_depth, promptweave::constants::MAX_NESTING_DEPTH);
    assert!(engine.max_parallel >= 1);
}

#[test]
#[serial]
fn test_environment_supplies_global_flags() {
    let project = TestProject::new().unwrap();

    // SAFETY: serialized with every other test touching these variables.
    unsafe {
        std::env::set_var("PROMPTWEAVE_DB", project.db_path());
        std::env::set_var("PROMPTWEAVE_CONFIG", project.config_path());
    }
    let from_env = Cli::try_parse_from(["pweave", "check"]).unwrap().build_config();
    let from_flag = Cli::try_parse_from(["pweave", "check", "--db", "other.db"]).unwrap().build_config();
    unsafe {
        std::env::remove_var("PROMPTWEAVE_DB");
        std::env::remove_var("PROMPTWEAVE_CONFIG");
    }

    assert_eq!(from_env.database.as_deref(), Some(project.db_path()));
    assert_eq!(from_env.config_path.as_deref(), Some(project.config_path()));
    assert_eq!(from_flag.database.as_deref(), Some(std::path::Path::new("other.db")));
}
