//! Integration tests for the benv CLI.

#![allow(deprecated)] // cargo_bin is deprecated but the replacement requires macros

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn benv() -> Command {
    Command::cargo_bin("benv").unwrap()
}

/// A plan with one library-plus-executable package, as the planner would
/// emit it.
const TWO_COMPONENT_PLAN: &str = r#"{
  "install-plan": [
    {
      "type": "pre-existing",
      "id": "base-4.18.0.0",
      "pkg-name": "base",
      "pkg-version": "4.18.0.0"
    },
    {
      "type": "configured",
      "id": "bar-2.0-lib",
      "pkg-name": "bar",
      "pkg-version": "2.0",
      "component-name": "lib",
      "depends": ["base-4.18.0.0"],
      "pkg-src": { "type": "repo-tar" }
    },
    {
      "type": "configured",
      "id": "bar-2.0-exe",
      "pkg-name": "bar",
      "pkg-version": "2.0",
      "component-name": "exe:mybar",
      "depends": ["bar-2.0-lib"],
      "pkg-src": { "type": "repo-tar" }
    }
  ]
}"#;

const CYCLIC_PLAN: &str = r#"{
  "install-plan": [
    {
      "type": "configured",
      "id": "u-1-lib",
      "pkg-name": "u",
      "pkg-version": "1",
      "component-name": "lib",
      "depends": ["v-1-lib"],
      "pkg-src": { "type": "repo-tar" }
    },
    {
      "type": "configured",
      "id": "v-1-lib",
      "pkg-name": "v",
      "pkg-version": "1",
      "component-name": "lib",
      "depends": ["u-1-lib"],
      "pkg-src": { "type": "repo-tar" }
    }
  ]
}"#;

fn write_plan_fixture(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("plan.json");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_help() {
    benv()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("relocatable installation tree"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("build"));
}

#[test]
fn test_version() {
    benv()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("benv"))
        .stdout(predicate::str::is_match(r"\d+\.\d+\.\d+").unwrap());
}

#[test]
fn test_plan_requires_seeds() {
    let temp = TempDir::new().unwrap();
    benv()
        .arg("plan")
        .arg("--output-plan")
        .arg(temp.path().join("out.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no seed packages"));
}

#[test]
fn test_build_script_emission() {
    let temp = TempDir::new().unwrap();
    let plan = write_plan_fixture(temp.path(), TWO_COMPONENT_PLAN);
    let fetch_dir = temp.path().join("fetch");
    fs::create_dir_all(fetch_dir.join("bar-2.0")).unwrap();
    let script = temp.path().join("out.sh");

    benv()
        .arg("build")
        .arg("--plan")
        .arg(&plan)
        .arg("--fetch-dir")
        .arg(&fetch_dir)
        .arg("--prefetched")
        .arg("--prefix")
        .arg("/opt/out")
        .arg("--dest-dir")
        .arg(temp.path().join("stage"))
        .arg("--script")
        .arg(&script)
        .assert()
        .success();

    let contents = fs::read_to_string(&script).unwrap();
    assert!(contents.starts_with("#!/bin/sh"));

    // One setup block for the package, then the library's four-step block,
    // then the executable's three-step block, then final staging.
    assert_eq!(contents.matches("# setup:").count(), 1);
    let lib_pos = contents.find("--lib=bar").unwrap();
    let exe_pos = contents.find("--exe=mybar").unwrap();
    let staging_pos = contents.find("# register: bar-2.0").unwrap();
    assert!(lib_pos < exe_pos);
    assert!(exe_pos < staging_pos);
    assert!(contents.contains("--cid=bar-2.0-lib"));
    assert!(contents.contains("--dependency=bar=bar-2.0-lib"));
    assert!(contents.contains("--destdir="));

    // Both databases were prepared even though nothing ran.
    assert!(fetch_dir.join("package.conf").is_dir());
}

#[test]
fn test_build_rejects_cyclic_plan() {
    let temp = TempDir::new().unwrap();
    let plan = write_plan_fixture(temp.path(), CYCLIC_PLAN);
    let fetch_dir = temp.path().join("fetch");
    fs::create_dir_all(&fetch_dir).unwrap();

    benv()
        .arg("build")
        .arg("--plan")
        .arg(&plan)
        .arg("--fetch-dir")
        .arg(&fetch_dir)
        .arg("--prefetched")
        .arg("--prefix")
        .arg("/opt/out")
        .arg("--dest-dir")
        .arg(temp.path().join("stage"))
        .arg("--script")
        .arg(temp.path().join("out.sh"))
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("dependency cycle"));
}

#[test]
fn test_fetch_new_rejects_existing_dir() {
    let temp = TempDir::new().unwrap();
    let plan = write_plan_fixture(temp.path(), TWO_COMPONENT_PLAN);
    let fetch_dir = temp.path().join("fetch");
    fs::create_dir_all(&fetch_dir).unwrap();

    benv()
        .arg("fetch")
        .arg("--plan")
        .arg(&plan)
        .arg("--fetch-dir")
        .arg(&fetch_dir)
        .arg("--new")
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_build_prefetched_requires_fetch_dir() {
    let temp = TempDir::new().unwrap();
    let plan = write_plan_fixture(temp.path(), TWO_COMPONENT_PLAN);

    benv()
        .arg("build")
        .arg("--plan")
        .arg(&plan)
        .arg("--fetch-dir")
        .arg(temp.path().join("missing"))
        .arg("--prefetched")
        .arg("--prefix")
        .arg("/opt/out")
        .arg("--dest-dir")
        .arg(temp.path().join("stage"))
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_async_and_script_conflict() {
    let temp = TempDir::new().unwrap();
    benv()
        .arg("build")
        .arg("--plan")
        .arg(temp.path().join("plan.json"))
        .arg("--fetch-dir")
        .arg(temp.path().join("fetch"))
        .arg("--prefix")
        .arg("/opt/out")
        .arg("--async")
        .arg("--script")
        .arg(temp.path().join("out.sh"))
        .assert()
        .failure()
        .code(2);
}
