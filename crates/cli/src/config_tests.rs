// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::exit_error::EXIT_CONFIG;

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let whs = dir.join(".whs");
    std::fs::create_dir_all(&whs).unwrap();
    let path = whs.join("config.json");
    std::fs::write(&path, contents).unwrap();
    path
}

fn full_config(orchestrator: &Path) -> String {
    format!(
        r#"{{"orchestratorPath": "{}", "projects": [{{"name": "api", "repoPath": "/repos/api"}}]}}"#,
        orchestrator.display()
    )
}

#[test]
fn explicit_path_wins() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(tmp.path(), &full_config(tmp.path()));

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.projects[0].name, "api");
}

#[test]
fn walk_up_finds_nearest_config() {
    let tmp = tempfile::tempdir().unwrap();
    write_config(tmp.path(), &full_config(tmp.path()));
    let nested = tmp.path().join("a/b/c");
    std::fs::create_dir_all(&nested).unwrap();

    let found = find_config_file(&nested).unwrap();
    assert_eq!(found, tmp.path().join(".whs/config.json"));
}

#[test]
fn pointer_config_redirects_once() {
    let tmp = tempfile::tempdir().unwrap();
    let orchestrator = tmp.path().join("orchestrator");
    std::fs::create_dir_all(&orchestrator).unwrap();
    write_config(&orchestrator, &full_config(&orchestrator));

    let project = tmp.path().join("project");
    std::fs::create_dir_all(&project).unwrap();
    let pointer = write_config(
        &project,
        &format!(r#"{{"orchestratorPath": "{}"}}"#, orchestrator.display()),
    );

    let config = load_config(Some(&pointer)).unwrap();
    assert_eq!(config.orchestrator_path, orchestrator);
    assert_eq!(config.projects.len(), 1);
}

#[test]
fn pointer_to_pointer_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let first = tmp.path().join("first");
    let second = tmp.path().join("second");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();
    write_config(&second, &format!(r#"{{"orchestratorPath": "{}"}}"#, first.display()));
    write_config(&first, &format!(r#"{{"orchestratorPath": "{}"}}"#, second.display()));

    let pointer = first.join(".whs/config.json");
    let err = load_config(Some(&pointer)).unwrap_err();
    assert_eq!(err.code, EXIT_CONFIG);
}

#[test]
fn missing_and_invalid_configs_exit_with_config_code() {
    let tmp = tempfile::tempdir().unwrap();

    let err = load_config(Some(&tmp.path().join("nope.json"))).unwrap_err();
    assert_eq!(err.code, EXIT_CONFIG);

    let bad = write_config(tmp.path(), "{not json");
    let err = load_config(Some(&bad)).unwrap_err();
    assert_eq!(err.code, EXIT_CONFIG);

    let no_orc = write_config(tmp.path(), r#"{"projects": []}"#);
    let err = load_config(Some(&no_orc)).unwrap_err();
    assert_eq!(err.code, EXIT_CONFIG);
}
