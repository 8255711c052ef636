// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface: help, config discovery, exit codes, lock exclusivity.

use assert_cmd::Command;
use std::path::Path;

fn whs() -> Command {
    let mut cmd = Command::cargo_bin("whs").expect("whs binary");
    cmd.env_remove("WHS_STATE_DIR").env_remove("WHS_LOG");
    cmd
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

fn stderr_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).to_string()
}

fn write_config(dir: &Path) {
    let whs_dir = dir.join(".whs");
    std::fs::create_dir_all(&whs_dir).expect("create .whs");
    let config = format!(
        r#"{{"orchestratorPath": "{}", "projects": [{{"name": "api", "repoPath": "{}"}}]}}"#,
        dir.display(),
        dir.join("repo").display()
    );
    std::fs::write(whs_dir.join("config.json"), config).expect("write config");
}

#[test]
fn help_lists_subcommands() {
    let assert = whs().arg("--help").assert().success();
    let stdout = stdout_of(&assert);
    for subcommand in ["start", "doctor", "status", "pause", "resume", "answer"] {
        assert!(stdout.contains(subcommand), "help missing {subcommand}");
    }
    // Hook handlers are internal plumbing, not user surface
    assert!(!stdout.contains("hook"));
}

#[test]
fn version_flag_works() {
    let assert = whs().arg("--version").assert().success();
    assert!(stdout_of(&assert).contains("whs"));
}

#[test]
fn missing_config_exits_with_config_code() {
    let tmp = tempfile::tempdir().expect("tempdir");
    whs()
        .arg("status")
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .assert()
        .failure()
        .code(3);
}

#[test]
fn status_reads_persisted_state() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path());

    let assert = whs()
        .arg("status")
        .arg("--config")
        .arg(tmp.path().join(".whs/config.json"))
        .assert()
        .success();
    let stdout = stdout_of(&assert);
    assert!(stdout.contains("dispatcher: not running"));
    assert!(stdout.contains("paused: false"));
    assert!(stdout.contains("active work: 0"));
}

#[test]
fn pause_without_dispatcher_fails() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path());

    let assert = whs()
        .arg("pause")
        .arg("--config")
        .arg(tmp.path().join(".whs/config.json"))
        .assert()
        .failure();
    assert!(stderr_of(&assert).contains("no dispatcher is running"));
}

#[test]
fn second_dispatcher_refuses_to_start() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_config(tmp.path());
    // pid 1 is always alive, so the lock reads as held
    std::fs::write(
        tmp.path().join(".whs/dispatcher.lock"),
        r#"{"pid": 1, "startedAt": 123456}"#,
    )
    .expect("write lock");

    let assert = whs()
        .arg("start")
        .arg("--config")
        .arg(tmp.path().join(".whs/config.json"))
        .assert()
        .failure()
        .code(2);
    let stderr = stderr_of(&assert);
    assert!(stderr.contains("pid 1"), "should print the holder pid: {stderr}");
    assert!(stderr.contains("123456"), "should print the holder start time: {stderr}");

    // The holder's lock file is untouched
    let lock = std::fs::read_to_string(tmp.path().join(".whs/dispatcher.lock")).expect("lock");
    assert!(lock.contains("\"pid\": 1"));
}
