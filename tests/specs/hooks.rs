// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook handler protocol: JSON on stdin, decision on stdout, exit 0.

use assert_cmd::Command;

fn whs() -> Command {
    Command::cargo_bin("whs").expect("whs binary")
}

fn shell_hook(worktree: &str, command: &str) -> serde_json::Value {
    let input = serde_json::json!({
        "tool_name": "Bash",
        "tool_input": {"command": command}
    });
    let assert = whs()
        .args(["hook", "shell", "--worktree", worktree])
        .write_stdin(input.to_string())
        .assert()
        .success();
    serde_json::from_slice(&assert.get_output().stdout).expect("decision json")
}

fn path_hook(worktree: &str, file_path: &str) -> serde_json::Value {
    let input = serde_json::json!({
        "tool_name": "Write",
        "tool_input": {"file_path": file_path}
    });
    let assert = whs()
        .args(["hook", "path", "--worktree", worktree])
        .write_stdin(input.to_string())
        .assert()
        .success();
    serde_json::from_slice(&assert.get_output().stdout).expect("decision json")
}

#[test]
fn dangerous_command_is_denied() {
    let decision = shell_hook("/repos/api-worktrees/bd-1", "git push --force origin main");
    assert_eq!(decision["decision"], "deny");
    assert!(decision["message"].as_str().expect("message").contains("orce push"));
}

#[test]
fn ordinary_command_is_allowed() {
    let decision = shell_hook("/repos/api-worktrees/bd-1", "cargo test --workspace");
    assert_eq!(decision, serde_json::json!({}));
}

#[test]
fn path_escape_is_denied() {
    let decision = path_hook("/repos/api-worktrees/bd-1", "../../etc/passwd");
    assert_eq!(decision["decision"], "deny");

    let decision = path_hook("/repos/api-worktrees/bd-1", "src/lib.rs");
    assert_eq!(decision, serde_json::json!({}));
}

#[test]
fn malformed_input_allows_and_exits_zero() {
    let assert = whs()
        .args(["hook", "shell", "--worktree", "/w"])
        .write_stdin("definitely not json")
        .assert()
        .success();
    let decision: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("decision json");
    assert_eq!(decision, serde_json::json!({}));
}
