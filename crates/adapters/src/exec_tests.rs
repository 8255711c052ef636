// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn run_captures_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let out = run("echo", &["hello"], dir.path()).await.unwrap();
    assert_eq!(out.trim(), "hello");
}

#[tokio::test]
async fn nonzero_exit_surfaces_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let err = run("sh", &["-c", "echo boom >&2; exit 3"], dir.path()).await.unwrap_err();
    match err {
        CommandError::Failed { command, stderr } => {
            assert!(command.starts_with("sh"));
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run("whs-definitely-not-a-binary", &[], dir.path()).await.unwrap_err();
    assert!(matches!(err, CommandError::Spawn { .. }));
    assert_eq!(err.command(), "whs-definitely-not-a-binary");
}

#[tokio::test]
async fn run_json_parses_and_rejects() {
    let dir = tempfile::tempdir().unwrap();

    let value: serde_json::Value =
        run_json("echo", &["{\"ok\": true}"], dir.path()).await.unwrap();
    assert_eq!(value["ok"], true);

    let err =
        run_json::<serde_json::Value>("echo", &["not json"], dir.path()).await.unwrap_err();
    assert!(matches!(err, CommandError::InvalidJson { .. }));
}

#[test]
fn error_display_includes_command_and_stderr() {
    let err = CommandError::Failed {
        command: "bd show bd-1 --json".to_string(),
        stderr: "issue not found".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("bd show bd-1 --json"));
    assert!(msg.contains("issue not found"));
}
