// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use whs_core::ProjectConfig;

fn project() -> ProjectConfig {
    ProjectConfig::new("api", "/repos/api")
}

#[yare::parameterized(
    plain      = { "bd-123", "bd-123" },
    slash      = { "feature/auth", "feature-auth" },
    dotted     = { "bd-123.4", "bd-123.4" },
    space      = { "a b", "a-b" },
)]
fn sanitize_branch_cases(input: &str, expected: &str) {
    assert_eq!(sanitize_branch(input), expected);
}

#[test]
fn worktree_path_is_sibling_directory() {
    let path = worktree_path(Path::new("/repos/api"), "bd-123");
    assert_eq!(path, PathBuf::from("/repos/api-worktrees/bd-123"));
}

#[test]
fn matches_source_by_branch_or_directory() {
    let source = IssueId::from_string("bd-123");
    let by_branch = WorktreeInfo {
        branch: "bd-123".to_string(),
        path: PathBuf::from("/repos/api-worktrees/bd-123"),
        is_main: false,
        is_current: false,
        main_state: MainState::Ahead,
        working_tree: WorkingTreeStatus::default(),
    };
    assert!(by_branch.matches_source(&source));

    // Agent renamed the branch; the directory still identifies it
    let renamed = WorktreeInfo { branch: "feature/auth".to_string(), ..by_branch.clone() };
    assert!(renamed.matches_source(&source));

    let other = WorktreeInfo {
        branch: "bd-999".to_string(),
        path: PathBuf::from("/repos/api-worktrees/bd-999"),
        ..by_branch
    };
    assert!(!other.matches_source(&source));
}

#[test]
fn list_json_parses() {
    let json = r#"[
        {
            "branch": "main",
            "path": "/repos/api",
            "is_main": true,
            "is_current": true,
            "main_state": "is_main",
            "working_tree": {"staged": 0, "modified": 0, "untracked": 0}
        },
        {
            "branch": "bd-123",
            "path": "/repos/api-worktrees/bd-123",
            "main_state": "diverged",
            "working_tree": {"modified": 2}
        }
    ]"#;
    let infos: Vec<WorktreeInfo> = serde_json::from_str(json).unwrap();
    assert_eq!(infos.len(), 2);
    assert!(infos[0].is_main);
    assert_eq!(infos[1].main_state, MainState::Diverged);
    assert_eq!(infos[1].working_tree.modified, 2);
    assert!(!infos[1].working_tree.is_clean());
}

#[tokio::test]
async fn fake_ensure_is_idempotent() {
    let fake = FakeWorktrees::new();
    let project = project();
    let source = IssueId::from_string("bd-123");

    let first = fake.ensure(&project, &source).await.unwrap();
    let second = fake.ensure(&project, &source).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, PathBuf::from("/repos/api-worktrees/bd-123"));
    assert_eq!(fake.list(&project).await.unwrap().len(), 1);
}

#[tokio::test]
async fn fake_remove_refuses_main_and_dirty() {
    let fake = FakeWorktrees::new();
    let project = project();
    fake.seed_main(&project);
    fake.ensure(&project, &IssueId::from_string("bd-1")).await.unwrap();
    fake.set_dirty("api", "bd-1", 3);

    let err = fake.remove(&project, "main", true).await.unwrap_err();
    assert!(err.to_string().contains("main"));

    let err = fake.remove(&project, "bd-1", false).await.unwrap_err();
    assert!(err.to_string().contains("uncommitted"));

    // Force removes a dirty worktree
    fake.remove(&project, "bd-1", true).await.unwrap();
    assert!(!fake.exists("api", "bd-1"));
    assert_eq!(fake.removed(), vec![("api".to_string(), "bd-1".to_string())]);
}
