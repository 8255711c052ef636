// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use whs_core::{QuestionData, QuestionItem, SessionId};

fn tracker_path() -> PathBuf {
    PathBuf::from("/fake/tracker")
}

async fn store_with_issue(title: &str) -> (FakeIssueStore, Issue) {
    let store = FakeIssueStore::new();
    let issue = store
        .create(&tracker_path(), CreateIssue::new(title, IssueType::Task))
        .await
        .unwrap();
    (store, issue)
}

#[tokio::test]
async fn create_mints_prefixed_ids() {
    let store = FakeIssueStore::new();
    store.init(&tracker_path(), "orc").await.unwrap();

    let a = store.create(&tracker_path(), CreateIssue::new("a", IssueType::Epic)).await.unwrap();
    let b = store.create(&tracker_path(), CreateIssue::new("b", IssueType::Task)).await.unwrap();
    assert_eq!(a.id, "orc-1");
    assert_eq!(b.id, "orc-2");
}

#[tokio::test]
async fn children_get_dot_suffixed_ids() {
    let store = FakeIssueStore::new();
    store.init(&tracker_path(), "orc").await.unwrap();
    let epic =
        store.create(&tracker_path(), CreateIssue::new("epic", IssueType::Epic)).await.unwrap();

    let s1 = store
        .create(
            &tracker_path(),
            CreateIssue::new("implementation", IssueType::Task).parent(epic.id.clone()),
        )
        .await
        .unwrap();
    let s2 = store
        .create(
            &tracker_path(),
            CreateIssue::new("quality_review", IssueType::Task).parent(epic.id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(s1.id, "orc-1.1");
    assert_eq!(s2.id, "orc-1.2");
    assert_eq!(s1.parent, Some(epic.id));
}

#[tokio::test]
async fn ready_requires_active_status_and_satisfied_deps() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    let a = store.create(&path, CreateIssue::new("a", IssueType::Task)).await.unwrap();
    let b = store.create(&path, CreateIssue::new("b", IssueType::Task)).await.unwrap();
    store.dep_add(&b.id, &a.id, &path).await.unwrap();

    // b is blocked on a
    let ready: Vec<_> = store.ready(&path).await.unwrap();
    assert_eq!(ready.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["bd-1"]);

    store.close(&a.id, "done", &path).await.unwrap();
    let ready = store.ready(&path).await.unwrap();
    assert_eq!(ready.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["bd-2"]);
}

#[tokio::test]
async fn ready_orders_by_priority() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    store
        .create(&path, CreateIssue::new("low", IssueType::Task).priority(Priority(3)))
        .await
        .unwrap();
    store
        .create(&path, CreateIssue::new("critical", IssueType::Bug).priority(Priority(0)))
        .await
        .unwrap();
    store
        .create(&path, CreateIssue::new("normal", IssueType::Task).priority(Priority(2)))
        .await
        .unwrap();

    let titles: Vec<_> =
        store.ready(&path).await.unwrap().into_iter().map(|i| i.title).collect();
    assert_eq!(titles, vec!["critical", "normal", "low"]);
}

#[tokio::test]
async fn in_progress_issues_remain_ready() {
    let (store, issue) = store_with_issue("work").await;
    store
        .update(
            &issue.id,
            &tracker_path(),
            UpdateIssue::default().status(IssueStatus::InProgress),
        )
        .await
        .unwrap();

    let ready = store.ready(&tracker_path()).await.unwrap();
    assert_eq!(ready.len(), 1);
}

#[tokio::test]
async fn tombstoned_dependency_satisfies() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    let a = store.create(&path, CreateIssue::new("a", IssueType::Task)).await.unwrap();
    let b = store.create(&path, CreateIssue::new("b", IssueType::Task)).await.unwrap();
    store.dep_add(&b.id, &a.id, &path).await.unwrap();
    store
        .update(&a.id, &path, UpdateIssue::default().status(IssueStatus::Tombstone))
        .await
        .unwrap();

    let ready = store.ready(&path).await.unwrap();
    assert_eq!(ready.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["bd-2"]);
}

#[tokio::test]
async fn dep_add_rejects_cycles() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    let a = store.create(&path, CreateIssue::new("a", IssueType::Task)).await.unwrap();
    let b = store.create(&path, CreateIssue::new("b", IssueType::Task)).await.unwrap();

    store.dep_add(&b.id, &a.id, &path).await.unwrap();
    let err = store.dep_add(&a.id, &b.id, &path).await.unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[tokio::test]
async fn parent_plus_reverse_dependency_cycles() {
    // A child that is linked to its parent by `parent` must not also
    // declare an explicit dependency on it; the parent edge closes a loop.
    let store = FakeIssueStore::new();
    let path = tracker_path();
    let epic = store.create(&path, CreateIssue::new("epic", IssueType::Epic)).await.unwrap();
    let task = store
        .create(&path, CreateIssue::new("plan", IssueType::Task).parent(epic.id.clone()))
        .await
        .unwrap();

    // task → epic explicit dependency closes the loop (epic → task exists
    // implicitly through the parent relationship).
    let err = store.dep_add(&task.id, &epic.id, &path).await.unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[tokio::test]
async fn step_blocked_on_child_question_is_allowed() {
    // The designed question pattern must NOT trip cycle detection:
    // question.parent = step, step depends on question.
    let store = FakeIssueStore::new();
    let path = tracker_path();
    let step = store.create(&path, CreateIssue::new("step", IssueType::Task)).await.unwrap();
    let question = store
        .create(&path, CreateIssue::new("q", IssueType::Question).parent(step.id.clone()))
        .await
        .unwrap();

    store.dep_add(&step.id, &question.id, &path).await.unwrap();
    let ready = store.ready(&path).await.unwrap();
    assert!(ready.iter().all(|i| i.id != step.id), "blocked step must not be ready");
}

#[tokio::test]
async fn update_adds_labels_without_duplicates() {
    let (store, issue) = store_with_issue("work").await;
    store
        .update(
            &issue.id,
            &tracker_path(),
            UpdateIssue::default().add_labels(vec!["pr:42".to_string()]),
        )
        .await
        .unwrap();
    store
        .update(
            &issue.id,
            &tracker_path(),
            UpdateIssue::default().add_labels(vec!["pr:42".to_string(), "ci:pending".to_string()]),
        )
        .await
        .unwrap();

    let issue = store.issue(&tracker_path(), issue.id.as_str()).unwrap();
    assert_eq!(issue.labels, vec!["pr:42".to_string(), "ci:pending".to_string()]);
}

#[tokio::test]
async fn close_records_reason_comment() {
    let (store, issue) = store_with_issue("work").await;
    store.close(&issue.id, "merged", &tracker_path()).await.unwrap();

    let issue = store.issue(&tracker_path(), issue.id.as_str()).unwrap();
    assert_eq!(issue.status, IssueStatus::Closed);
    let comments = store.list_comments(&issue.id, &tracker_path()).await.unwrap();
    assert_eq!(comments.last().unwrap().text, "Closed: merged");
}

#[tokio::test]
async fn show_unknown_issue_fails_with_command_context() {
    let store = FakeIssueStore::new();
    let err =
        store.show(&IssueId::from_string("bd-404"), &tracker_path()).await.unwrap_err();
    assert!(err.to_string().contains("bd-404"));
}

#[tokio::test]
async fn list_filters_compose() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    store
        .create(
            &path,
            CreateIssue::new("epic", IssueType::Epic)
                .labels(vec!["whs:workflow".to_string(), "project:api".to_string()]),
        )
        .await
        .unwrap();
    store
        .create(&path, CreateIssue::new("step", IssueType::Task).labels(vec!["whs:step".to_string()]))
        .await
        .unwrap();

    let filter = ListFilter::default()
        .issue_type(IssueType::Epic)
        .labels_all(vec!["whs:workflow".to_string(), "project:api".to_string()]);
    let found = store.list(&path, &filter).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "epic");

    let none = store
        .list(&path, &ListFilter::default().labels_none(vec!["whs:step".to_string()]))
        .await
        .unwrap();
    assert_eq!(none.len(), 1);
}

#[tokio::test]
async fn question_convention_round_trip() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    let step = store.create(&path, CreateIssue::new("implementation", IssueType::Task)).await.unwrap();

    let data = QuestionData {
        project: "api".to_string(),
        epic_id: IssueId::from_string("orc-1"),
        step_id: step.id.clone(),
        session_id: SessionId::from_string("sess-1"),
        worktree: PathBuf::from("/w"),
        context: "need input".to_string(),
        questions: vec![QuestionItem {
            prompt: "Which auth?".to_string(),
            header: None,
            options: vec![],
            multi_select: false,
        }],
        asked_at_ms: 1,
    };

    let question =
        store.create_question("Question: implementation", &path, &data, &step.id).await.unwrap();
    assert!(question.has_label(whs_core::labels::QUESTION));
    assert_eq!(question.parent, Some(step.id.clone()));

    // Step is blocked now
    let pending = store.list_pending_questions(&path).await.unwrap();
    assert_eq!(pending.len(), 1);
    let parsed = QuestionData::from_description(&pending[0].description).unwrap();
    assert_eq!(parsed, data);
    assert!(store.ready(&path).await.unwrap().iter().all(|i| i.id != step.id));

    // Answering closes the question and unblocks the step
    store.answer_question(&question.id, "Use JWT", &path).await.unwrap();
    assert!(store.list_pending_questions(&path).await.unwrap().is_empty());
    assert!(store.ready(&path).await.unwrap().iter().any(|i| i.id == step.id));
    let comments = store.list_comments(&question.id, &path).await.unwrap();
    assert!(comments.iter().any(|c| c.text == "Answer: Use JWT"));
}

#[tokio::test]
async fn daemon_bookkeeping() {
    let store = FakeIssueStore::new();
    let path = tracker_path();
    assert!(!store.is_daemon_running(&path).await.unwrap());

    store.ensure_daemon_with_sync_branch(&path, "beads-sync").await.unwrap();
    assert!(store.is_daemon_running(&path).await.unwrap());
    assert_eq!(store.daemon_starts(&path), 1);

    // Already running: no second start
    store.ensure_daemon_with_sync_branch(&path, "beads-sync").await.unwrap();
    assert_eq!(store.daemon_starts(&path), 1);
}

#[test]
fn list_filter_matches_directly() {
    let issue = Issue::builder()
        .issue_type(IssueType::Question)
        .status(IssueStatus::Open)
        .labels(vec!["whs:question".to_string()])
        .build();

    assert!(ListFilter::default()
        .issue_type(IssueType::Question)
        .statuses(vec![IssueStatus::Open])
        .labels_all(vec!["whs:question".to_string()])
        .matches(&issue));
    assert!(!ListFilter::default().statuses(vec![IssueStatus::Closed]).matches(&issue));
    assert!(!ListFilter::default()
        .labels_none(vec!["whs:question".to_string()])
        .matches(&issue));
}
