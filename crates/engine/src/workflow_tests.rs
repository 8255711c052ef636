// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use whs_adapters::FakeIssueStore;
use whs_core::Priority;

const ORC: &str = "/fake/orchestrator";

async fn engine() -> WorkflowEngine<FakeIssueStore> {
    let store = FakeIssueStore::new();
    store.init(Path::new(ORC), "orc").await.unwrap();
    WorkflowEngine::new(store, ORC)
}

fn source_issue(id: &str, title: &str) -> Issue {
    Issue::builder().id(id).title(title).priority(Priority(1)).build()
}

#[tokio::test]
async fn start_workflow_creates_epic_and_first_step() {
    let engine = engine().await;
    let source = source_issue("bd-123", "Add auth");

    let (epic_id, step_id) =
        engine.start_workflow("api", &source, AgentRole::Implementation).await.unwrap();

    let epic = engine.store().issue(Path::new(ORC), epic_id.as_str()).unwrap();
    assert_eq!(epic.title, "api:bd-123 - Add auth");
    assert_eq!(epic.issue_type, IssueType::Epic);
    assert_eq!(epic.priority, Priority(1));
    assert!(epic.has_label("whs:workflow"));
    assert!(epic.has_label("project:api"));
    assert!(epic.has_label("source:bd-123"));

    let step = engine.store().issue(Path::new(ORC), step_id.as_str()).unwrap();
    assert_eq!(step.title, "implementation");
    assert_eq!(step.parent, Some(epic_id));
    assert!(step.has_label("whs:step"));
    assert!(step.has_label("agent:implementation"));
}

#[tokio::test]
async fn next_step_depends_on_previous_and_carries_pr_labels() {
    let engine = engine().await;
    let source = source_issue("bd-1", "Work");
    let (epic_id, step1) =
        engine.start_workflow("api", &source, AgentRole::Implementation).await.unwrap();

    let step2 = engine
        .create_next_step(
            &epic_id,
            AgentRole::QualityReview,
            "PR 42",
            Some(42),
            Some(CiStatus::Pending),
        )
        .await
        .unwrap();

    let step = engine.store().issue(Path::new(ORC), step2.as_str()).unwrap();
    assert!(step.has_label("agent:quality_review"));
    assert!(step.has_label("pr:42"));
    assert!(step.has_label("ci:pending"));
    assert_eq!(step.blocker_ids(), vec![step1.clone()]);
    assert_eq!(step.description, "PR 42");

    // Only one step is ready while step1 is open
    let ready = engine.get_ready_workflow_steps().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, step1);

    engine.complete_step(&step1, "PR 42").await.unwrap();
    let ready = engine.get_ready_workflow_steps().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, step2);
}

#[tokio::test]
async fn at_most_one_open_step_per_epic() {
    let engine = engine().await;
    let (epic_id, step1) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();
    engine.complete_step(&step1, "first done").await.unwrap();
    let step2 = engine
        .create_next_step(&epic_id, AgentRole::QualityReview, "", None, None)
        .await
        .unwrap();
    engine.complete_step(&step2, "second done").await.unwrap();
    let step3 = engine
        .create_next_step(&epic_id, AgentRole::ReleaseManager, "", None, None)
        .await
        .unwrap();

    let steps = engine.steps_of(&epic_id).await.unwrap();
    assert_eq!(steps.len(), 3);
    let open: Vec<_> =
        steps.iter().filter(|s| s.status != IssueStatus::Closed).map(|s| &s.id).collect();
    assert_eq!(open, vec![&step3]);

    // Chain order is by creation
    let titles: Vec<_> = steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["implementation", "quality_review", "release_manager"]);
}

#[tokio::test]
async fn mark_step_in_progress_is_idempotent() {
    let engine = engine().await;
    let (_, step) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();

    engine.mark_step_in_progress(&step).await.unwrap();
    let issue = engine.store().issue(Path::new(ORC), step.as_str()).unwrap();
    assert_eq!(issue.status, IssueStatus::InProgress);

    engine.mark_step_in_progress(&step).await.unwrap();
    let issue = engine.store().issue(Path::new(ORC), step.as_str()).unwrap();
    assert_eq!(issue.status, IssueStatus::InProgress);
}

#[tokio::test]
async fn complete_workflow_done_closes_epic() {
    let engine = engine().await;
    let (epic_id, _) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();

    engine.complete_workflow(&epic_id, WorkflowOutcome::Done, "merged").await.unwrap();
    let epic = engine.store().issue(Path::new(ORC), epic_id.as_str()).unwrap();
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(!epic.has_label("blocked:human"));
}

#[tokio::test]
async fn complete_workflow_blocked_labels_and_comments() {
    let engine = engine().await;
    let (epic_id, _) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();

    engine
        .complete_workflow(&epic_id, WorkflowOutcome::Blocked, "agent gave up")
        .await
        .unwrap();

    let epic = engine.store().issue(Path::new(ORC), epic_id.as_str()).unwrap();
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(epic.has_label("blocked:human"));
    let comments = engine.store().comments(Path::new(ORC), epic_id.as_str());
    assert!(comments.iter().any(|c| c.text == "Blocked: agent gave up"));
}

#[tokio::test]
async fn workflow_for_source_prefers_marker_label() {
    let engine = engine().await;
    // A legacy epic without the marker
    engine
        .store()
        .seed(
            Path::new(ORC),
            Issue::builder()
                .id("orc-90")
                .title("legacy")
                .issue_type(IssueType::Epic)
                .labels(vec!["project:api".to_string(), "source:bd-1".to_string()])
                .build(),
        );
    let (epic_id, _) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();

    let found = engine
        .get_workflow_for_source("api", &IssueId::from_string("bd-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, epic_id);

    // Unknown source finds nothing
    let none = engine
        .get_workflow_for_source("api", &IssueId::from_string("bd-404"))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn workflow_for_source_accepts_unmarked_epics() {
    let engine = engine().await;
    engine.store().seed(
        Path::new(ORC),
        Issue::builder()
            .id("orc-90")
            .title("legacy")
            .issue_type(IssueType::Epic)
            .labels(vec!["project:api".to_string(), "source:bd-1".to_string()])
            .build(),
    );

    let found = engine
        .get_workflow_for_source("api", &IssueId::from_string("bd-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, IssueId::from_string("orc-90"));
}

#[tokio::test]
async fn source_bead_info_walks_up_from_step() {
    let engine = engine().await;
    let (epic_id, step_id) = engine
        .start_workflow("api", &source_issue("bd-123", "w"), AgentRole::Implementation)
        .await
        .unwrap();

    let (project, source) = engine.get_source_bead_info(&step_id).await.unwrap();
    assert_eq!(project, "api");
    assert_eq!(source, IssueId::from_string("bd-123"));

    let (project, source) = engine.get_source_bead_info(&epic_id).await.unwrap();
    assert_eq!(project, "api");
    assert_eq!(source, IssueId::from_string("bd-123"));

    // A free-floating issue is not part of a workflow
    let orphan = engine
        .store()
        .create(Path::new(ORC), whs_adapters::CreateIssue::new("stray", IssueType::Task))
        .await
        .unwrap();
    assert!(engine.get_source_bead_info(&orphan.id).await.is_err());
}

#[tokio::test]
async fn workflow_context_accumulates_close_comments() {
    let engine = engine().await;
    let (epic_id, step1) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();
    engine.complete_step(&step1, "opened PR 42").await.unwrap();
    let step2 = engine
        .create_next_step(&epic_id, AgentRole::QualityReview, "PR 42", None, None)
        .await
        .unwrap();
    engine.complete_step(&step2, "review passed").await.unwrap();
    let step3 = engine
        .create_next_step(&epic_id, AgentRole::ReleaseManager, "", None, None)
        .await
        .unwrap();

    let context = engine.get_workflow_context(&step3).await.unwrap();
    assert_eq!(
        context,
        "## implementation\nopened PR 42\n\n## quality_review\nreview passed"
    );

    // The first step sees no prior context
    let empty = engine.get_workflow_context(&step1).await.unwrap();
    assert!(empty.is_empty());
}

#[test]
fn first_agent_policy() {
    let task = Issue::builder().issue_type(IssueType::Task).build();
    assert_eq!(WorkflowEngine::<FakeIssueStore>::get_first_agent(&task), AgentRole::Implementation);

    let bug = Issue::builder().issue_type(IssueType::Bug).build();
    assert_eq!(WorkflowEngine::<FakeIssueStore>::get_first_agent(&bug), AgentRole::Implementation);

    let epic = Issue::builder().issue_type(IssueType::Epic).build();
    assert_eq!(WorkflowEngine::<FakeIssueStore>::get_first_agent(&epic), AgentRole::Planner);
}

#[tokio::test]
async fn errored_workflow_scan() {
    let engine = engine().await;
    let (epic_id, _) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();
    assert!(engine.get_errored_workflows().await.unwrap().is_empty());

    engine
        .store()
        .update(
            &epic_id,
            Path::new(ORC),
            whs_adapters::UpdateIssue::default()
                .add_labels(vec!["errored:handoff".to_string()]),
        )
        .await
        .unwrap();

    let errored = engine.get_errored_workflows().await.unwrap();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].id, epic_id);
}

#[tokio::test]
async fn pending_ci_scan_requires_both_labels() {
    let engine = engine().await;
    let (epic_id, step1) = engine
        .start_workflow("api", &source_issue("bd-1", "w"), AgentRole::Implementation)
        .await
        .unwrap();
    engine.complete_step(&step1, "done").await.unwrap();
    engine
        .create_next_step(
            &epic_id,
            AgentRole::QualityReview,
            "",
            Some(42),
            Some(CiStatus::Pending),
        )
        .await
        .unwrap();
    // A step with pending CI but no PR label is ignored
    engine
        .create_next_step(&epic_id, AgentRole::ReleaseManager, "", None, Some(CiStatus::Pending))
        .await
        .unwrap();

    let pending = engine.get_steps_pending_ci().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].label_value("pr"), Some("42"));
}

#[tokio::test]
async fn ask_question_blocks_the_step() {
    let engine = engine().await;
    let (epic_id, step_id) = engine
        .start_workflow("api", &source_issue("bd-1", "Add auth"), AgentRole::Implementation)
        .await
        .unwrap();

    let work = ActiveWork::builder()
        .work_item_id("bd-1")
        .work_item_title("Add auth")
        .project("api")
        .epic_id(epic_id.as_str())
        .step_id(step_id.as_str())
        .build();

    let pending = engine
        .ask_question(
            &work,
            &SessionId::from_string("sess-1"),
            "need a decision",
            vec![QuestionItem {
                prompt: "JWT or PASETO?".to_string(),
                header: None,
                options: vec!["JWT".to_string(), "PASETO".to_string()],
                multi_select: false,
            }],
            123,
        )
        .await
        .unwrap();

    assert_eq!(pending.step_id, step_id);
    assert_eq!(pending.session_id, SessionId::from_string("sess-1"));

    // The step is blocked until the question closes
    let ready = engine.get_ready_workflow_steps().await.unwrap();
    assert!(ready.is_empty());

    let question =
        engine.store().issue(Path::new(ORC), pending.question_id.as_str()).unwrap();
    assert!(question.has_label("whs:question"));
    let data = QuestionData::from_description(&question.description).unwrap();
    assert_eq!(data.session_id, SessionId::from_string("sess-1"));
    assert_eq!(data.epic_id, epic_id);

    engine
        .store()
        .answer_question(&pending.question_id, "JWT", Path::new(ORC))
        .await
        .unwrap();
    let ready = engine.get_ready_workflow_steps().await.unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].id, step_id);
}
