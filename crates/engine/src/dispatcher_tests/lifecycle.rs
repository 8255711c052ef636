// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! New task → DONE, multi-step handoffs, BLOCKED terminal.

use super::*;
use whs_adapters::NotifyCall;
use whs_core::MetricRecord;

#[tokio::test]
async fn new_task_runs_to_done() {
    let ctx = setup().await;
    let source = ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_output(handoff_output("DONE", "merged", Some(42), Some("passed")));

    ctx.tick_and_settle().await;

    // Epic and step were created and closed
    let epics = ctx.epics();
    assert_eq!(epics.len(), 1);
    let epic = &epics[0];
    assert_eq!(epic.title, "proj0:p0-1 - Add auth");
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(epic.has_label("whs:workflow"));
    assert!(!epic.has_label("blocked:human"));

    let step = ctx.issue(&format!("{}.1", epic.id));
    assert_eq!(step.status, IssueStatus::Closed);
    assert!(step.has_label("agent:implementation"));
    let comments = ctx.store.comments(ctx.orc(), step.id.as_str());
    assert_eq!(comments.last().unwrap().text, "Closed: merged");

    // Source closed in the project tracker with the canonical reason
    let source = ctx.store.issue(ctx.repo(), source.id.as_str()).unwrap();
    assert_eq!(source.status, IssueStatus::Closed);
    let source_comments = ctx.store.comments(ctx.repo(), source.id.as_str());
    assert!(source_comments.last().unwrap().text.contains("Completed by whs workflow"));

    // Worktree removal was attempted
    assert_eq!(ctx.worktrees.removed(), vec![("proj0".to_string(), "p0-1".to_string())]);

    // Active work drained; completion notified
    assert!(ctx.dispatcher.state_snapshot().active_work.is_empty());
    assert!(ctx.notifier.calls().iter().any(|c| matches!(
        c,
        NotifyCall::Complete { work_item, outcome } if work_item == "p0-1" && outcome == "done"
    )));

    // Step and workflow metrics recorded
    let records = ctx.metrics().read_all();
    assert!(records.iter().any(|r| matches!(r, MetricRecord::Step(m) if m.outcome == "DONE")));
    assert!(
        records.iter().any(|r| matches!(r, MetricRecord::Workflow(m) if m.outcome == "done"))
    );
}

#[tokio::test]
async fn multi_step_handoff_chains_agents() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_output(handoff_output("quality_review", "PR 42", Some(42), Some("pending")));

    ctx.tick_and_settle().await;

    let epic = &ctx.epics()[0];
    let step1 = ctx.issue(&format!("{}.1", epic.id));
    let step2 = ctx.issue(&format!("{}.2", epic.id));
    assert_eq!(step1.status, IssueStatus::Closed);
    assert_eq!(step2.status, IssueStatus::Open);
    assert!(step2.has_label("agent:quality_review"));
    assert!(step2.has_label("pr:42"));
    assert!(step2.has_label("ci:pending"));
    assert_eq!(step2.blocker_ids(), vec![step1.id.clone()]);

    // The launch settled, so the slot is free until the next tick
    assert!(ctx.dispatcher.state_snapshot().active_work.is_empty());

    // Next tick picks up step 2 and runs it to DONE
    ctx.runner.push_output(handoff_output("DONE", "shipped", None, None));
    ctx.tick_and_settle().await;

    let step2 = ctx.issue(step2.id.as_str());
    assert_eq!(step2.status, IssueStatus::Closed);
    let epic = ctx.issue(epic.id.as_str());
    assert_eq!(epic.status, IssueStatus::Closed);

    // The review step saw the implementation step's context
    let review_request = &ctx.runner.requests()[1];
    assert!(review_request.prompt.contains("## implementation"));
    assert!(review_request.prompt.contains("PR 42"));
}

#[tokio::test]
async fn blocked_handoff_labels_for_human_and_keeps_worktree() {
    let ctx = setup().await;
    ctx.seed_task(0, "Gnarly task", 1).await;
    ctx.runner.push_output(handoff_output("BLOCKED", "need repo access", None, None));

    ctx.tick_and_settle().await;

    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(epic.has_label("blocked:human"));
    let comments = ctx.store.comments(ctx.orc(), epic.id.as_str());
    assert!(comments.iter().any(|c| c.text == "Blocked: need repo access"));

    // Worktree left for the human; source issue stays open
    assert!(ctx.worktrees.removed().is_empty());
    assert!(ctx.worktrees.exists("proj0", "p0-1"));
    let source = ctx.store.issue(ctx.repo(), "p0-1").unwrap();
    assert_eq!(source.status, IssueStatus::Open);

    assert!(ctx.notifier.calls().iter().any(|c| matches!(
        c,
        NotifyCall::Complete { outcome, .. } if outcome == "blocked"
    )));
}

#[tokio::test]
async fn blocked_source_is_not_picked_up_again() {
    let ctx = setup().await;
    ctx.seed_task(0, "Gnarly task", 1).await;
    ctx.runner.push_output(handoff_output("BLOCKED", "stuck", None, None));
    ctx.tick_and_settle().await;
    assert_eq!(ctx.epics().len(), 1);
    let requests_before = ctx.runner.requests().len();

    // Source is still open and ready, but its workflow epic exists
    ctx.tick_and_settle().await;
    assert_eq!(ctx.epics().len(), 1);
    assert_eq!(ctx.runner.requests().len(), requests_before);
}

#[tokio::test]
async fn planning_epic_starts_with_planner() {
    let ctx = setup().await;
    ctx.store
        .create(
            ctx.repo(),
            CreateIssue::new("Big feature", IssueType::Epic).priority(Priority(1)),
        )
        .await
        .unwrap();
    ctx.runner.push_output(handoff_output("DONE", "planned", None, None));

    ctx.tick_and_settle().await;

    let epic = &ctx.epics()[0];
    let step = ctx.issue(&format!("{}.1", epic.id));
    assert_eq!(step.title, "planner");
    assert!(step.has_label("agent:planner"));
}

#[tokio::test]
async fn worktree_reused_and_session_resumed_within_step() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;

    // First run rate-limits, so the work record (with session) survives
    ctx.runner.push_error(whs_adapters::AgentError::RateLimited("429".to_string()));
    ctx.tick_and_settle().await;
    assert_eq!(ctx.dispatcher.state_snapshot().active_count(), 1);

    ctx.dispatcher.resume();
    ctx.runner.push_output(handoff_output("DONE", "merged", None, None));
    ctx.tick_and_settle().await;

    // The relaunch reused the same worktree path
    let requests = ctx.runner.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].cwd, requests[1].cwd);
    assert!(ctx.dispatcher.state_snapshot().active_work.is_empty());
}
