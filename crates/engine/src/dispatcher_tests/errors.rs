// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent failures: auth, rate limit, crashes, unresolvable handoffs.

use super::*;
use whs_adapters::{AgentError, NotifyCall};
use whs_core::MetricRecord;

#[tokio::test]
async fn auth_error_blocks_workflow_but_keeps_dispatching() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_error(AgentError::Auth("invalid api key".to_string()));

    ctx.tick_and_settle().await;

    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(epic.has_label("blocked:human"));
    assert!(epic.has_label("errored:agent"));

    // Dispatcher itself keeps going: not paused, slot freed
    let state = ctx.dispatcher.state_snapshot();
    assert!(!state.paused);
    assert!(state.active_work.is_empty());

    assert!(ctx.notifier.calls().iter().any(|c| matches!(
        c,
        NotifyCall::Error { error, .. } if error.contains("invalid api key")
    )));

    // Other work still starts
    ctx.seed_task(0, "Other task", 1).await;
    ctx.runner.push_output(handoff_output("DONE", "ok", None, None));
    ctx.tick_and_settle().await;
    assert_eq!(ctx.epics().len(), 2);
}

#[tokio::test]
async fn rate_limit_pauses_and_preserves_work() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_error(AgentError::RateLimited("429 too many requests".to_string()));

    ctx.tick_and_settle().await;

    let state = ctx.dispatcher.state_snapshot();
    assert!(state.paused);
    assert_eq!(state.active_count(), 1, "rate-limited work stays active");

    // The workflow was not blocked
    let epic = &ctx.epics()[0];
    assert_ne!(ctx.issue(epic.id.as_str()).status, IssueStatus::Closed);

    assert!(ctx.notifier.calls().iter().any(|c| matches!(
        c,
        NotifyCall::RateLimit { message } if message.contains("429")
    )));

    // Paused: further ticks are no-ops
    let requests = ctx.runner.requests().len();
    ctx.tick_and_settle().await;
    assert_eq!(ctx.runner.requests().len(), requests);

    // Operator resumes; the same step is retried
    ctx.dispatcher.resume();
    ctx.runner.push_output(handoff_output("DONE", "ok", None, None));
    ctx.tick_and_settle().await;
    assert_eq!(ctx.issue(epic.id.as_str()).status, IssueStatus::Closed);
    assert!(ctx.dispatcher.state_snapshot().active_work.is_empty());

    let records = ctx.metrics().read_all();
    assert!(records
        .iter()
        .any(|r| matches!(r, MetricRecord::Step(m) if m.outcome == "rate_limited")));
}

#[tokio::test]
async fn run_error_blocks_workflow_with_message() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_error(AgentError::Failed("agent crashed mid-turn".to_string()));

    ctx.tick_and_settle().await;

    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(epic.has_label("blocked:human"));
    let comments = ctx.store.comments(ctx.orc(), epic.id.as_str());
    assert!(comments.iter().any(|c| c.text.contains("agent crashed mid-turn")));
}

#[tokio::test]
async fn unresolvable_handoff_blocks_with_output_tail() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    // Neither the run nor the forced-handoff resume yields a handoff
    ctx.runner.push_output("I did some things.\nThen I stopped without explaining.");
    ctx.runner.push_output("still no handoff");

    ctx.tick_and_settle().await;

    // Two runs: the original and the forced-handoff resume
    assert_eq!(ctx.runner.requests().len(), 2);
    assert_eq!(
        ctx.runner.requests()[1].resume,
        Some(whs_core::SessionId::from_string("sess-fake-1"))
    );

    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(epic.has_label("blocked:human"));

    // The step's close comment quotes the tail for human diagnosis
    let step = ctx.issue(&format!("{}.1", epic.id));
    let comments = ctx.store.comments(ctx.orc(), step.id.as_str());
    assert!(comments.last().unwrap().text.contains("stopped without explaining"));
}

#[tokio::test]
async fn notifier_failures_never_stop_the_workflow() {
    let ctx = setup().await;
    ctx.notifier.fail_all();
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_output(handoff_output("DONE", "merged", None, None));

    ctx.tick_and_settle().await;

    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(ctx.dispatcher.state_snapshot().active_work.is_empty());
    // The calls were still attempted
    assert!(!ctx.notifier.calls().is_empty());
}

#[tokio::test]
async fn done_tolerates_worktree_removal_failure() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.worktrees.fail_removals();
    ctx.runner.push_output(handoff_output("DONE", "merged", None, None));

    ctx.tick_and_settle().await;

    // DONE still completes even though worktree removal failed
    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(!epic.has_label("blocked:human"));
    assert!(ctx.worktrees.exists("proj0", "p0-1"));
}
