// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending questions and answer-driven resumes.

use super::*;
use whs_adapters::{NotifyCall, PendingAsk};
use whs_core::{IssueId, QuestionData, QuestionItem, SessionId};

fn ask() -> PendingAsk {
    PendingAsk {
        context: "Choosing an auth strategy".to_string(),
        questions: vec![QuestionItem {
            prompt: "JWT or PASETO?".to_string(),
            header: Some("Auth".to_string()),
            options: vec!["JWT".to_string(), "PASETO".to_string()],
            multi_select: false,
        }],
    }
}

/// Drive a seeded task into the awaiting-answer state; returns the
/// question id.
async fn run_until_question(ctx: &TestContext) -> IssueId {
    ctx.seed_task(0, "Add auth", 1).await;
    ctx.runner.push_question(ask());
    ctx.tick_and_settle().await;

    let state = ctx.dispatcher.state_snapshot();
    assert_eq!(state.pending_questions.len(), 1);
    state.pending_questions.keys().next().unwrap().clone()
}

#[tokio::test]
async fn pending_question_blocks_step_and_frees_slot() {
    let ctx = setup().await;
    let question_id = run_until_question(&ctx).await;

    let question = ctx.issue(question_id.as_str());
    assert!(question.has_label("whs:question"));
    let epic = &ctx.epics()[0];
    let step_id = format!("{}.1", epic.id);
    assert_eq!(question.parent, Some(IssueId::from_string(&step_id)));

    // Metadata block carries the session and worktree
    let data = QuestionData::from_description(&question.description).unwrap();
    assert_eq!(data.session_id, SessionId::from_string("sess-fake-1"));
    assert_eq!(data.step_id, IssueId::from_string(&step_id));
    assert_eq!(data.epic_id, epic.id);
    assert_eq!(data.project, "proj0");
    assert!(data.worktree.ends_with("p0-1"));
    assert_eq!(data.questions[0].prompt, "JWT or PASETO?");

    // Step blocked on the question; slot freed
    let step = ctx.issue(&step_id);
    assert_eq!(step.blocker_ids(), vec![question_id.clone()]);
    let state = ctx.dispatcher.state_snapshot();
    assert!(state.active_work.is_empty());
    assert_eq!(state.pending_questions[&question_id].session_id, SessionId::from_string("sess-fake-1"));

    assert!(ctx.notifier.calls().iter().any(|c| matches!(
        c,
        NotifyCall::Question { question_id: q } if *q == question_id.to_string()
    )));

    // Nothing is ready while the question is open
    let before = ctx.runner.requests().len();
    ctx.tick_and_settle().await;
    assert_eq!(ctx.runner.requests().len(), before);
}

/// Simulate the `whs answer` command: tracker updated, state file
/// rewritten by another process.
async fn answer_externally(ctx: &TestContext, question_id: &IssueId, answer: &str) {
    ctx.store.answer_question(question_id, answer, ctx.orc()).await.unwrap();

    let store = ctx.state_store();
    let disk = store.load().unwrap();
    let disk = disk.with_question_answered(question_id, answer, 999);
    store.save(&disk).unwrap();
}

#[tokio::test]
async fn answer_resumes_the_session() {
    let ctx = setup().await;
    let question_id = run_until_question(&ctx).await;
    answer_externally(&ctx, &question_id, "Use JWT").await;

    ctx.runner.push_output(handoff_output("DONE", "implemented with JWT", None, None));
    ctx.tick_and_settle().await;

    // The resume reused the question's session with the answer as prompt
    let requests = ctx.runner.requests();
    let resume = &requests[1];
    assert_eq!(resume.prompt, "Use JWT");
    assert_eq!(resume.resume, Some(SessionId::from_string("sess-fake-1")));

    // Workflow progressed to completion; answer queue drained
    let state = ctx.dispatcher.state_snapshot();
    assert!(state.answered_questions.is_empty());
    assert!(state.pending_questions.is_empty());
    assert!(state.active_work.is_empty());
    let epic = &ctx.epics()[0];
    assert_eq!(epic.status, IssueStatus::Closed);
    assert!(!epic.has_label("blocked:human"));

    // The question issue itself was closed by the answer
    let question = ctx.issue(question_id.as_str());
    assert_eq!(question.status, IssueStatus::Closed);
}

#[tokio::test]
async fn follow_up_question_creates_a_second_question_issue() {
    let ctx = setup().await;
    let first_question = run_until_question(&ctx).await;
    answer_externally(&ctx, &first_question, "JWT").await;

    // The resumed agent asks again
    ctx.runner.push_question(PendingAsk {
        context: "One more thing".to_string(),
        questions: vec![QuestionItem {
            prompt: "Access token lifetime?".to_string(),
            header: None,
            options: vec![],
            multi_select: false,
        }],
    });
    ctx.tick_and_settle().await;

    let state = ctx.dispatcher.state_snapshot();
    assert_eq!(state.pending_questions.len(), 1);
    let second = state.pending_questions.keys().next().unwrap();
    assert_ne!(*second, first_question);

    // Same session carries across the whole exchange
    assert_eq!(
        state.pending_questions[second].session_id,
        SessionId::from_string("sess-fake-1")
    );

    // The step is blocked again and the epic still open
    let epic = &ctx.epics()[0];
    assert_ne!(ctx.issue(epic.id.as_str()).status, IssueStatus::Closed);
}

#[tokio::test]
async fn step_marked_in_progress_before_resume() {
    let ctx = setup().await;
    let question_id = run_until_question(&ctx).await;
    let epic = &ctx.epics()[0];
    let step_id = format!("{}.1", epic.id);

    answer_externally(&ctx, &question_id, "JWT").await;
    ctx.runner.push_output(handoff_output("DONE", "ok", None, None));
    ctx.tick_and_settle().await;

    // The step went through in_progress and closed with the handoff
    let step = ctx.issue(&step_id);
    assert_eq!(step.status, IssueStatus::Closed);
}
