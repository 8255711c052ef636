// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::work::ActiveWork;
use std::path::PathBuf;

fn work(id: &str, project: &str) -> ActiveWork {
    ActiveWork::builder().work_item_id(id).project(project).build()
}

fn pending(id: &str) -> PendingQuestion {
    PendingQuestion {
        question_id: IssueId::from_string(id),
        work_item_id: IssueId::from_string("bd-123"),
        project: "api".to_string(),
        epic_id: IssueId::from_string("orc-1"),
        step_id: IssueId::from_string("orc-1.1"),
        session_id: SessionId::from_string("sess-1"),
        worktree: PathBuf::from("/w"),
        context: String::new(),
        questions: vec![],
        asked_at_ms: 1,
    }
}

#[test]
fn add_and_remove_work() {
    let state = DispatcherState::default().with_work_added(work("bd-1", "api"), 10);
    assert!(state.has_work(&IssueId::from_string("bd-1")));
    assert_eq!(state.active_count(), 1);
    assert_eq!(state.last_updated_ms, 10);

    let state = state.with_work_removed(&IssueId::from_string("bd-1"), 20);
    assert!(!state.has_work(&IssueId::from_string("bd-1")));
    assert_eq!(state.last_updated_ms, 20);
}

#[test]
fn work_progress_updates_session_and_cost() {
    let state = DispatcherState::default().with_work_added(work("bd-1", "api"), 1);
    let state = state.with_work_progress(
        &IssueId::from_string("bd-1"),
        SessionId::from_string("sess-9"),
        0.25,
        2,
    );
    let state =
        state.with_work_progress(&IssueId::from_string("bd-1"), SessionId::from_string("sess-9"), 0.5, 3);

    let w = &state.active_work[&IssueId::from_string("bd-1")];
    assert_eq!(w.session_id, SessionId::from_string("sess-9"));
    assert!((w.cost_usd - 0.75).abs() < f64::EPSILON);
}

#[test]
fn capacity_checks() {
    let state = DispatcherState::default()
        .with_work_added(work("bd-1", "api"), 1)
        .with_work_added(work("bd-2", "api"), 2)
        .with_work_added(work("bd-3", "web"), 3);

    assert_eq!(state.active_for_project("api"), 2);
    assert_eq!(state.active_for_project("web"), 1);
    assert!(state.at_total_capacity(3));
    assert!(!state.at_total_capacity(4));
    assert!(state.at_project_capacity("api", 2));
    assert!(!state.at_project_capacity("web", 2));
}

#[test]
fn question_lifecycle() {
    let state = DispatcherState::default().with_question_pending(pending("orc-1.2"), 5);
    assert_eq!(state.pending_questions.len(), 1);

    let state = state.with_question_answered(&IssueId::from_string("orc-1.2"), "Use JWT", 6);
    assert!(state.pending_questions.is_empty());
    assert_eq!(state.answered_questions.len(), 1);
    assert_eq!(state.answered_questions[&IssueId::from_string("orc-1.2")].answer, "Use JWT");

    let state = state.without_answered_question(&IssueId::from_string("orc-1.2"), 7);
    assert!(state.answered_questions.is_empty());
}

#[test]
fn answering_unknown_question_is_a_no_op() {
    let state =
        DispatcherState::default().with_question_answered(&IssueId::from_string("orc-9"), "x", 6);
    assert!(state.pending_questions.is_empty());
    assert!(state.answered_questions.is_empty());
}

#[test]
fn answered_in_order_is_fifo_by_answer_time() {
    let state = DispatcherState::default()
        .with_question_pending(pending("orc-1.2"), 1)
        .with_question_pending(pending("orc-1.3"), 2)
        .with_question_answered(&IssueId::from_string("orc-1.3"), "second", 10)
        .with_question_answered(&IssueId::from_string("orc-1.2"), "first", 5);

    let order: Vec<_> =
        state.answered_in_order().into_iter().map(|a| a.question.question_id).collect();
    assert_eq!(order, vec![IssueId::from_string("orc-1.2"), IssueId::from_string("orc-1.3")]);
}

#[test]
fn merged_answers_from_adopts_external_answers() {
    let mem = DispatcherState::default().with_question_pending(pending("orc-1.2"), 1);

    // Another process answered the question and rewrote the disk state.
    let disk = mem.clone().with_question_answered(&IssueId::from_string("orc-1.2"), "yes", 2);

    let merged = mem.merged_answers_from(&disk, 3);
    assert!(merged.pending_questions.is_empty());
    assert_eq!(merged.answered_questions[&IssueId::from_string("orc-1.2")].answer, "yes");
    assert_eq!(merged.last_updated_ms, 3);
}

#[test]
fn merged_answers_from_keeps_memory_on_conflict() {
    let base = DispatcherState::default().with_question_pending(pending("orc-1.2"), 1);
    let mem = base.clone().with_question_answered(&IssueId::from_string("orc-1.2"), "memory", 2);
    let disk = base.with_question_answered(&IssueId::from_string("orc-1.2"), "disk", 2);

    let merged = mem.merged_answers_from(&disk, 3);
    assert_eq!(merged.answered_questions[&IssueId::from_string("orc-1.2")].answer, "memory");
    // Nothing changed, timestamp untouched
    assert_eq!(merged.last_updated_ms, 2);
}

#[test]
fn paused_flag() {
    let state = DispatcherState::default().with_paused(true, 4);
    assert!(state.paused);
    let state = state.with_paused(false, 5);
    assert!(!state.paused);
}

#[test]
fn state_serde_round_trip() {
    let state = DispatcherState::default()
        .with_paused(true, 1)
        .with_work_added(work("bd-1", "api"), 2)
        .with_question_pending(pending("orc-1.2"), 3);

    let json = serde_json::to_string(&state).unwrap();
    let parsed: DispatcherState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, state);
}
