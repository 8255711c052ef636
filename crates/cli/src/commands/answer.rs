// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs answer` - answer a pending agent question.
//!
//! Three effects, in order: the step is marked in-progress so the
//! dispatcher cannot re-pick it, the question issue is answered and
//! closed in the tracker, and the state file's pending record moves to
//! the answered queue for the dispatcher's next tick.

use crate::exit_error::ExitError;
use whs_adapters::{BeadsCli, IssueStore};
use whs_core::{IssueId, PendingQuestion, QuestionData, SystemClock, WhsConfig};
use whs_core::Clock;
use whs_engine::{StateStore, WorkflowEngine};

pub async fn answer(
    config: WhsConfig,
    question_id: &str,
    answer_text: &str,
) -> Result<(), ExitError> {
    let question_id = IssueId::from_string(question_id);
    let store = BeadsCli::new();
    let engine = WorkflowEngine::new(store.clone(), config.orchestrator_path.clone());
    let orchestrator = config.orchestrator_path.clone();

    let issue = store
        .show(&question_id, &orchestrator)
        .await
        .map_err(|e| ExitError::new(1, format!("cannot load question: {e}")))?;
    let data = QuestionData::from_description(&issue.description)
        .ok_or_else(|| ExitError::new(1, format!("{question_id} is not a whs question")))?;

    engine
        .mark_step_in_progress(&data.step_id)
        .await
        .map_err(|e| ExitError::new(1, format!("cannot mark step in progress: {e}")))?;

    store
        .answer_question(&question_id, answer_text, &orchestrator)
        .await
        .map_err(|e| ExitError::new(1, format!("cannot answer question: {e}")))?;

    let state_store = StateStore::for_orchestrator(&config.orchestrator_path);
    let state = state_store
        .load()
        .map_err(|e| ExitError::new(1, format!("cannot read state: {e}")))?;
    let now = SystemClock.epoch_ms();

    // A dispatcher that crashed before persisting the pending record
    // still gets the answer: rebuild the record from the issue metadata.
    let state = if state.pending_questions.contains_key(&question_id) {
        state
    } else {
        let (project, work_item_id) = engine
            .get_source_bead_info(&data.step_id)
            .await
            .map_err(|e| ExitError::new(1, format!("cannot resolve work item: {e}")))?;
        if project != data.project {
            tracing::warn!(%project, recorded = %data.project, "question metadata project mismatch");
        }
        state.with_question_pending(
            PendingQuestion {
                question_id: question_id.clone(),
                work_item_id,
                project: data.project.clone(),
                epic_id: data.epic_id.clone(),
                step_id: data.step_id.clone(),
                session_id: data.session_id.clone(),
                worktree: data.worktree.clone(),
                context: data.context.clone(),
                questions: data.questions.clone(),
                asked_at_ms: data.asked_at_ms,
            },
            now,
        )
    };

    let state = state.with_question_answered(&question_id, answer_text, now);
    state_store
        .save(&state)
        .map_err(|e| ExitError::new(1, format!("cannot persist answer: {e}")))?;

    println!("answered {question_id}; the dispatcher resumes the session on its next tick");
    Ok(())
}
