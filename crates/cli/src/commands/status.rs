// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs status` - print the persisted dispatcher state.

use crate::exit_error::ExitError;
use whs_core::WhsConfig;
use whs_engine::{DispatcherLock, StateStore};

pub fn status(config: WhsConfig) -> Result<(), ExitError> {
    let store = StateStore::for_orchestrator(&config.orchestrator_path);
    let state = store
        .load()
        .map_err(|e| ExitError::new(1, format!("cannot read state: {e}")))?;

    match DispatcherLock::read(&store.lock_path()) {
        Some(info) if !DispatcherLock::is_stale(&info) => {
            println!("dispatcher: running (pid {})", info.pid);
        }
        Some(_) => println!("dispatcher: not running (stale lock)"),
        None => println!("dispatcher: not running"),
    }
    println!("paused: {}", state.paused);

    println!("active work: {}", state.active_work.len());
    let mut work: Vec<_> = state.active_work.values().collect();
    work.sort_by_key(|w| w.started_at_ms);
    for entry in work {
        println!(
            "  {} [{}] {} — {} (${:.2})",
            entry.work_item_id, entry.project, entry.agent, entry.work_item_title, entry.cost_usd
        );
    }

    println!("pending questions: {}", state.pending_questions.len());
    let mut questions: Vec<_> = state.pending_questions.values().collect();
    questions.sort_by_key(|q| q.asked_at_ms);
    for question in questions {
        let prompt =
            question.questions.first().map(|q| q.prompt.as_str()).unwrap_or("(no prompt)");
        println!("  {} [{}] {}", question.question_id, question.work_item_id, prompt);
    }

    if !state.answered_questions.is_empty() {
        println!("answers awaiting pickup: {}", state.answered_questions.len());
    }
    Ok(())
}
