// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatcher's persisted state value.
//!
//! There are no in-place mutations: every transition is a pure function
//! consuming the old state and returning the new one. The caller owns
//! persistence (atomic write-temp-then-rename) after each transition.

use crate::id::{IssueId, SessionId};
use crate::question::{AnsweredQuestion, PendingQuestion};
use crate::work::ActiveWork;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Process-wide dispatcher state, one record per orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatcherState {
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub active_work: HashMap<IssueId, ActiveWork>,
    #[serde(default)]
    pub pending_questions: HashMap<IssueId, PendingQuestion>,
    #[serde(default)]
    pub answered_questions: HashMap<IssueId, AnsweredQuestion>,
    #[serde(default)]
    pub last_updated_ms: u64,
}

impl DispatcherState {
    fn touched(mut self, now_ms: u64) -> Self {
        self.last_updated_ms = now_ms;
        self
    }

    pub fn with_paused(mut self, paused: bool, now_ms: u64) -> Self {
        self.paused = paused;
        self.touched(now_ms)
    }

    pub fn with_work_added(mut self, work: ActiveWork, now_ms: u64) -> Self {
        self.active_work.insert(work.work_item_id.clone(), work);
        self.touched(now_ms)
    }

    pub fn with_work_removed(mut self, work_item_id: &IssueId, now_ms: u64) -> Self {
        self.active_work.remove(work_item_id);
        self.touched(now_ms)
    }

    /// Record the session id and accumulated cost reported by an agent run.
    pub fn with_work_progress(
        mut self,
        work_item_id: &IssueId,
        session_id: SessionId,
        cost_usd: f64,
        now_ms: u64,
    ) -> Self {
        if let Some(work) = self.active_work.get_mut(work_item_id) {
            work.session_id = session_id;
            work.cost_usd += cost_usd;
        }
        self.touched(now_ms)
    }

    pub fn with_question_pending(mut self, question: PendingQuestion, now_ms: u64) -> Self {
        self.pending_questions.insert(question.question_id.clone(), question);
        self.touched(now_ms)
    }

    /// Move a pending question into the answered queue.
    ///
    /// No-op when the question id is unknown (already consumed or never
    /// recorded).
    pub fn with_question_answered(
        mut self,
        question_id: &IssueId,
        answer: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        if let Some(pending) = self.pending_questions.remove(question_id) {
            self.answered_questions.insert(
                question_id.clone(),
                AnsweredQuestion {
                    question: pending,
                    answer: answer.into(),
                    answered_at_ms: now_ms,
                },
            );
        }
        self.touched(now_ms)
    }

    pub fn without_answered_question(mut self, question_id: &IssueId, now_ms: u64) -> Self {
        self.answered_questions.remove(question_id);
        self.touched(now_ms)
    }

    /// Adopt answered-question records written by another process (the
    /// `whs answer` command). In-memory entries win on conflict.
    pub fn merged_answers_from(mut self, disk: &DispatcherState, now_ms: u64) -> Self {
        let mut changed = false;
        for (id, answered) in &disk.answered_questions {
            if !self.answered_questions.contains_key(id) {
                self.answered_questions.insert(id.clone(), answered.clone());
                self.pending_questions.remove(id);
                changed = true;
            }
        }
        if changed {
            self.touched(now_ms)
        } else {
            self
        }
    }

    /// Answered questions in FIFO order by answer time.
    pub fn answered_in_order(&self) -> Vec<AnsweredQuestion> {
        let mut answers: Vec<_> = self.answered_questions.values().cloned().collect();
        answers.sort_by_key(|a| a.answered_at_ms);
        answers
    }

    pub fn has_work(&self, work_item_id: &IssueId) -> bool {
        self.active_work.contains_key(work_item_id)
    }

    pub fn active_count(&self) -> usize {
        self.active_work.len()
    }

    pub fn active_for_project(&self, project: &str) -> usize {
        self.active_work.values().filter(|w| w.project == project).count()
    }

    pub fn at_total_capacity(&self, max_total: usize) -> bool {
        self.active_work.len() >= max_total
    }

    pub fn at_project_capacity(&self, project: &str, max_per_project: usize) -> bool {
        self.active_for_project(project) >= max_per_project
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
