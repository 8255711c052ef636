// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One scheduler tick: answered questions, ready steps, new work, daemon
//! health. Every pass logs and continues on failure; a tick never aborts.

use super::Dispatcher;
use crate::workflow::WorkflowEngine;
use std::sync::atomic::Ordering;
use whs_adapters::{AgentRunner, IssueStore, Notifier, WorktreeProvider};
use whs_core::{ActiveWork, AgentRole, Clock, Issue, IssueId, SessionId};

impl<S, W, R, N, C> Dispatcher<S, W, R, N, C>
where
    S: IssueStore,
    W: WorktreeProvider,
    R: AgentRunner,
    N: Notifier,
    C: Clock,
{
    /// Run one tick. Public so tests can step the scheduler directly.
    pub async fn tick(&self) {
        self.prune_finished();
        self.merge_external_answers();

        let paused = self.is_paused();
        if !paused {
            self.process_answered_questions().await;
        }

        if !self.is_shutting_down() && !paused {
            self.dispatch_ready_steps().await;
            self.start_new_work().await;
        }

        let tick = self.inner.ticks.fetch_add(1, Ordering::SeqCst);
        if tick % self.inner.config.daemon_check_ticks == 0 {
            self.check_daemons().await;
        }
    }

    /// Adopt answered-question records another process wrote to disk.
    fn merge_external_answers(&self) {
        let disk = match self.inner.state_store.load() {
            Ok(disk) => disk,
            Err(e) => {
                tracing::warn!(error = %e, "could not re-read state file");
                return;
            }
        };
        if disk.answered_questions.is_empty() {
            return;
        }
        let now = self.clock_ms();
        self.update_state(|s| s.merged_answers_from(&disk, now));
    }

    /// Tick pass 1: resume sessions for answered questions, FIFO.
    async fn process_answered_questions(&self) {
        for answered in self.state_snapshot().answered_in_order() {
            let question_id = answered.question.question_id.clone();
            if let Err(e) = self.process_answered_question(answered).await {
                tracing::error!(question = %question_id, error = %e, "failed to process answer");
            }
            let now = self.clock_ms();
            self.update_state(|s| s.without_answered_question(&question_id, now));
        }
    }

    async fn process_answered_question(
        &self,
        answered: whs_core::AnsweredQuestion,
    ) -> Result<(), crate::error::EngineError> {
        let pending = &answered.question;
        tracing::info!(
            question = %pending.question_id,
            work = %pending.work_item_id,
            "resuming session with answer"
        );

        // Guard against the dispatcher re-picking the step mid-resume.
        self.engine().mark_step_in_progress(&pending.step_id).await?;

        let step = self.engine().store().show(&pending.step_id, self.engine().orchestrator()).await?;
        let epic = match &step.parent {
            Some(epic_id) => {
                self.engine().store().show(epic_id, self.engine().orchestrator()).await?
            }
            None => return Err(crate::error::EngineError::NotAWorkflowIssue(step.id.clone())),
        };

        let work = ActiveWork {
            work_item_id: pending.work_item_id.clone(),
            work_item_title: title_from_epic(&epic),
            project: pending.project.clone(),
            epic_id: epic.id.clone(),
            step_id: pending.step_id.clone(),
            agent: agent_of(&step),
            session_id: pending.session_id.clone(),
            worktree: pending.worktree.clone(),
            cost_usd: 0.0,
            started_at_ms: self.clock_ms(),
        };
        let now = self.clock_ms();
        self.update_state(|s| s.with_work_added(work.clone(), now));
        self.resume_with_answer(work, &answered.answer).await;
        Ok(())
    }

    /// Tick pass 3: launch ready workflow steps within capacity.
    async fn dispatch_ready_steps(&self) {
        let steps = match self.engine().get_ready_workflow_steps().await {
            Ok(steps) => steps,
            Err(e) => {
                tracing::error!(error = %e, "could not list ready steps");
                return;
            }
        };

        for step in steps {
            let (project, source_id) = match self.engine().get_source_bead_info(&step.id).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(step = %step.id, error = %e, "step without workflow ancestry");
                    continue;
                }
            };

            if self.launch_running(&source_id) {
                continue;
            }

            let state = self.state_snapshot();
            if let Some(existing) = state.active_work.get(&source_id) {
                // Active record with no live launch: a restart or
                // rate-limit recovery. Relaunch with the recorded session.
                if existing.step_id == step.id {
                    tracing::info!(work = %source_id, step = %step.id, "relaunching active step");
                    self.spawn_launch(existing.clone());
                }
                continue;
            }

            let concurrency = self.inner.config.whs.concurrency;
            if state.at_total_capacity(concurrency.max_total)
                || state.at_project_capacity(&project, concurrency.max_per_project)
            {
                continue;
            }

            if let Err(e) = self.dispatch_step(project, source_id, &step).await {
                tracing::error!(step = %step.id, error = %e, "failed to dispatch step");
            }
        }
    }

    async fn dispatch_step(
        &self,
        project: String,
        source_id: IssueId,
        step: &Issue,
    ) -> Result<(), crate::error::EngineError> {
        let Some(epic_id) = step.parent.clone() else {
            return Err(crate::error::EngineError::NotAWorkflowIssue(step.id.clone()));
        };
        let epic = self.engine().store().show(&epic_id, self.engine().orchestrator()).await?;

        self.engine().mark_step_in_progress(&step.id).await?;

        let work = ActiveWork {
            work_item_id: source_id,
            work_item_title: title_from_epic(&epic),
            project,
            epic_id,
            step_id: step.id.clone(),
            agent: agent_of(step),
            session_id: SessionId::empty(),
            worktree: std::path::PathBuf::new(),
            cost_usd: 0.0,
            started_at_ms: self.clock_ms(),
        };
        let now = self.clock_ms();
        self.update_state(|s| s.with_work_added(work.clone(), now));
        self.spawn_launch(work);
        Ok(())
    }

    /// Tick pass 4: pick the highest-priority untracked ready issue across
    /// all projects and start its workflow.
    async fn start_new_work(&self) {
        let state = self.state_snapshot();
        let concurrency = self.inner.config.whs.concurrency;
        if state.at_total_capacity(concurrency.max_total) {
            return;
        }

        let mut best: Option<(String, Issue)> = None;
        for project in &self.inner.config.whs.projects {
            if state.at_project_capacity(&project.name, concurrency.max_per_project) {
                continue;
            }
            let ready = match self.inner.deps.store.ready(&project.repo_path).await {
                Ok(ready) => ready,
                Err(e) => {
                    tracing::warn!(project = %project.name, error = %e, "ready query failed");
                    continue;
                }
            };

            for issue in ready {
                if state.has_work(&issue.id) {
                    continue;
                }
                match self.engine().get_workflow_for_source(&project.name, &issue.id).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(source = %issue.id, error = %e, "workflow lookup failed");
                        continue;
                    }
                }
                // `ready` is priority-ordered, so the first eligible issue
                // is the project's best candidate.
                let better = match &best {
                    Some((_, current)) => issue.priority < current.priority,
                    None => true,
                };
                if better {
                    best = Some((project.name.clone(), issue));
                }
                break;
            }
        }

        if let Some((project, issue)) = best {
            if let Err(e) = self.start_work_item(&project, &issue).await {
                tracing::error!(source = %issue.id, error = %e, "failed to start workflow");
            }
        }
    }

    async fn start_work_item(
        &self,
        project: &str,
        issue: &Issue,
    ) -> Result<(), crate::error::EngineError> {
        let first_agent = WorkflowEngine::<S>::get_first_agent(issue);
        let (epic_id, step_id) = self.engine().start_workflow(project, issue, first_agent).await?;
        self.engine().mark_step_in_progress(&step_id).await?;

        let work = ActiveWork {
            work_item_id: issue.id.clone(),
            work_item_title: issue.title.clone(),
            project: project.to_string(),
            epic_id,
            step_id,
            agent: first_agent,
            session_id: SessionId::empty(),
            worktree: std::path::PathBuf::new(),
            cost_usd: 0.0,
            started_at_ms: self.clock_ms(),
        };
        let now = self.clock_ms();
        self.update_state(|s| s.with_work_added(work.clone(), now));
        self.spawn_launch(work);
        Ok(())
    }

    /// Tick pass 5: keep tracker daemons alive.
    async fn check_daemons(&self) {
        let sync_branch = self.inner.config.sync_branch.clone();
        let orchestrator = self.inner.config.whs.orchestrator_path.clone();
        if let Err(e) =
            self.inner.deps.store.ensure_daemon_with_sync_branch(&orchestrator, &sync_branch).await
        {
            tracing::warn!(error = %e, "orchestrator tracker daemon check failed");
        }
        for project in &self.inner.config.whs.projects {
            if let Err(e) = self
                .inner
                .deps
                .store
                .ensure_daemon_with_sync_branch(&project.repo_path, &sync_branch)
                .await
            {
                tracing::warn!(project = %project.name, error = %e, "tracker daemon check failed");
            }
        }
    }
}

/// `"<project>:<source> - <title>"` → `<title>`; the whole title when the
/// epic was written by hand.
fn title_from_epic(epic: &Issue) -> String {
    epic.title.split_once(" - ").map(|(_, t)| t.to_string()).unwrap_or_else(|| epic.title.clone())
}

/// Agent role of a step, from its `agent:` label with the title as
/// fallback.
fn agent_of(step: &Issue) -> AgentRole {
    step.label_value("agent")
        .and_then(|v| v.parse().ok())
        .or_else(|| step.title.parse().ok())
        .unwrap_or(AgentRole::Implementation)
}
