// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One launch: run the step's agent in its worktree, resolve the handoff,
//! and progress the workflow.

use super::prompt::build_step_prompt;
use super::Dispatcher;
use crate::handoff::HandoffResolver;
use crate::workflow::WorkflowOutcome;
use whs_adapters::{
    AgentError, AgentOutcome, AgentRequest, AgentRunner, IssueStore, Notifier, PendingAsk,
    UpdateIssue, WorktreeProvider,
};
use whs_core::{
    labels, ActiveWork, Clock, Handoff, NextAgent, ProjectConfig, StepMetric, WorkflowMetric,
};

impl<S, W, R, N, C> Dispatcher<S, W, R, N, C>
where
    S: IssueStore,
    W: WorktreeProvider,
    R: AgentRunner,
    N: Notifier,
    C: Clock,
{
    fn project_config(&self, name: &str) -> Option<ProjectConfig> {
        self.inner.config.whs.project(name).cloned()
    }

    /// Body of a launch task.
    pub(crate) async fn run_step(&self, mut work: ActiveWork) {
        let Some(project) = self.project_config(&work.project) else {
            self.fail_workflow(&work, &format!("project not configured: {}", work.project))
                .await;
            return;
        };

        match self.inner.deps.worktrees.ensure(&project, &work.work_item_id).await {
            Ok(path) => {
                work.worktree = path;
                let now = self.clock_ms();
                let worktree = work.worktree.clone();
                let id = work.work_item_id.clone();
                self.update_state(move |mut s| {
                    if let Some(entry) = s.active_work.get_mut(&id) {
                        entry.worktree = worktree;
                    }
                    s.last_updated_ms = now;
                    s
                });
            }
            Err(e) => {
                self.fail_workflow(&work, &format!("worktree creation failed: {e}")).await;
                return;
            }
        }

        self.notify_progress(&work, &format!("{} started", work.agent)).await;

        let source =
            self.inner.deps.store.show(&work.work_item_id, &project.repo_path).await.ok();
        let context =
            self.engine().get_workflow_context(&work.step_id).await.unwrap_or_default();
        let prompt = build_step_prompt(&project, source.as_ref(), &work, &context);

        let mut request = AgentRequest::new(prompt, &work.worktree);
        if self.inner.config.safety_enabled {
            request = request.safety_worktree(&work.worktree);
        }
        if !work.session_id.is_empty() {
            request = request.resume(work.session_id.clone());
        }

        match self.inner.deps.runner.run(request).await {
            Ok(outcome) => self.handle_outcome(work, outcome).await,
            Err(e) => self.handle_agent_error(work, e).await,
        }
    }

    /// Resume a question's session with the human answer (tick pass 1,
    /// runs inline).
    pub(crate) async fn resume_with_answer(&self, work: ActiveWork, answer: &str) {
        let mut request = AgentRequest::new("", &work.worktree);
        if self.inner.config.safety_enabled {
            request = request.safety_worktree(&work.worktree);
        }

        match self
            .inner
            .deps
            .runner
            .resume_with_answer(&work.session_id, answer, request)
            .await
        {
            Ok(outcome) => self.handle_outcome(work, outcome).await,
            Err(e) => self.handle_agent_error(work, e).await,
        }
    }

    async fn handle_outcome(&self, mut work: ActiveWork, outcome: AgentOutcome) {
        work.session_id = outcome.session_id.clone();
        work.cost_usd += outcome.cost_usd;
        let now = self.clock_ms();
        self.update_state(|s| {
            s.with_work_progress(&work.work_item_id, outcome.session_id.clone(), outcome.cost_usd, now)
        });

        if let Some(ask) = &outcome.pending_question {
            self.handle_pending_ask(&work, ask, outcome.duration_ms).await;
            return;
        }

        let handoff = HandoffResolver::resolve(
            &work.worktree,
            &outcome.output,
            Some((&self.inner.deps.runner, &outcome.session_id)),
        )
        .await;
        self.progress_workflow(work, handoff, outcome.duration_ms).await;
    }

    /// The agent asked the user: snapshot the session into a question
    /// issue and a pending record, and free the work slot.
    async fn handle_pending_ask(&self, work: &ActiveWork, ask: &PendingAsk, duration_ms: u64) {
        let asked_at = self.clock_ms();
        let pending = match self
            .engine()
            .ask_question(work, &work.session_id, &ask.context, ask.questions.clone(), asked_at)
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                self.fail_workflow(work, &format!("could not record question: {e}")).await;
                return;
            }
        };

        self.update_state(|s| {
            s.with_question_pending(pending.clone(), asked_at)
                .with_work_removed(&work.work_item_id, asked_at)
        });
        self.notify_question(&pending).await;
        self.record_step_metric(work, "question", duration_ms);
        tracing::info!(
            work = %work.work_item_id,
            question = %pending.question_id,
            "awaiting human answer"
        );
    }

    async fn handle_agent_error(&self, work: ActiveWork, error: AgentError) {
        if error.is_rate_limit() {
            // Pause the whole dispatcher; the work record stays so the
            // step is retried after resume.
            self.pause();
            self.notify_rate_limit(&error.to_string()).await;
            self.record_step_metric(&work, "rate_limited", 0);
            return;
        }

        let kind = if error.is_auth() { "error:auth" } else { "error:run" };
        self.record_step_metric(&work, kind, 0);
        self.fail_workflow(&work, &error.to_string()).await;
    }

    /// Close the current step and route on the handoff.
    async fn progress_workflow(&self, work: ActiveWork, handoff: Handoff, duration_ms: u64) {
        if let Err(e) = self.engine().complete_step(&work.step_id, &handoff.context).await {
            tracing::error!(step = %work.step_id, error = %e, "failed to close step");
            let now = self.clock_ms();
            self.update_state(|s| s.with_work_removed(&work.work_item_id, now));
            return;
        }
        self.record_step_metric(&work, &handoff.next_agent.to_string(), duration_ms);

        match handoff.next_agent {
            NextAgent::Role(next) => {
                let created = self
                    .engine()
                    .create_next_step(
                        &work.epic_id,
                        next,
                        &handoff.context,
                        handoff.pr_number,
                        handoff.ci_status,
                    )
                    .await;
                match created {
                    Ok(step_id) => {
                        tracing::info!(epic = %work.epic_id, step = %step_id, agent = %next, "handoff");
                        self.notify_progress(&work, &format!("handed off to {next}")).await;
                    }
                    Err(e) => {
                        tracing::error!(epic = %work.epic_id, error = %e, "failed to create next step");
                        self.notify_error(&work, &format!("failed to create next step: {e}"))
                            .await;
                    }
                }
            }
            NextAgent::Done => self.finish_done(&work, &handoff).await,
            NextAgent::Blocked => {
                if let Err(e) = self
                    .engine()
                    .complete_workflow(&work.epic_id, WorkflowOutcome::Blocked, &handoff.context)
                    .await
                {
                    tracing::error!(epic = %work.epic_id, error = %e, "failed to block workflow");
                }
                // The worktree is left for the human picking this up.
                self.notify_complete(&work, "blocked").await;
                self.record_workflow_metric(&work, "blocked");
            }
        }

        let now = self.clock_ms();
        self.update_state(|s| s.with_work_removed(&work.work_item_id, now));
    }

    async fn finish_done(&self, work: &ActiveWork, handoff: &Handoff) {
        if let Err(e) = self
            .engine()
            .complete_workflow(&work.epic_id, WorkflowOutcome::Done, &handoff.context)
            .await
        {
            tracing::error!(epic = %work.epic_id, error = %e, "failed to close epic");
        }

        // Close the source issue in the project tracker; this is the only
        // mutation whs ever performs there.
        if let Some(project) = self.project_config(&work.project) {
            let reason = format!("Completed by whs workflow {}", work.epic_id);
            if let Err(e) = self
                .inner
                .deps
                .store
                .close(&work.work_item_id, &reason, &project.repo_path)
                .await
            {
                tracing::error!(source = %work.work_item_id, error = %e, "failed to close source issue");
            }

            // Best-effort cleanup; a dirty worktree stays behind.
            if let Err(e) = self
                .inner
                .deps
                .worktrees
                .remove(&project, work.work_item_id.as_str(), false)
                .await
            {
                tracing::warn!(work = %work.work_item_id, error = %e, "worktree removal failed");
            }
        }

        self.notify_complete(work, "done").await;
        self.record_workflow_metric(work, "done");
    }

    /// Terminal failure path: label the epic, close step and epic as
    /// blocked, free the slot.
    pub(crate) async fn fail_workflow(&self, work: &ActiveWork, reason: &str) {
        tracing::error!(work = %work.work_item_id, %reason, "blocking workflow");

        if let Err(e) = self
            .engine()
            .store()
            .update(
                &work.epic_id,
                self.engine().orchestrator(),
                UpdateIssue::default().add_labels(vec![labels::errored("agent")]),
            )
            .await
        {
            tracing::warn!(epic = %work.epic_id, error = %e, "failed to label errored epic");
        }
        if let Err(e) = self.engine().complete_step(&work.step_id, reason).await {
            tracing::warn!(step = %work.step_id, error = %e, "failed to close step");
        }
        if let Err(e) = self
            .engine()
            .complete_workflow(&work.epic_id, WorkflowOutcome::Blocked, reason)
            .await
        {
            tracing::error!(epic = %work.epic_id, error = %e, "failed to block workflow");
        }

        let now = self.clock_ms();
        self.update_state(|s| s.with_work_removed(&work.work_item_id, now));
        self.notify_error(work, reason).await;
    }

    fn record_step_metric(&self, work: &ActiveWork, outcome: &str, duration_ms: u64) {
        self.inner.metrics.record_step(StepMetric {
            project: work.project.clone(),
            source_id: work.work_item_id.clone(),
            epic_id: work.epic_id.clone(),
            step_id: work.step_id.clone(),
            agent: work.agent,
            outcome: outcome.to_string(),
            cost_usd: work.cost_usd,
            duration_ms,
            recorded_at_ms: self.clock_ms(),
        });
    }

    fn record_workflow_metric(&self, work: &ActiveWork, outcome: &str) {
        self.inner.metrics.record_workflow(WorkflowMetric {
            project: work.project.clone(),
            source_id: work.work_item_id.clone(),
            epic_id: work.epic_id.clone(),
            outcome: outcome.to_string(),
            total_cost_usd: work.cost_usd,
            recorded_at_ms: self.clock_ms(),
        });
    }
}
