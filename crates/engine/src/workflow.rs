// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-work-item workflow state machine, persisted as issues in the
//! orchestrator tracker.
//!
//! One epic mirrors one source issue; ordered step children carry the
//! agent chain (step N+1 depends on step N, so at most one step per epic
//! is ever ready); question children block their step until answered.

use crate::error::EngineError;
use std::path::{Path, PathBuf};
use whs_adapters::{CreateIssue, IssueStore, ListFilter, UpdateIssue};
use whs_core::{
    labels, ActiveWork, AgentRole, CiStatus, Issue, IssueId, IssueStatus, IssueType,
    PendingQuestion, QuestionData, QuestionItem, SessionId,
};

/// Terminal outcome of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Done,
    Blocked,
}

whs_core::simple_display! {
    WorkflowOutcome {
        Done => "done",
        Blocked => "blocked",
    }
}

/// Orchestrator-tracker operations for workflow epics, steps, and
/// questions.
#[derive(Clone)]
pub struct WorkflowEngine<S> {
    store: S,
    orchestrator: PathBuf,
}

impl<S: IssueStore> WorkflowEngine<S> {
    pub fn new(store: S, orchestrator: impl Into<PathBuf>) -> Self {
        Self { store, orchestrator: orchestrator.into() }
    }

    pub fn orchestrator(&self) -> &Path {
        &self.orchestrator
    }

    /// Create the epic and its first step for a source issue.
    ///
    /// Two sequential writes; a crash between them leaves an epic with no
    /// step, which [`get_workflow_for_source`](Self::get_workflow_for_source)
    /// still finds on the next tick, so the source is never picked twice.
    pub async fn start_workflow(
        &self,
        project: &str,
        work_item: &Issue,
        first_agent: AgentRole,
    ) -> Result<(IssueId, IssueId), EngineError> {
        let epic = self
            .store
            .create(
                &self.orchestrator,
                CreateIssue::new(
                    format!("{project}:{} - {}", work_item.id, work_item.title),
                    IssueType::Epic,
                )
                .priority(work_item.priority)
                .labels(vec![
                    labels::project(project),
                    labels::source(&work_item.id),
                    labels::WORKFLOW.to_string(),
                ]),
            )
            .await?;

        let step =
            self.create_step(&epic.id, first_agent, String::new(), None, None, None).await?;
        tracing::info!(epic = %epic.id, step = %step, %first_agent, "workflow started");
        Ok((epic.id, step))
    }

    /// Append a step to the chain, depending on the latest existing step.
    pub async fn create_next_step(
        &self,
        epic_id: &IssueId,
        agent: AgentRole,
        context: &str,
        pr_number: Option<u64>,
        ci_status: Option<CiStatus>,
    ) -> Result<IssueId, EngineError> {
        let previous = self.latest_step(epic_id).await?.map(|s| s.id);
        self.create_step(epic_id, agent, context.to_string(), pr_number, ci_status, previous)
            .await
    }

    async fn create_step(
        &self,
        epic_id: &IssueId,
        agent: AgentRole,
        context: String,
        pr_number: Option<u64>,
        ci_status: Option<CiStatus>,
        depends_on: Option<IssueId>,
    ) -> Result<IssueId, EngineError> {
        let mut step_labels = vec![labels::STEP.to_string(), labels::agent(agent)];
        if let Some(n) = pr_number {
            step_labels.push(labels::pr(n));
        }
        if let Some(ci) = ci_status {
            step_labels.push(labels::ci(ci));
        }

        let step = self
            .store
            .create(
                &self.orchestrator,
                CreateIssue::new(agent.to_string(), IssueType::Task)
                    .description(context)
                    .parent(epic_id.clone())
                    .labels(step_labels),
            )
            .await?;

        if let Some(previous) = depends_on {
            self.store.dep_add(&step.id, &previous, &self.orchestrator).await?;
        }
        Ok(step.id)
    }

    pub async fn complete_step(
        &self,
        step_id: &IssueId,
        reason: &str,
    ) -> Result<(), EngineError> {
        self.store.close(step_id, reason, &self.orchestrator).await?;
        Ok(())
    }

    /// Idempotent: a step that is already in progress stays untouched.
    ///
    /// Called at dispatch and when a human answers a question, so the
    /// dispatcher cannot re-pick the step in between.
    pub async fn mark_step_in_progress(&self, step_id: &IssueId) -> Result<(), EngineError> {
        let step = self.store.show(step_id, &self.orchestrator).await?;
        if step.status == IssueStatus::InProgress {
            return Ok(());
        }
        self.store
            .update(
                step_id,
                &self.orchestrator,
                UpdateIssue::default().status(IssueStatus::InProgress),
            )
            .await?;
        Ok(())
    }

    /// Close the epic. The blocked path labels it for human attention and
    /// records the reason as a `Blocked:` comment.
    pub async fn complete_workflow(
        &self,
        epic_id: &IssueId,
        outcome: WorkflowOutcome,
        reason: &str,
    ) -> Result<(), EngineError> {
        if outcome == WorkflowOutcome::Blocked {
            self.store
                .update(
                    epic_id,
                    &self.orchestrator,
                    UpdateIssue::default()
                        .add_labels(vec![labels::BLOCKED_HUMAN.to_string()]),
                )
                .await?;
            self.store
                .comment(epic_id, &format!("Blocked: {reason}"), &self.orchestrator)
                .await?;
        }
        self.store.close(epic_id, reason, &self.orchestrator).await?;
        tracing::info!(epic = %epic_id, %outcome, "workflow complete");
        Ok(())
    }

    /// Ready issues in the orchestrator carrying the step marker.
    pub async fn get_ready_workflow_steps(&self) -> Result<Vec<Issue>, EngineError> {
        let ready = self.store.ready(&self.orchestrator).await?;
        Ok(ready.into_iter().filter(|i| i.has_label(labels::STEP)).collect())
    }

    /// The workflow epic for a source issue, in any status.
    ///
    /// Epics carrying `whs:workflow` are preferred; a bare `source:` match
    /// is accepted for records written before the marker existed.
    pub async fn get_workflow_for_source(
        &self,
        project: &str,
        source_id: &IssueId,
    ) -> Result<Option<Issue>, EngineError> {
        let filter = ListFilter::default()
            .issue_type(IssueType::Epic)
            .labels_all(vec![labels::project(project), labels::source(source_id)]);
        let mut epics = self.store.list(&self.orchestrator, &filter).await?;
        if epics.is_empty() {
            return Ok(None);
        }
        if let Some(index) = epics.iter().position(|e| e.has_label(labels::WORKFLOW)) {
            return Ok(Some(epics.swap_remove(index)));
        }
        Ok(Some(epics.swap_remove(0)))
    }

    /// Recover `(project, source id)` from a workflow issue or any of its
    /// ancestors.
    pub async fn get_source_bead_info(
        &self,
        id: &IssueId,
    ) -> Result<(String, IssueId), EngineError> {
        let mut current = self.store.show(id, &self.orchestrator).await?;
        loop {
            if let (Some(project), Some(source)) =
                (current.label_value("project"), current.label_value("source"))
            {
                return Ok((project.to_string(), IssueId::from_string(source)));
            }
            match &current.parent {
                Some(parent) => {
                    current = self.store.show(parent, &self.orchestrator).await?;
                }
                None => return Err(EngineError::NotAWorkflowIssue(id.clone())),
            }
        }
    }

    /// Accumulated context for a step: each prior step's close-comment,
    /// newest last, headed by the agent name.
    pub async fn get_workflow_context(&self, step_id: &IssueId) -> Result<String, EngineError> {
        let step = self.store.show(step_id, &self.orchestrator).await?;
        let Some(epic_id) = step.parent.clone() else {
            return Ok(String::new());
        };

        let mut sections = Vec::new();
        for sibling in self.steps_of(&epic_id).await? {
            if sibling.id == *step_id || sibling.status != IssueStatus::Closed {
                continue;
            }
            let comments = self.store.list_comments(&sibling.id, &self.orchestrator).await?;
            if let Some(last) = comments.last() {
                let text = last.text.strip_prefix("Closed: ").unwrap_or(&last.text);
                sections.push(format!("## {}\n{}", sibling.title, text));
            }
        }
        Ok(sections.join("\n\n"))
    }

    /// Policy: planning-needed epics start with the planner, everything
    /// else goes straight to implementation.
    pub fn get_first_agent(work_item: &Issue) -> AgentRole {
        if work_item.issue_type == IssueType::Epic {
            AgentRole::Planner
        } else {
            AgentRole::Implementation
        }
    }

    /// Workflow epics carrying any `errored:*` label.
    pub async fn get_errored_workflows(&self) -> Result<Vec<Issue>, EngineError> {
        let filter = ListFilter::default()
            .issue_type(IssueType::Epic)
            .labels_all(vec![labels::WORKFLOW.to_string()]);
        let epics = self.store.list(&self.orchestrator, &filter).await?;
        Ok(epics
            .into_iter()
            .filter(|e| e.labels.iter().any(|l| l.starts_with("errored:")))
            .collect())
    }

    /// Steps labeled `pr:<n>` whose CI is still pending.
    pub async fn get_steps_pending_ci(&self) -> Result<Vec<Issue>, EngineError> {
        let filter = ListFilter::default().labels_all(vec![
            labels::STEP.to_string(),
            labels::ci(CiStatus::Pending),
        ]);
        let steps = self.store.list(&self.orchestrator, &filter).await?;
        Ok(steps.into_iter().filter(|s| s.label_value("pr").is_some()).collect())
    }

    /// Create the question issue for an agent ask and block the step on
    /// it. Returns the pending record to persist.
    pub async fn ask_question(
        &self,
        work: &ActiveWork,
        session_id: &SessionId,
        context: &str,
        questions: Vec<QuestionItem>,
        asked_at_ms: u64,
    ) -> Result<PendingQuestion, EngineError> {
        let data = QuestionData {
            project: work.project.clone(),
            epic_id: work.epic_id.clone(),
            step_id: work.step_id.clone(),
            session_id: session_id.clone(),
            worktree: work.worktree.clone(),
            context: context.to_string(),
            questions: questions.clone(),
            asked_at_ms,
        };
        let title = format!("Question: {} ({})", work.work_item_title, work.agent);
        let question =
            self.store.create_question(&title, &self.orchestrator, &data, &work.step_id).await?;

        Ok(PendingQuestion {
            question_id: question.id,
            work_item_id: work.work_item_id.clone(),
            project: work.project.clone(),
            epic_id: work.epic_id.clone(),
            step_id: work.step_id.clone(),
            session_id: session_id.clone(),
            worktree: work.worktree.clone(),
            context: context.to_string(),
            questions,
            asked_at_ms,
        })
    }

    /// Step children of an epic in chain order.
    pub async fn steps_of(&self, epic_id: &IssueId) -> Result<Vec<Issue>, EngineError> {
        let filter = ListFilter::default()
            .parent(epic_id.clone())
            .labels_all(vec![labels::STEP.to_string()]);
        let mut steps = self.store.list(&self.orchestrator, &filter).await?;
        steps.sort_by_key(|s| step_ordinal(&s.id));
        Ok(steps)
    }

    async fn latest_step(&self, epic_id: &IssueId) -> Result<Option<Issue>, EngineError> {
        Ok(self.steps_of(epic_id).await?.pop())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Ordinal of a child id: `orc-37.4` → 4. Ids without a numeric suffix
/// sort first.
fn step_ordinal(id: &IssueId) -> u64 {
    id.as_str().rsplit('.').next().and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
