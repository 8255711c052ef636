// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-flight health checks. Strictly read-only: the doctor reads the
//! trackers, the worktrees, the VCS host, and the persisted state, and
//! never mutates any of them.

use crate::state::{DispatcherLock, StateStore};
use crate::workflow::WorkflowEngine;
use whs_adapters::{IssueStore, ListFilter, VcsHost, WorktreeProvider};
use whs_core::{labels, IssueStatus, IssueType, WhsConfig};

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

whs_core::simple_display! {
    CheckStatus {
        Pass => "pass",
        Warn => "warn",
        Fail => "fail",
    }
}

/// One named check with its findings.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub details: Vec<String>,
}

impl CheckResult {
    fn pass(name: &str, message: impl Into<String>) -> Self {
        Self { name: name.to_string(), status: CheckStatus::Pass, message: message.into(), details: Vec::new() }
    }

    fn warn(name: &str, message: impl Into<String>, details: Vec<String>) -> Self {
        Self { name: name.to_string(), status: CheckStatus::Warn, message: message.into(), details }
    }

    fn fail(name: &str, message: impl Into<String>, details: Vec<String>) -> Self {
        Self { name: name.to_string(), status: CheckStatus::Fail, message: message.into(), details }
    }
}

/// Aggregated report.
#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    /// True when no check failed (warnings are advisory).
    pub fn ok(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }
}

/// Runs the seven pre-start diagnostics.
pub struct Doctor<S, W, V> {
    store: S,
    worktrees: W,
    vcs: V,
    engine: WorkflowEngine<S>,
    config: WhsConfig,
}

impl<S, W, V> Doctor<S, W, V>
where
    S: IssueStore,
    W: WorktreeProvider,
    V: VcsHost,
{
    pub fn new(store: S, worktrees: W, vcs: V, config: WhsConfig) -> Self {
        let engine = WorkflowEngine::new(store.clone(), config.orchestrator_path.clone());
        Self { store, worktrees, vcs, engine, config }
    }

    pub async fn run(&self) -> DoctorReport {
        DoctorReport {
            checks: vec![
                self.check_daemons().await,
                self.check_daemon_error_files(),
                self.check_errored_workflows().await,
                self.check_blocked_workflows().await,
                self.check_pending_ci().await,
                self.check_orphan_worktrees().await,
                self.check_persisted_state(),
            ],
        }
    }

    /// 1. Tracker daemons alive for the orchestrator and every project.
    async fn check_daemons(&self) -> CheckResult {
        let name = "tracker daemons";
        let mut down = Vec::new();

        let mut targets = vec![("orchestrator".to_string(), self.config.orchestrator_path.clone())];
        for project in &self.config.projects {
            targets.push((project.name.clone(), project.repo_path.clone()));
        }

        for (label, path) in targets {
            match self.store.is_daemon_running(&path).await {
                Ok(true) => {}
                Ok(false) => down.push(format!("{label}: daemon not running")),
                Err(e) => down.push(format!("{label}: {e}")),
            }
        }

        if down.is_empty() {
            CheckResult::pass(name, "all tracker daemons running")
        } else {
            CheckResult::fail(name, format!("{} tracker daemon(s) down", down.len()), down)
        }
    }

    /// 2. Daemon error files absent.
    fn check_daemon_error_files(&self) -> CheckResult {
        let name = "daemon error files";
        let mut found = Vec::new();

        let mut paths = vec![self.config.orchestrator_path.clone()];
        paths.extend(self.config.projects.iter().map(|p| p.repo_path.clone()));
        for path in paths {
            let error_file = path.join(".beads/daemon.err");
            if let Ok(metadata) = error_file.metadata() {
                if metadata.len() > 0 {
                    found.push(error_file.display().to_string());
                }
            }
        }

        if found.is_empty() {
            CheckResult::pass(name, "no daemon error files")
        } else {
            CheckResult::warn(name, format!("{} daemon error file(s)", found.len()), found)
        }
    }

    /// 3. Workflows labeled `errored:*`.
    async fn check_errored_workflows(&self) -> CheckResult {
        let name = "errored workflows";
        match self.engine.get_errored_workflows().await {
            Ok(errored) if errored.is_empty() => {
                CheckResult::pass(name, "no errored workflows")
            }
            Ok(errored) => {
                let details =
                    errored.iter().map(|e| format!("{}: {}", e.id, e.title)).collect();
                CheckResult::warn(name, format!("{} errored workflow(s)", errored.len()), details)
            }
            Err(e) => CheckResult::fail(name, format!("scan failed: {e}"), Vec::new()),
        }
    }

    /// 4. `blocked:human` workflows with their last "Blocked:" comment.
    async fn check_blocked_workflows(&self) -> CheckResult {
        let name = "blocked workflows";
        let filter = ListFilter::default()
            .issue_type(IssueType::Epic)
            .labels_all(vec![labels::BLOCKED_HUMAN.to_string()]);
        let epics = match self.store.list(&self.config.orchestrator_path, &filter).await {
            Ok(epics) => epics,
            Err(e) => return CheckResult::fail(name, format!("scan failed: {e}"), Vec::new()),
        };
        if epics.is_empty() {
            return CheckResult::pass(name, "no workflows awaiting a human");
        }

        let mut details = Vec::new();
        for epic in &epics {
            let reason = self
                .store
                .list_comments(&epic.id, &self.config.orchestrator_path)
                .await
                .ok()
                .and_then(|comments| {
                    comments.into_iter().rev().find(|c| c.text.starts_with("Blocked:"))
                })
                .map(|c| c.text)
                .unwrap_or_else(|| "Blocked: (no reason recorded)".to_string());
            details.push(format!("{}: {} — {}", epic.id, epic.title, reason));
        }
        CheckResult::warn(name, format!("{} workflow(s) await a human", epics.len()), details)
    }

    /// 5. PR/CI state for steps still tagged `ci:pending`.
    async fn check_pending_ci(&self) -> CheckResult {
        let name = "pending ci";
        let steps = match self.engine.get_steps_pending_ci().await {
            Ok(steps) => steps,
            Err(e) => return CheckResult::fail(name, format!("scan failed: {e}"), Vec::new()),
        };
        if steps.is_empty() {
            return CheckResult::pass(name, "no steps waiting on ci");
        }

        let mut details = Vec::new();
        let mut troubled = 0usize;
        for step in &steps {
            let Some(pr) = step.label_value("pr").and_then(|v| v.parse::<u64>().ok()) else {
                continue;
            };
            let repo = match self.engine.get_source_bead_info(&step.id).await {
                Ok((project, _)) => {
                    self.config.project(&project).map(|p| p.repo_path.clone())
                }
                Err(_) => None,
            };
            let Some(repo) = repo else {
                details.push(format!("{}: pr #{pr} (project unknown)", step.id));
                continue;
            };
            let info = self.vcs.pr_status(&repo, pr).await;
            let conflicted = info.mergeable == Some(false);
            let failing = info.ci == whs_adapters::CiState::Failing;
            if conflicted || failing {
                troubled += 1;
            }
            details.push(format!(
                "{}: pr #{pr} {} mergeable={} ci={}",
                step.id,
                info.state,
                info.mergeable.map(|m| m.to_string()).unwrap_or_else(|| "unknown".to_string()),
                info.ci,
            ));
        }

        if troubled > 0 {
            CheckResult::warn(name, format!("{troubled} pr(s) failing or conflicted"), details)
        } else {
            let mut result =
                CheckResult::pass(name, format!("{} step(s) waiting on ci", steps.len()));
            result.details = details;
            result
        }
    }

    /// 6. Worktrees without a live workflow, annotated with PR state.
    async fn check_orphan_worktrees(&self) -> CheckResult {
        let name = "orphan worktrees";
        let mut orphans = Vec::new();

        for project in &self.config.projects {
            let worktrees = match self.worktrees.list(project).await {
                Ok(list) => list,
                Err(e) => {
                    return CheckResult::fail(
                        name,
                        format!("worktree listing failed for {}: {e}", project.name),
                        Vec::new(),
                    )
                }
            };
            let open_prs = self.vcs.open_prs(&project.repo_path).await;

            for worktree in worktrees {
                // Main and the tracker's sync worktree are expected
                if worktree.is_main || worktree.branch.ends_with("-sync") {
                    continue;
                }
                let source_id = whs_core::IssueId::from_string(&worktree.branch);
                let live = match self
                    .engine
                    .get_workflow_for_source(&project.name, &source_id)
                    .await
                {
                    Ok(Some(epic)) => epic.status != IssueStatus::Closed,
                    Ok(None) => false,
                    Err(_) => false,
                };
                if live {
                    continue;
                }

                let pr_note = open_prs
                    .iter()
                    .find(|pr| pr.head_ref.as_deref() == Some(worktree.branch.as_str()))
                    .map(|pr| format!("pr #{} {}", pr.number, pr.state))
                    .unwrap_or_else(|| "no open pr".to_string());
                orphans.push(format!(
                    "{}: {} ({})",
                    project.name,
                    worktree.path.display(),
                    pr_note
                ));
            }
        }

        if orphans.is_empty() {
            CheckResult::pass(name, "no orphan worktrees")
        } else {
            CheckResult::warn(name, format!("{} orphan worktree(s)", orphans.len()), orphans)
        }
    }

    /// 7. Persisted state sanity.
    fn check_persisted_state(&self) -> CheckResult {
        let name = "persisted state";
        let store = StateStore::for_orchestrator(&self.config.orchestrator_path);
        let state = match store.load() {
            Ok(state) => state,
            Err(e) => return CheckResult::fail(name, format!("unreadable: {e}"), Vec::new()),
        };

        let mut notes = Vec::new();
        if state.paused {
            notes.push("dispatcher is paused".to_string());
        }

        if !state.active_work.is_empty() {
            let lock_live = DispatcherLock::read(&store.lock_path())
                .map(|info| !DispatcherLock::is_stale(&info))
                .unwrap_or(false);
            if !lock_live {
                notes.push(format!(
                    "{} active work record(s) with no live dispatcher",
                    state.active_work.len()
                ));
            }
        }

        if notes.is_empty() {
            CheckResult::pass(name, "state file clean")
        } else {
            CheckResult::warn(name, "state needs attention", notes)
        }
    }
}

#[cfg(test)]
#[path = "doctor_tests.rs"]
mod tests;
