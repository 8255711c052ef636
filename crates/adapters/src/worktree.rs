// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree management over the `wt` CLI.
//!
//! One isolated checkout per work item, keyed by a branch named after the
//! source issue id. Worktrees live in a sibling directory:
//! `<repo>-worktrees/<sanitized-branch>/`.

use crate::exec::{self, CommandError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use whs_core::{IssueId, ProjectConfig};

/// Template handed to `wt` via `WORKTRUNK_WORKTREE_PATH`.
const WORKTREE_PATH_TEMPLATE: &str = "{{ repo_path }}-worktrees/{{ branch | sanitize }}";

/// Replace path-hostile characters so a branch name can be a directory name.
pub fn sanitize_branch(branch: &str) -> String {
    branch
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect()
}

/// The sibling-directory path a branch's worktree lives at.
pub fn worktree_path(repo_path: &Path, branch: &str) -> PathBuf {
    let mut dir = repo_path.as_os_str().to_os_string();
    dir.push("-worktrees");
    PathBuf::from(dir).join(sanitize_branch(branch))
}

/// Relationship of a worktree's branch to the main branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainState {
    IsMain,
    Integrated,
    Ahead,
    Behind,
    Diverged,
    Empty,
}

whs_core::simple_display! {
    MainState {
        IsMain => "is_main",
        Integrated => "integrated",
        Ahead => "ahead",
        Behind => "behind",
        Diverged => "diverged",
        Empty => "empty",
    }
}

/// Working-tree dirtiness counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTreeStatus {
    #[serde(default)]
    pub staged: usize,
    #[serde(default)]
    pub modified: usize,
    #[serde(default)]
    pub untracked: usize,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.modified == 0 && self.untracked == 0
    }
}

/// One entry from `wt list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeInfo {
    pub branch: String,
    pub path: PathBuf,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub is_current: bool,
    pub main_state: MainState,
    #[serde(default)]
    pub working_tree: WorkingTreeStatus,
}

impl WorktreeInfo {
    /// Whether this worktree belongs to the given source id, either by
    /// branch name or, when an agent renamed the branch mid-work, by the
    /// directory name still matching.
    pub fn matches_source(&self, source_id: &IssueId) -> bool {
        self.branch == source_id.as_str()
            || self.path.file_name().map(|n| n == source_id.as_str()).unwrap_or(false)
    }
}

/// Isolated checkout per work item.
#[async_trait]
pub trait WorktreeProvider: Clone + Send + Sync + 'static {
    /// Create (or find) the worktree for a source issue. Idempotent.
    async fn ensure(
        &self,
        project: &ProjectConfig,
        source_id: &IssueId,
    ) -> Result<PathBuf, CommandError>;

    /// All worktrees of the project, the main checkout included.
    async fn list(&self, project: &ProjectConfig) -> Result<Vec<WorktreeInfo>, CommandError>;

    /// Remove a worktree. Refuses uncommitted changes unless `force`,
    /// and always refuses the main worktree.
    async fn remove(
        &self,
        project: &ProjectConfig,
        branch: &str,
        force: bool,
    ) -> Result<(), CommandError>;
}

/// Production provider shelling out to `wt`.
#[derive(Clone, Debug)]
pub struct WorktrunkCli {
    program: String,
}

impl Default for WorktrunkCli {
    fn default() -> Self {
        Self { program: "wt".to_string() }
    }
}

impl WorktrunkCli {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(&self, args: &[&str], cwd: &Path) -> Result<String, CommandError> {
        exec::run_with_env(
            &self.program,
            args,
            cwd,
            &[("WORKTRUNK_WORKTREE_PATH", WORKTREE_PATH_TEMPLATE)],
        )
        .await
    }
}

#[async_trait]
impl WorktreeProvider for WorktrunkCli {
    async fn ensure(
        &self,
        project: &ProjectConfig,
        source_id: &IssueId,
    ) -> Result<PathBuf, CommandError> {
        // Reuse an existing worktree for the source id, even when the
        // agent renamed the branch (the directory name still matches).
        let existing = self.list(project).await?;
        if let Some(info) = existing.iter().find(|w| w.matches_source(source_id)) {
            return Ok(info.path.clone());
        }

        let branch = source_id.as_str();
        match self
            .run(
                &["switch", "--create", "--base", &project.base_branch, branch],
                &project.repo_path,
            )
            .await
        {
            Ok(_) => {}
            // Branch exists without a worktree: switch to it instead.
            Err(CommandError::Failed { stderr, .. }) if stderr.contains("exists") => {
                self.run(&["switch", branch], &project.repo_path).await?;
            }
            Err(e) => return Err(e),
        }

        Ok(worktree_path(&project.repo_path, branch))
    }

    async fn list(&self, project: &ProjectConfig) -> Result<Vec<WorktreeInfo>, CommandError> {
        let stdout = self.run(&["list", "--format=json"], &project.repo_path).await?;
        serde_json::from_str(&stdout).map_err(|e| CommandError::InvalidJson {
            command: format!("{} list --format=json", self.program),
            message: e.to_string(),
        })
    }

    async fn remove(
        &self,
        project: &ProjectConfig,
        branch: &str,
        force: bool,
    ) -> Result<(), CommandError> {
        let mut args = vec!["remove"];
        if force {
            args.push("--force");
        }
        args.push(branch);
        self.run(&args, &project.repo_path).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeWorktreeState {
        /// (project, branch) → info
        worktrees: HashMap<(String, String), WorktreeInfo>,
        removed: Vec<(String, String)>,
        fail_removal: bool,
    }

    /// Fake worktree provider for testing.
    #[derive(Clone, Default)]
    pub struct FakeWorktrees {
        inner: Arc<Mutex<FakeWorktreeState>>,
    }

    impl FakeWorktrees {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed the main checkout for a project.
        pub fn seed_main(&self, project: &ProjectConfig) {
            let info = WorktreeInfo {
                branch: project.base_branch.clone(),
                path: project.repo_path.clone(),
                is_main: true,
                is_current: true,
                main_state: MainState::IsMain,
                working_tree: WorkingTreeStatus::default(),
            };
            self.inner
                .lock()
                .worktrees
                .insert((project.name.clone(), project.base_branch.clone()), info);
        }

        pub fn set_dirty(&self, project: &str, branch: &str, modified: usize) {
            if let Some(info) =
                self.inner.lock().worktrees.get_mut(&(project.to_string(), branch.to_string()))
            {
                info.working_tree.modified = modified;
            }
        }

        /// Make every removal fail, to test best-effort cleanup paths.
        pub fn fail_removals(&self) {
            self.inner.lock().fail_removal = true;
        }

        pub fn exists(&self, project: &str, branch: &str) -> bool {
            self.inner
                .lock()
                .worktrees
                .contains_key(&(project.to_string(), branch.to_string()))
        }

        pub fn removed(&self) -> Vec<(String, String)> {
            self.inner.lock().removed.clone()
        }
    }

    #[async_trait]
    impl WorktreeProvider for FakeWorktrees {
        async fn ensure(
            &self,
            project: &ProjectConfig,
            source_id: &IssueId,
        ) -> Result<PathBuf, CommandError> {
            let mut state = self.inner.lock();
            let key = (project.name.clone(), source_id.to_string());
            if let Some(info) = state.worktrees.get(&key) {
                return Ok(info.path.clone());
            }
            // Branch rename case: reuse by directory name
            if let Some(info) = state
                .worktrees
                .values()
                .find(|w| !w.is_main && w.matches_source(source_id))
            {
                return Ok(info.path.clone());
            }
            let path = worktree_path(&project.repo_path, source_id.as_str());
            state.worktrees.insert(
                key,
                WorktreeInfo {
                    branch: source_id.to_string(),
                    path: path.clone(),
                    is_main: false,
                    is_current: false,
                    main_state: MainState::Ahead,
                    working_tree: WorkingTreeStatus::default(),
                },
            );
            Ok(path)
        }

        async fn list(
            &self,
            project: &ProjectConfig,
        ) -> Result<Vec<WorktreeInfo>, CommandError> {
            let state = self.inner.lock();
            Ok(state
                .worktrees
                .iter()
                .filter(|((p, _), _)| p == &project.name)
                .map(|(_, info)| info.clone())
                .collect())
        }

        async fn remove(
            &self,
            project: &ProjectConfig,
            branch: &str,
            force: bool,
        ) -> Result<(), CommandError> {
            let mut state = self.inner.lock();
            let key = (project.name.clone(), branch.to_string());
            let fail = |stderr: &str| CommandError::Failed {
                command: format!("wt remove {branch}"),
                stderr: stderr.to_string(),
            };
            if state.fail_removal {
                return Err(fail("removal disabled"));
            }
            let Some(info) = state.worktrees.get(&key) else {
                return Err(fail("no such worktree"));
            };
            if info.is_main {
                return Err(fail("refusing to remove the main worktree"));
            }
            if !info.working_tree.is_clean() && !force {
                return Err(fail("worktree has uncommitted changes"));
            }
            state.worktrees.remove(&key);
            state.removed.push(key);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeWorktrees;

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
