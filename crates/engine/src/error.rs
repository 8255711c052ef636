// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use whs_adapters::CommandError;
use whs_core::IssueId;

/// Errors surfaced by the workflow engine and dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A tracker or worktree command failed; carries command and stderr.
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("no workflow found for {project}:{source_id}")]
    WorkflowNotFound { project: String, source_id: IssueId },

    #[error("issue {0} is not part of a workflow")]
    NotAWorkflowIssue(IssueId),

    #[error("project not configured: {0}")]
    UnknownProject(String),

    #[error("state persistence failed: {0}")]
    State(#[from] crate::state::StateError),
}
