// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active work: one in-flight workflow step per source issue.

use crate::agent::AgentRole;
use crate::id::{IssueId, SessionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-local record of a step currently being worked, mirrored to disk
/// so a restarted dispatcher can resume observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveWork {
    /// Source issue id in the project tracker; doubles as the registry key.
    pub work_item_id: IssueId,
    pub work_item_title: String,
    pub project: String,
    pub epic_id: IssueId,
    pub step_id: IssueId,
    pub agent: AgentRole,
    /// Empty until the agent's first reply.
    #[serde(default = "SessionId::empty")]
    pub session_id: SessionId,
    pub worktree: PathBuf,
    #[serde(default)]
    pub cost_usd: f64,
    pub started_at_ms: u64,
}

crate::builder! {
    pub struct ActiveWorkBuilder => ActiveWork {
        into {
            work_item_id: IssueId = "bd-123",
            work_item_title: String = "test work item",
            project: String = "api",
            epic_id: IssueId = "orc-1",
            step_id: IssueId = "orc-1.1",
            worktree: PathBuf = "/tmp/worktree",
        }
        set {
            agent: AgentRole = AgentRole::Implementation,
            session_id: SessionId = SessionId::empty(),
            cost_usd: f64 = 0.0,
            started_at_ms: u64 = 0,
        }
    }
}
