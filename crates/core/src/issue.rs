// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The issue (bead) primitive persisted by the external tracker.
//!
//! Records arrive over the `bd` CLI's `--json` output. The dependency list
//! differs in shape between `list` and `show` (bare id strings vs objects
//! with a relationship type); [`DependencyRef`] models both and
//! [`Issue::blocker_ids`] normalizes them to a uniform set, dropping
//! `parent-child` relationships which do not gate readiness.

use crate::id::IssueId;
use serde::{Deserialize, Serialize};

/// Issue status as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
    Tombstone,
    Pinned,
}

impl IssueStatus {
    /// Statuses that count as "not yet done" for readiness purposes.
    pub fn is_active(&self) -> bool {
        matches!(self, IssueStatus::Open | IssueStatus::InProgress)
    }

    /// Statuses that satisfy a dependency edge.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, IssueStatus::Closed | IssueStatus::Tombstone)
    }
}

crate::simple_display! {
    IssueStatus {
        Open => "open",
        InProgress => "in_progress",
        Blocked => "blocked",
        Deferred => "deferred",
        Closed => "closed",
        Tombstone => "tombstone",
        Pinned => "pinned",
    }
}

/// Issue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Epic,
    Task,
    Bug,
    Feature,
    Chore,
    Question,
    Message,
}

crate::simple_display! {
    IssueType {
        Epic => "epic",
        Task => "task",
        Bug => "bug",
        Feature => "feature",
        Chore => "chore",
        Question => "question",
        Message => "message",
    }
}

/// Priority: 0 is critical, 4 is lowest. Tracker default is 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Priority(2)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One dependency entry as it appears on the wire.
///
/// `bd list` emits bare id strings; `bd show` emits objects carrying the
/// relationship type. Untagged so serde picks the shape that parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyRef {
    Id(IssueId),
    Link {
        #[serde(default)]
        id: Option<IssueId>,
        #[serde(default)]
        depends_on_id: Option<IssueId>,
        #[serde(rename = "type", default)]
        dep_type: Option<String>,
    },
}

impl DependencyRef {
    /// The blocker id this entry points at, or None for relationships that
    /// do not gate readiness (`parent-child`).
    pub fn blocker_id(&self) -> Option<&IssueId> {
        match self {
            DependencyRef::Id(id) => Some(id),
            DependencyRef::Link { dep_type: Some(t), .. } if t == "parent-child" => None,
            DependencyRef::Link { depends_on_id: Some(id), .. } => Some(id),
            DependencyRef::Link { id: Some(id), .. } => Some(id),
            DependencyRef::Link { .. } => None,
        }
    }
}

/// An issue (bead) as persisted by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "issue_type", alias = "type")]
    pub issue_type: IssueType,
    pub status: IssueStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<IssueId>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl Issue {
    /// Normalized blocker ids: every dependency that gates readiness,
    /// with `parent-child` relationships dropped.
    pub fn blocker_ids(&self) -> Vec<IssueId> {
        self.dependencies.iter().filter_map(|d| d.blocker_id().cloned()).collect()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// First label value for a `<prefix>:` label, e.g.
    /// `label_value("project")` on `["project:api"]` → `Some("api")`.
    pub fn label_value(&self, prefix: &str) -> Option<&str> {
        crate::labels::find_value(&self.labels, prefix)
    }
}

crate::builder! {
    pub struct IssueBuilder => Issue {
        into {
            id: IssueId = "bd-1",
            title: String = "test issue",
            description: String = "",
        }
        set {
            issue_type: IssueType = IssueType::Task,
            status: IssueStatus = IssueStatus::Open,
            priority: Priority = Priority::default(),
            labels: Vec<String> = Vec::new(),
            dependencies: Vec<DependencyRef> = Vec::new(),
        }
        option {
            parent: IssueId = None,
        }
        computed {
            created: Option<chrono::DateTime<chrono::Utc>> = None,
            updated: Option<chrono::DateTime<chrono::Utc>> = None,
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
