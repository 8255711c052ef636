// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facade over the external issue tracker (`bd`).
//!
//! Two tracker instances share this interface: the orchestrator tracker
//! (owned by whs) and one project tracker per configured repository. Every
//! operation is scoped by the tracker's working directory.

mod cli;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use cli::BeadsCli;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeIssueStore;

use crate::exec::CommandError;
use async_trait::async_trait;
use std::path::Path;
use whs_core::{labels, Issue, IssueId, IssueStatus, IssueType, Priority, QuestionData};

/// Filter for [`IssueStore::list`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub statuses: Vec<IssueStatus>,
    pub issue_type: Option<IssueType>,
    pub parent: Option<IssueId>,
    /// Issue must carry every one of these labels.
    pub labels_all: Vec<String>,
    /// Issue must carry at least one of these labels (when non-empty).
    pub labels_any: Vec<String>,
    /// Issue must carry none of these labels.
    pub labels_none: Vec<String>,
}

impl ListFilter {
    whs_core::setters! {
        set {
            statuses: Vec<IssueStatus>,
            labels_all: Vec<String>,
            labels_any: Vec<String>,
            labels_none: Vec<String>,
        }
        option {
            issue_type: IssueType,
            parent: IssueId,
        }
    }

    /// Whether an issue passes this filter. Shared by the in-memory fake
    /// and by callers post-filtering tracker output.
    pub fn matches(&self, issue: &Issue) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&issue.status) {
            return false;
        }
        if let Some(t) = self.issue_type {
            if issue.issue_type != t {
                return false;
            }
        }
        if let Some(parent) = &self.parent {
            if issue.parent.as_ref() != Some(parent) {
                return false;
            }
        }
        if !self.labels_all.iter().all(|l| issue.has_label(l)) {
            return false;
        }
        if !self.labels_any.is_empty() && !self.labels_any.iter().any(|l| issue.has_label(l)) {
            return false;
        }
        if self.labels_none.iter().any(|l| issue.has_label(l)) {
            return false;
        }
        true
    }
}

/// Fields for [`IssueStore::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIssue {
    pub title: String,
    pub issue_type: IssueType,
    pub description: String,
    pub priority: Priority,
    pub labels: Vec<String>,
    pub parent: Option<IssueId>,
}

impl CreateIssue {
    pub fn new(title: impl Into<String>, issue_type: IssueType) -> Self {
        Self {
            title: title.into(),
            issue_type,
            description: String::new(),
            priority: Priority::default(),
            labels: Vec::new(),
            parent: None,
        }
    }

    whs_core::setters! {
        into {
            description: String,
        }
        set {
            priority: Priority,
            labels: Vec<String>,
        }
        option {
            parent: IssueId,
        }
    }
}

/// Fields for [`IssueStore::update`]. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateIssue {
    pub status: Option<IssueStatus>,
    pub priority: Option<Priority>,
    pub add_labels: Vec<String>,
}

impl UpdateIssue {
    whs_core::setters! {
        set {
            add_labels: Vec<String>,
        }
        option {
            status: IssueStatus,
            priority: Priority,
        }
    }
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Comment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// Narrow interface over the `bd` issue tracker.
///
/// The question-issue convention (spec'd label + metadata shapes) is
/// provided as default methods on top of the primitives so every
/// implementation encodes it identically.
#[async_trait]
pub trait IssueStore: Clone + Send + Sync + 'static {
    /// Ready issues in tracker priority order: status ∈ {open, in_progress}
    /// and every dependency closed or tombstoned.
    async fn ready(&self, path: &Path) -> Result<Vec<Issue>, CommandError>;

    async fn list(&self, path: &Path, filter: &ListFilter) -> Result<Vec<Issue>, CommandError>;

    async fn show(&self, id: &IssueId, path: &Path) -> Result<Issue, CommandError>;

    async fn create(&self, path: &Path, fields: CreateIssue) -> Result<Issue, CommandError>;

    async fn update(
        &self,
        id: &IssueId,
        path: &Path,
        fields: UpdateIssue,
    ) -> Result<(), CommandError>;

    async fn close(&self, id: &IssueId, reason: &str, path: &Path) -> Result<(), CommandError>;

    async fn comment(&self, id: &IssueId, text: &str, path: &Path) -> Result<(), CommandError>;

    async fn list_comments(&self, id: &IssueId, path: &Path)
        -> Result<Vec<Comment>, CommandError>;

    /// Add a dependency edge: `child` is blocked until `blocker` closes.
    ///
    /// Fails if the edge would introduce a cycle. Callers must never
    /// express a parent-child relationship through both `parent` and an
    /// explicit dependency on the same pair.
    async fn dep_add(
        &self,
        child: &IssueId,
        blocker: &IssueId,
        path: &Path,
    ) -> Result<(), CommandError>;

    async fn init(&self, path: &Path, prefix: &str) -> Result<(), CommandError>;

    async fn is_daemon_running(&self, path: &Path) -> Result<bool, CommandError>;

    /// Start the tracker daemon with its sync branch if it is not running.
    async fn ensure_daemon_with_sync_branch(
        &self,
        path: &Path,
        sync_branch: &str,
    ) -> Result<(), CommandError>;

    /// Open question issues awaiting an answer.
    async fn list_pending_questions(&self, path: &Path) -> Result<Vec<Issue>, CommandError> {
        let filter = ListFilter::default()
            .statuses(vec![IssueStatus::Open])
            .issue_type(IssueType::Question)
            .labels_all(vec![labels::QUESTION.to_string()]);
        self.list(path, &filter).await
    }

    /// Create a question issue under `step_id` and block the step on it.
    async fn create_question(
        &self,
        title: &str,
        path: &Path,
        data: &QuestionData,
        step_id: &IssueId,
    ) -> Result<Issue, CommandError> {
        let fields = CreateIssue::new(title, IssueType::Question)
            .description(data.to_description())
            .labels(vec![labels::QUESTION.to_string()])
            .parent(step_id.clone());
        let question = self.create(path, fields).await?;
        self.dep_add(step_id, &question.id, path).await?;
        Ok(question)
    }

    /// Record the human answer and close the question, unblocking its step.
    async fn answer_question(
        &self,
        id: &IssueId,
        answer: &str,
        path: &Path,
    ) -> Result<(), CommandError> {
        self.comment(id, &format!("Answer: {answer}"), path).await?;
        self.close(id, "answered", path).await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
