// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bd` CLI-backed [`IssueStore`] implementation.

use super::{Comment, CreateIssue, IssueStore, ListFilter, UpdateIssue};
use crate::exec::{self, CommandError};
use async_trait::async_trait;
use std::path::Path;
use whs_core::{Issue, IssueId};

/// Production issue store shelling out to `bd`.
///
/// Stateless; the tracker daemon serializes its own operations, so every
/// call is treated as transactional.
#[derive(Clone, Debug)]
pub struct BeadsCli {
    program: String,
}

impl Default for BeadsCli {
    fn default() -> Self {
        Self { program: "bd".to_string() }
    }
}

impl BeadsCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the binary name (tests point this at a stub script).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    async fn run(&self, args: &[&str], path: &Path) -> Result<String, CommandError> {
        exec::run(&self.program, args, path).await
    }

    async fn run_json<T: serde::de::DeserializeOwned>(
        &self,
        args: &[&str],
        path: &Path,
    ) -> Result<T, CommandError> {
        exec::run_json(&self.program, args, path).await
    }
}

#[derive(serde::Deserialize)]
struct DaemonStatus {
    #[serde(default)]
    running: bool,
}

#[async_trait]
impl IssueStore for BeadsCli {
    async fn ready(&self, path: &Path) -> Result<Vec<Issue>, CommandError> {
        self.run_json(&["ready", "--json"], path).await
    }

    async fn list(&self, path: &Path, filter: &ListFilter) -> Result<Vec<Issue>, CommandError> {
        let mut args: Vec<String> = vec!["list".into(), "--json".into()];
        for status in &filter.statuses {
            args.push("--status".into());
            args.push(status.to_string());
        }
        if let Some(t) = filter.issue_type {
            args.push("--type".into());
            args.push(t.to_string());
        }
        if let Some(parent) = &filter.parent {
            args.push("--parent".into());
            args.push(parent.to_string());
        }
        for label in &filter.labels_all {
            args.push("--label".into());
            args.push(label.clone());
        }
        for label in &filter.labels_any {
            args.push("--any-label".into());
            args.push(label.clone());
        }
        for label in &filter.labels_none {
            args.push("--no-label".into());
            args.push(label.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_json(&arg_refs, path).await
    }

    async fn show(&self, id: &IssueId, path: &Path) -> Result<Issue, CommandError> {
        self.run_json(&["show", id.as_str(), "--json"], path).await
    }

    async fn create(&self, path: &Path, fields: CreateIssue) -> Result<Issue, CommandError> {
        let type_str = fields.issue_type.to_string();
        let priority_str = fields.priority.to_string();
        let labels_str = fields.labels.join(",");

        let mut args: Vec<&str> =
            vec!["create", &fields.title, "--json", "-t", &type_str, "-p", &priority_str];
        if !fields.description.is_empty() {
            args.push("-d");
            args.push(&fields.description);
        }
        if !fields.labels.is_empty() {
            args.push("--labels");
            args.push(&labels_str);
        }
        if let Some(parent) = &fields.parent {
            args.push("--parent");
            args.push(parent.as_str());
        }
        self.run_json(&args, path).await
    }

    async fn update(
        &self,
        id: &IssueId,
        path: &Path,
        fields: UpdateIssue,
    ) -> Result<(), CommandError> {
        let mut args: Vec<String> = vec!["update".into(), id.to_string(), "--json".into()];
        if let Some(status) = fields.status {
            args.push("--status".into());
            args.push(status.to_string());
        }
        if let Some(priority) = fields.priority {
            args.push("--priority".into());
            args.push(priority.to_string());
        }
        for label in &fields.add_labels {
            args.push("--add-label".into());
            args.push(label.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs, path).await?;
        Ok(())
    }

    async fn close(&self, id: &IssueId, reason: &str, path: &Path) -> Result<(), CommandError> {
        self.run(&["close", id.as_str(), "--reason", reason, "--json"], path).await?;
        Ok(())
    }

    async fn comment(&self, id: &IssueId, text: &str, path: &Path) -> Result<(), CommandError> {
        self.run(&["comment", id.as_str(), text], path).await?;
        Ok(())
    }

    async fn list_comments(
        &self,
        id: &IssueId,
        path: &Path,
    ) -> Result<Vec<Comment>, CommandError> {
        self.run_json(&["comments", id.as_str(), "--json"], path).await
    }

    async fn dep_add(
        &self,
        child: &IssueId,
        blocker: &IssueId,
        path: &Path,
    ) -> Result<(), CommandError> {
        self.run(&["dep", "add", child.as_str(), blocker.as_str()], path).await?;
        Ok(())
    }

    async fn init(&self, path: &Path, prefix: &str) -> Result<(), CommandError> {
        self.run(&["init", "--prefix", prefix], path).await?;
        Ok(())
    }

    async fn is_daemon_running(&self, path: &Path) -> Result<bool, CommandError> {
        // A failing status command means no daemon, not an error.
        match self.run_json::<DaemonStatus>(&["daemon", "status", "--json"], path).await {
            Ok(status) => Ok(status.running),
            Err(CommandError::Failed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn ensure_daemon_with_sync_branch(
        &self,
        path: &Path,
        sync_branch: &str,
    ) -> Result<(), CommandError> {
        if self.is_daemon_running(path).await? {
            return Ok(());
        }
        tracing::info!(path = %path.display(), "restarting tracker daemon");
        self.run(&["daemon", "start", "--sync-branch", sync_branch], path).await?;
        Ok(())
    }
}
