// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`IssueStore`] implementing the tracker semantics whs relies
//! on: dot-suffixed child ids, readiness, dependency cycles, and daemon
//! bookkeeping. Shared by engine and dispatcher tests.

use super::{Comment, CreateIssue, IssueStore, ListFilter, UpdateIssue};
use crate::exec::CommandError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use whs_core::{Issue, IssueId, IssueStatus};

#[derive(Default)]
struct Tracker {
    prefix: String,
    next_top: u64,
    next_child: HashMap<IssueId, u64>,
    /// Issues in creation order.
    issues: Vec<Issue>,
    comments: HashMap<IssueId, Vec<Comment>>,
    daemon_running: bool,
    daemon_starts: u64,
}

impl Tracker {
    fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.iter().find(|i| &i.id == id)
    }

    fn get_mut(&mut self, id: &IssueId) -> Option<&mut Issue> {
        self.issues.iter_mut().find(|i| &i.id == id)
    }

    fn blockers_satisfied(&self, issue: &Issue) -> bool {
        issue.blocker_ids().iter().all(|id| {
            self.get(id).map(|dep| dep.status.satisfies_dependency()).unwrap_or(false)
        })
    }

    /// True if `from` can reach `to` over dependency and parent edges.
    ///
    /// Parent edges run parent → child: an epic is not complete until its
    /// children are. Explicit edges run child → blocker.
    fn reaches(&self, from: &IssueId, to: &IssueId, depth: usize) -> bool {
        if depth > 64 {
            return false;
        }
        if from == to {
            return true;
        }
        let Some(issue) = self.get(from) else {
            return false;
        };
        for blocker in issue.blocker_ids() {
            if self.reaches(&blocker, to, depth + 1) {
                return true;
            }
        }
        for child in self.issues.iter().filter(|i| i.parent.as_ref() == Some(from)) {
            if self.reaches(&child.id, to, depth + 1) {
                return true;
            }
        }
        false
    }
}

#[derive(Default)]
struct FakeStoreState {
    trackers: HashMap<PathBuf, Tracker>,
}

/// Fake issue store for testing.
#[derive(Clone, Default)]
pub struct FakeIssueStore {
    inner: Arc<Mutex<FakeStoreState>>,
}

impl FakeIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: &IssueId) -> CommandError {
        CommandError::Failed {
            command: format!("bd show {id} --json"),
            stderr: format!("issue not found: {id}"),
        }
    }

    fn with_tracker<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut Tracker) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let mut state = self.inner.lock();
        let tracker = state.trackers.entry(path.to_path_buf()).or_insert_with(|| Tracker {
            prefix: "bd".to_string(),
            ..Tracker::default()
        });
        f(tracker)
    }

    /// Snapshot a single issue (panics are fine in tests; returns None
    /// when missing).
    pub fn issue(&self, path: &Path, id: &str) -> Option<Issue> {
        let state = self.inner.lock();
        state.trackers.get(path)?.get(&IssueId::from_string(id)).cloned()
    }

    /// Snapshot all issues in creation order.
    pub fn issues(&self, path: &Path) -> Vec<Issue> {
        let state = self.inner.lock();
        state.trackers.get(path).map(|t| t.issues.clone()).unwrap_or_default()
    }

    /// Snapshot the comments on an issue.
    pub fn comments(&self, path: &Path, id: &str) -> Vec<Comment> {
        let state = self.inner.lock();
        state
            .trackers
            .get(path)
            .and_then(|t| t.comments.get(&IssueId::from_string(id)).cloned())
            .unwrap_or_default()
    }

    pub fn set_daemon_running(&self, path: &Path, running: bool) {
        let _ = self.with_tracker(path, |t| {
            t.daemon_running = running;
            Ok(())
        });
    }

    pub fn daemon_starts(&self, path: &Path) -> u64 {
        let state = self.inner.lock();
        state.trackers.get(path).map(|t| t.daemon_starts).unwrap_or(0)
    }

    /// Seed an issue directly, bypassing id minting.
    pub fn seed(&self, path: &Path, issue: Issue) {
        let _ = self.with_tracker(path, |t| {
            t.issues.push(issue);
            Ok(())
        });
    }
}

#[async_trait]
impl IssueStore for FakeIssueStore {
    async fn ready(&self, path: &Path) -> Result<Vec<Issue>, CommandError> {
        self.with_tracker(path, |t| {
            let mut ready: Vec<Issue> = t
                .issues
                .iter()
                .filter(|i| i.status.is_active() && t.blockers_satisfied(i))
                .cloned()
                .collect();
            // Stable sort: priority order, creation order within a priority
            ready.sort_by_key(|i| i.priority);
            Ok(ready)
        })
    }

    async fn list(&self, path: &Path, filter: &ListFilter) -> Result<Vec<Issue>, CommandError> {
        self.with_tracker(path, |t| {
            Ok(t.issues.iter().filter(|i| filter.matches(i)).cloned().collect())
        })
    }

    async fn show(&self, id: &IssueId, path: &Path) -> Result<Issue, CommandError> {
        self.with_tracker(path, |t| t.get(id).cloned().ok_or_else(|| Self::not_found(id)))
    }

    async fn create(&self, path: &Path, fields: CreateIssue) -> Result<Issue, CommandError> {
        self.with_tracker(path, |t| {
            let id = match &fields.parent {
                Some(parent) => {
                    if t.get(parent).is_none() {
                        return Err(Self::not_found(parent));
                    }
                    let n = t.next_child.entry(parent.clone()).or_insert(0);
                    *n += 1;
                    IssueId::from_string(format!("{parent}.{n}"))
                }
                None => {
                    t.next_top += 1;
                    IssueId::from_string(format!("{}-{}", t.prefix, t.next_top))
                }
            };
            let issue = Issue {
                id,
                title: fields.title,
                description: fields.description,
                issue_type: fields.issue_type,
                status: IssueStatus::Open,
                priority: fields.priority,
                labels: fields.labels,
                parent: fields.parent,
                dependencies: Vec::new(),
                created: None,
                updated: None,
            };
            t.issues.push(issue.clone());
            Ok(issue)
        })
    }

    async fn update(
        &self,
        id: &IssueId,
        path: &Path,
        fields: UpdateIssue,
    ) -> Result<(), CommandError> {
        self.with_tracker(path, |t| {
            let issue = t.get_mut(id).ok_or_else(|| Self::not_found(id))?;
            if let Some(status) = fields.status {
                issue.status = status;
            }
            if let Some(priority) = fields.priority {
                issue.priority = priority;
            }
            for label in fields.add_labels {
                if !issue.has_label(&label) {
                    issue.labels.push(label);
                }
            }
            Ok(())
        })
    }

    async fn close(&self, id: &IssueId, reason: &str, path: &Path) -> Result<(), CommandError> {
        self.with_tracker(path, |t| {
            let issue = t.get_mut(id).ok_or_else(|| Self::not_found(id))?;
            issue.status = IssueStatus::Closed;
            t.comments
                .entry(id.clone())
                .or_default()
                .push(Comment { text: format!("Closed: {reason}"), created: None });
            Ok(())
        })
    }

    async fn comment(&self, id: &IssueId, text: &str, path: &Path) -> Result<(), CommandError> {
        self.with_tracker(path, |t| {
            if t.get(id).is_none() {
                return Err(Self::not_found(id));
            }
            t.comments
                .entry(id.clone())
                .or_default()
                .push(Comment { text: text.to_string(), created: None });
            Ok(())
        })
    }

    async fn list_comments(
        &self,
        id: &IssueId,
        path: &Path,
    ) -> Result<Vec<Comment>, CommandError> {
        self.with_tracker(path, |t| Ok(t.comments.get(id).cloned().unwrap_or_default()))
    }

    async fn dep_add(
        &self,
        child: &IssueId,
        blocker: &IssueId,
        path: &Path,
    ) -> Result<(), CommandError> {
        self.with_tracker(path, |t| {
            if t.get(child).is_none() {
                return Err(Self::not_found(child));
            }
            if t.get(blocker).is_none() {
                return Err(Self::not_found(blocker));
            }
            if t.reaches(blocker, child, 0) {
                return Err(CommandError::Failed {
                    command: format!("bd dep add {child} {blocker}"),
                    stderr: format!("dependency cycle: {blocker} already depends on {child}"),
                });
            }
            // unwrap-free re-borrow; existence checked above
            if let Some(issue) = t.get_mut(child) {
                issue.dependencies.push(whs_core::DependencyRef::Id(blocker.clone()));
            }
            Ok(())
        })
    }

    async fn init(&self, path: &Path, prefix: &str) -> Result<(), CommandError> {
        let mut state = self.inner.lock();
        let tracker = state.trackers.entry(path.to_path_buf()).or_default();
        tracker.prefix = prefix.to_string();
        Ok(())
    }

    async fn is_daemon_running(&self, path: &Path) -> Result<bool, CommandError> {
        self.with_tracker(path, |t| Ok(t.daemon_running))
    }

    async fn ensure_daemon_with_sync_branch(
        &self,
        path: &Path,
        _sync_branch: &str,
    ) -> Result<(), CommandError> {
        self.with_tracker(path, |t| {
            if !t.daemon_running {
                t.daemon_running = true;
                t.daemon_starts += 1;
            }
            Ok(())
        })
    }
}
