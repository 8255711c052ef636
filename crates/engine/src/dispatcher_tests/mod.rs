// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher tests: end-to-end scenarios against the fake adapters.

mod errors;
mod lifecycle;
mod prompt;
mod questions;
mod scheduling;

use super::*;
use crate::metrics::MetricsStore;
use crate::state::StateStore;
use std::path::PathBuf;
use whs_adapters::{CreateIssue, FakeAgentRunner, FakeIssueStore, FakeNotifier, FakeWorktrees, IssueStore};
use whs_core::{
    ConcurrencyConfig, FakeClock, Issue, IssueStatus, IssueType, NotifierKind, Priority,
    ProjectConfig,
};

type TestDispatcher =
    Dispatcher<FakeIssueStore, FakeWorktrees, FakeAgentRunner, FakeNotifier, FakeClock>;

pub(crate) struct TestContext {
    pub dispatcher: TestDispatcher,
    pub store: FakeIssueStore,
    pub worktrees: FakeWorktrees,
    pub runner: FakeAgentRunner,
    pub notifier: FakeNotifier,
    pub clock: FakeClock,
    pub orchestrator: PathBuf,
    pub repos: Vec<PathBuf>,
    _tmp: tempfile::TempDir,
}

impl TestContext {
    pub fn repo(&self) -> &std::path::Path {
        &self.repos[0]
    }

    pub fn orc(&self) -> &std::path::Path {
        &self.orchestrator
    }

    /// One tick plus completion of every launch it spawned.
    pub async fn tick_and_settle(&self) {
        self.dispatcher.tick().await;
        self.dispatcher.settle().await;
    }

    /// Seed a ready task in the project tracker.
    pub async fn seed_task(&self, project_index: usize, title: &str, priority: u8) -> Issue {
        self.store
            .create(
                &self.repos[project_index],
                CreateIssue::new(title, IssueType::Task).priority(Priority(priority)),
            )
            .await
            .unwrap()
    }

    /// Epics currently in the orchestrator tracker.
    pub fn epics(&self) -> Vec<Issue> {
        self.store
            .issues(self.orc())
            .into_iter()
            .filter(|i| i.issue_type == IssueType::Epic)
            .collect()
    }

    pub fn issue(&self, id: &str) -> Issue {
        self.store.issue(self.orc(), id).unwrap()
    }

    pub fn metrics(&self) -> MetricsStore {
        MetricsStore::for_state_dir(&self.orchestrator.join(".whs"))
    }

    pub fn state_store(&self) -> StateStore {
        StateStore::for_orchestrator(&self.orchestrator)
    }
}

/// Build a context with `project_count` projects and the given bounds.
pub(crate) async fn setup_with(
    project_count: usize,
    max_total: usize,
    max_per_project: usize,
) -> TestContext {
    let tmp = tempfile::tempdir().unwrap();
    let orchestrator = tmp.path().join("orchestrator");
    std::fs::create_dir_all(&orchestrator).unwrap();

    let store = FakeIssueStore::new();
    store.init(&orchestrator, "orc").await.unwrap();

    let mut projects = Vec::new();
    let mut repos = Vec::new();
    for index in 0..project_count {
        let name = format!("proj{index}");
        let repo = tmp.path().join("repos").join(&name);
        std::fs::create_dir_all(&repo).unwrap();
        store.init(&repo, &format!("p{index}")).await.unwrap();
        projects.push(ProjectConfig::new(&name, &repo));
        repos.push(repo);
    }

    let whs = whs_core::WhsConfig {
        projects,
        orchestrator_path: orchestrator.clone(),
        concurrency: ConcurrencyConfig { max_total, max_per_project },
        notifier: NotifierKind::Log,
    };
    let mut config = DispatcherConfig::new(whs);
    // Keep the daemon pass out of scheduling tests; it has its own test
    config.daemon_check_ticks = 1_000_000;

    let worktrees = FakeWorktrees::new();
    let runner = FakeAgentRunner::new();
    let notifier = FakeNotifier::new();
    let clock = FakeClock::new();

    let dispatcher = Dispatcher::new(
        config,
        DispatcherDeps {
            store: store.clone(),
            worktrees: worktrees.clone(),
            runner: runner.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
        },
    )
    .unwrap();

    TestContext {
        dispatcher,
        store,
        worktrees,
        runner,
        notifier,
        clock,
        orchestrator,
        repos,
        _tmp: tmp,
    }
}

pub(crate) async fn setup() -> TestContext {
    setup_with(1, 3, 2).await
}

/// A fenced-yaml handoff as an agent would emit it.
pub(crate) fn handoff_output(
    next_agent: &str,
    context: &str,
    pr_number: Option<u64>,
    ci_status: Option<&str>,
) -> String {
    let mut body = format!("Work finished.\n\n```yaml\nnext_agent: {next_agent}\ncontext: {context}\n");
    if let Some(pr) = pr_number {
        body.push_str(&format!("pr_number: {pr}\n"));
    }
    if let Some(ci) = ci_status {
        body.push_str(&format!("ci_status: {ci}\n"));
    }
    body.push_str("```\n");
    body
}
