// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! whs-adapters: narrow interfaces over the external collaborators.
//!
//! Every subsystem whs depends on but does not own (the `bd` issue
//! tracker, the `wt` worktree CLI, the agent process, the VCS host, and
//! notification transports) is wrapped behind a trait defined here, with
//! a CLI-backed production implementation and an in-memory fake behind the
//! `test-support` feature.

pub mod agent;
pub mod beads;
pub mod exec;
pub mod notify;
pub mod vcs;
pub mod worktree;

pub use agent::{AgentError, AgentOutcome, AgentRequest, AgentRunner, ClaudeCli, PendingAsk};
pub use beads::{BeadsCli, Comment, CreateIssue, IssueStore, ListFilter, UpdateIssue};
pub use exec::CommandError;
pub use notify::{DesktopNotifier, LogNotifier, Notifier};
pub use vcs::{CiState, GhCli, PrInfo, PrState, VcsHost};
pub use worktree::{MainState, WorkingTreeStatus, WorktreeInfo, WorktreeProvider, WorktrunkCli};

#[cfg(any(test, feature = "test-support"))]
pub use agent::{FakeAgentRunner, ScriptedRun};
#[cfg(any(test, feature = "test-support"))]
pub use beads::FakeIssueStore;
#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifier, NotifyCall};
#[cfg(any(test, feature = "test-support"))]
pub use vcs::FakeVcsHost;
#[cfg(any(test, feature = "test-support"))]
pub use worktree::FakeWorktrees;
