// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only VCS host queries (`gh`), used only by the doctor.
//!
//! Every failure degrades to "unknown" rather than erroring: a health
//! check must not fail because GitHub is slow.

use crate::exec;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Merge state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Merged,
    Closed,
    Unknown,
}

whs_core::simple_display! {
    PrState {
        Open => "open",
        Merged => "merged",
        Closed => "closed",
        Unknown => "unknown",
    }
}

/// Aggregate check-run state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiState {
    Pending,
    Passing,
    Failing,
    Unknown,
}

whs_core::simple_display! {
    CiState {
        Pending => "pending",
        Passing => "passing",
        Failing => "failing",
        Unknown => "unknown",
    }
}

/// What the doctor reports about a pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct PrInfo {
    pub number: u64,
    pub state: PrState,
    /// None when the host could not say (or the query failed).
    pub mergeable: Option<bool>,
    pub ci: CiState,
    pub head_ref: Option<String>,
}

impl PrInfo {
    pub fn unknown(number: u64) -> Self {
        Self { number, state: PrState::Unknown, mergeable: None, ci: CiState::Unknown, head_ref: None }
    }
}

/// Read-only host queries.
#[async_trait]
pub trait VcsHost: Clone + Send + Sync + 'static {
    /// Merge/conflict/check state for one PR; degrades to unknown.
    async fn pr_status(&self, repo: &Path, number: u64) -> PrInfo;

    /// Open PRs with their head branches; degrades to empty.
    async fn open_prs(&self, repo: &Path) -> Vec<PrInfo>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrViewDto {
    #[serde(default)]
    state: String,
    #[serde(default)]
    mergeable: String,
    #[serde(default)]
    status_check_rollup: Vec<CheckDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckDto {
    #[serde(default)]
    status: String,
    #[serde(default)]
    conclusion: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrListDto {
    number: u64,
    #[serde(default)]
    head_ref_name: String,
    #[serde(default)]
    state: String,
}

fn parse_state(s: &str) -> PrState {
    match s {
        "OPEN" => PrState::Open,
        "MERGED" => PrState::Merged,
        "CLOSED" => PrState::Closed,
        _ => PrState::Unknown,
    }
}

fn rollup_ci(checks: &[CheckDto]) -> CiState {
    if checks.is_empty() {
        return CiState::Unknown;
    }
    if checks.iter().any(|c| matches!(c.conclusion.as_str(), "FAILURE" | "TIMED_OUT")) {
        return CiState::Failing;
    }
    if checks.iter().any(|c| c.status != "COMPLETED") {
        return CiState::Pending;
    }
    CiState::Passing
}

/// Production host adapter shelling out to `gh`.
#[derive(Clone, Debug)]
pub struct GhCli {
    program: String,
}

impl Default for GhCli {
    fn default() -> Self {
        Self { program: "gh".to_string() }
    }
}

impl GhCli {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VcsHost for GhCli {
    async fn pr_status(&self, repo: &Path, number: u64) -> PrInfo {
        let number_str = number.to_string();
        let args =
            ["pr", "view", &number_str, "--json", "state,mergeable,statusCheckRollup"];
        let result = tokio::time::timeout(
            QUERY_TIMEOUT,
            exec::run_json::<PrViewDto>(&self.program, &args, repo),
        )
        .await;

        match result {
            Ok(Ok(dto)) => PrInfo {
                number,
                state: parse_state(&dto.state),
                mergeable: match dto.mergeable.as_str() {
                    "MERGEABLE" => Some(true),
                    "CONFLICTING" => Some(false),
                    _ => None,
                },
                ci: rollup_ci(&dto.status_check_rollup),
                head_ref: None,
            },
            Ok(Err(e)) => {
                tracing::warn!(number, error = %e, "pr view failed");
                PrInfo::unknown(number)
            }
            Err(_) => {
                tracing::warn!(number, "pr view timed out");
                PrInfo::unknown(number)
            }
        }
    }

    async fn open_prs(&self, repo: &Path) -> Vec<PrInfo> {
        let args = ["pr", "list", "--json", "number,headRefName,state"];
        let result = tokio::time::timeout(
            QUERY_TIMEOUT,
            exec::run_json::<Vec<PrListDto>>(&self.program, &args, repo),
        )
        .await;

        match result {
            Ok(Ok(dtos)) => dtos
                .into_iter()
                .map(|d| PrInfo {
                    number: d.number,
                    state: parse_state(&d.state),
                    mergeable: None,
                    ci: CiState::Unknown,
                    head_ref: Some(d.head_ref_name),
                })
                .collect(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "pr list failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!("pr list timed out");
                Vec::new()
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Fake host returning seeded PR states.
    #[derive(Clone, Default)]
    pub struct FakeVcsHost {
        inner: Arc<Mutex<HashMap<u64, PrInfo>>>,
    }

    impl FakeVcsHost {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, info: PrInfo) {
            self.inner.lock().insert(info.number, info);
        }
    }

    #[async_trait]
    impl VcsHost for FakeVcsHost {
        async fn pr_status(&self, _repo: &Path, number: u64) -> PrInfo {
            self.inner.lock().get(&number).cloned().unwrap_or_else(|| PrInfo::unknown(number))
        }

        async fn open_prs(&self, _repo: &Path) -> Vec<PrInfo> {
            let mut prs: Vec<PrInfo> = self
                .inner
                .lock()
                .values()
                .filter(|p| p.state == PrState::Open)
                .cloned()
                .collect();
            prs.sort_by_key(|p| p.number);
            prs
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeVcsHost;

#[cfg(test)]
#[path = "vcs_tests.rs"]
mod tests;
