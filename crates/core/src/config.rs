// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator configuration (`.whs/config.json`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_agents_path() -> String {
    "docs/llm/agents".to_string()
}

fn default_max_total() -> usize {
    3
}

fn default_max_per_project() -> usize {
    1
}

/// How the project's tracker database is shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadsMode {
    /// Tracker database is committed to the repository (daemon syncs it).
    #[default]
    Committed,
    /// Tracker database lives outside the repository.
    Local,
}

/// One repository whs pulls work from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    pub repo_path: PathBuf,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_agents_path")]
    pub agents_path: String,
    #[serde(default)]
    pub beads_mode: BeadsMode,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            repo_path: repo_path.into(),
            base_branch: default_base_branch(),
            agents_path: default_agents_path(),
            beads_mode: BeadsMode::default(),
        }
    }
}

/// Dispatcher concurrency bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_total")]
    pub max_total: usize,
    #[serde(default = "default_max_per_project")]
    pub max_per_project: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_total: default_max_total(), max_per_project: default_max_per_project() }
    }
}

/// Notification transport selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    #[default]
    Log,
    Desktop,
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhsConfig {
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    pub orchestrator_path: PathBuf,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub notifier: NotifierKind,
}

impl WhsConfig {
    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }
}

/// A project-local pointer at the orchestrator, used by walking-up lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerConfig {
    pub orchestrator_path: PathBuf,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
