// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reserved label vocabulary whs writes into the orchestrator tracker.
//!
//! Workflow structure is encoded entirely as labels on ordinary issues:
//! an epic carries `whs:workflow`, `project:<name>`, `source:<id>`; a step
//! carries `whs:step`, `agent:<role>`, and optionally `pr:<n>`/`ci:<state>`.

use crate::agent::{AgentRole, CiStatus};
use crate::id::IssueId;

/// Marker on every workflow epic.
pub const WORKFLOW: &str = "whs:workflow";
/// Marker on every workflow step.
pub const STEP: &str = "whs:step";
/// Marker on every question issue.
pub const QUESTION: &str = "whs:question";
/// Added to an epic closed through the blocked-terminal path.
pub const BLOCKED_HUMAN: &str = "blocked:human";

pub fn project(name: &str) -> String {
    format!("project:{name}")
}

pub fn source(id: &IssueId) -> String {
    format!("source:{id}")
}

pub fn agent(role: AgentRole) -> String {
    format!("agent:{role}")
}

pub fn pr(number: u64) -> String {
    format!("pr:{number}")
}

pub fn ci(status: CiStatus) -> String {
    format!("ci:{status}")
}

pub fn epic(id: &IssueId) -> String {
    format!("epic:{id}")
}

pub fn errored(kind: &str) -> String {
    format!("errored:{kind}")
}

/// First `<prefix>:value` match in a label set.
pub fn find_value<'a>(labels: &'a [String], prefix: &str) -> Option<&'a str> {
    labels.iter().find_map(|l| {
        let rest = l.strip_prefix(prefix)?;
        rest.strip_prefix(':')
    })
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
