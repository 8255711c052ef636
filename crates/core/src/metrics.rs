// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric record types for the append-only cost/outcome log.

use crate::agent::AgentRole;
use crate::id::IssueId;
use serde::{Deserialize, Serialize};

/// Cost and outcome of one agent step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetric {
    pub project: String,
    pub source_id: IssueId,
    pub epic_id: IssueId,
    pub step_id: IssueId,
    pub agent: AgentRole,
    /// What the step produced: a `next_agent` name, `DONE`, `BLOCKED`,
    /// `question`, or an error kind.
    pub outcome: String,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub recorded_at_ms: u64,
}

/// Terminal summary of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetric {
    pub project: String,
    pub source_id: IssueId,
    pub epic_id: IssueId,
    /// `done` or `blocked`.
    pub outcome: String,
    pub total_cost_usd: f64,
    pub recorded_at_ms: u64,
}

/// One line of the metrics log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricRecord {
    Step(StepMetric),
    Workflow(WorkflowMetric),
}
