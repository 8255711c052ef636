// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-step / per-workflow cost and outcome log.
//!
//! Recording is fire-and-forget: a metrics failure must never fail a
//! workflow, so errors are logged and swallowed.

use std::io::Write;
use std::path::{Path, PathBuf};
use whs_core::{MetricRecord, StepMetric, WorkflowMetric};

const METRICS_FILE: &str = "metrics.jsonl";

/// JSONL metrics sink.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(METRICS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_step(&self, metric: StepMetric) {
        self.record(&MetricRecord::Step(metric));
    }

    pub fn record_workflow(&self, metric: WorkflowMetric) {
        self.record(&MetricRecord::Workflow(metric));
    }

    /// Append one record. Failures are logged and swallowed.
    pub fn record(&self, record: &MetricRecord) {
        if let Err(e) = self.append(record) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to record metric");
        }
    }

    fn append(&self, record: &MetricRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(record).map_err(std::io::Error::other)?;
        let mut file =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Parse every recorded line, skipping unreadable ones.
    pub fn read_all(&self) -> Vec<MetricRecord> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        contents.lines().filter_map(|l| serde_json::from_str(l).ok()).collect()
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
