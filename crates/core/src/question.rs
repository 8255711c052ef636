// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Question records: how an agent's "ask the user" surfaces as a tracker
//! issue and as disk-backed pending/answered entries.
//!
//! A question issue's description carries its metadata as a fenced JSON
//! block so a human reading the tracker sees the context while the
//! dispatcher can round-trip the structure.

use crate::id::{IssueId, SessionId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One question the agent put to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub multi_select: bool,
}

/// Metadata embedded in a question issue's description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionData {
    pub project: String,
    pub epic_id: IssueId,
    pub step_id: IssueId,
    pub session_id: SessionId,
    pub worktree: PathBuf,
    #[serde(default)]
    pub context: String,
    pub questions: Vec<QuestionItem>,
    pub asked_at_ms: u64,
}

impl QuestionData {
    /// Render the issue description: free-text context followed by the
    /// metadata as a fenced JSON block.
    pub fn to_description(&self) -> String {
        let json = serde_json::to_string_pretty(self).unwrap_or_default();
        if self.context.is_empty() {
            format!("```json\n{json}\n```\n")
        } else {
            format!("{}\n\n```json\n{json}\n```\n", self.context)
        }
    }

    /// Extract the metadata from an issue description written by
    /// [`to_description`]. Returns None when no parseable block exists.
    pub fn from_description(description: &str) -> Option<Self> {
        let start = description.find("```json")?;
        let rest = &description[start + "```json".len()..];
        let end = rest.find("```")?;
        serde_json::from_str(rest[..end].trim()).ok()
    }
}

/// Disk-backed record of a question awaiting a human answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub question_id: IssueId,
    pub work_item_id: IssueId,
    pub project: String,
    pub epic_id: IssueId,
    pub step_id: IssueId,
    pub session_id: SessionId,
    pub worktree: PathBuf,
    #[serde(default)]
    pub context: String,
    pub questions: Vec<QuestionItem>,
    pub asked_at_ms: u64,
}

/// A pending question once the human has answered; consumed by the
/// dispatcher on its next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    #[serde(flatten)]
    pub question: PendingQuestion,
    pub answer: String,
    pub answered_at_ms: u64,
}

#[cfg(test)]
#[path = "question_tests.rs"]
mod tests;
