// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handoff record: how an agent declares the next agent (or DONE /
//! BLOCKED) and the context to carry forward.
//!
//! Agents emit handoffs in whatever shape survives their run: a JSON file
//! in the worktree, a fenced YAML or JSON block, or inline prose. The
//! deserializer is deliberately lenient: both `snake_case` and `camelCase`
//! key spellings are accepted, and `pr_number` may arrive as a string.

use crate::agent::{CiStatus, NextAgent};
use serde::{Deserialize, Serialize};

/// Name of the handoff file an agent may write at the worktree root.
///
/// Survives agent crashes that happen after the write.
pub const HANDOFF_FILE_NAME: &str = ".whs-handoff.json";

/// Structured handoff from one agent step to the next.
///
/// Unknown keys are ignored; validation only rejects a `next_agent`
/// outside the valid set or a non-string `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    #[serde(alias = "nextAgent")]
    pub next_agent: NextAgent,
    pub context: String,
    #[serde(
        default,
        alias = "prNumber",
        deserialize_with = "de_pr_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub pr_number: Option<u64>,
    #[serde(default, alias = "ciStatus", skip_serializing_if = "Option::is_none")]
    pub ci_status: Option<CiStatus>,
}

impl Handoff {
    pub fn new(next_agent: NextAgent, context: impl Into<String>) -> Self {
        Self { next_agent, context: context.into(), pr_number: None, ci_status: None }
    }

    /// Terminal BLOCKED handoff with a diagnostic context.
    pub fn blocked(context: impl Into<String>) -> Self {
        Self::new(NextAgent::Blocked, context)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, HandoffError> {
        serde_yaml::from_str(s).map_err(|e| HandoffError::Parse(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self, HandoffError> {
        serde_json::from_str(s).map_err(|e| HandoffError::Parse(e.to_string()))
    }

    pub fn to_yaml(&self) -> String {
        // Serialization of this struct cannot fail; fall back to the
        // terminal spelling if it somehow does.
        serde_yaml::to_string(self)
            .unwrap_or_else(|_| format!("next_agent: {}\ncontext: {}\n", self.next_agent, self.context))
    }
}

/// Error from parsing or validating a handoff.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("invalid handoff: {0}")]
    Parse(String),
    #[error("invalid next_agent: {0}")]
    InvalidTarget(String),
    #[error("failed to read handoff file: {0}")]
    File(#[from] std::io::Error),
}

/// Accept `pr_number` as either a JSON/YAML number or a numeric string.
fn de_pr_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u64),
        Str(String),
    }

    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) => {
            s.trim().parse().map(Some).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
