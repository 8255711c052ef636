// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent roles and the handoff routing targets.

use serde::{Deserialize, Serialize};

/// A named agent role in the workflow chain.
///
/// The role name doubles as the step issue title and the `agent:<role>`
/// label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Implementation,
    QualityReview,
    ReleaseManager,
    UxSpecialist,
    Architect,
    Planner,
}

crate::simple_display! {
    AgentRole {
        Implementation => "implementation",
        QualityReview => "quality_review",
        ReleaseManager => "release_manager",
        UxSpecialist => "ux_specialist",
        Architect => "architect",
        Planner => "planner",
    }
}

impl std::str::FromStr for AgentRole {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "implementation" => Ok(AgentRole::Implementation),
            "quality_review" => Ok(AgentRole::QualityReview),
            "release_manager" => Ok(AgentRole::ReleaseManager),
            "ux_specialist" => Ok(AgentRole::UxSpecialist),
            "architect" => Ok(AgentRole::Architect),
            "planner" => Ok(AgentRole::Planner),
            _ => Err(UnknownAgent(s.to_string())),
        }
    }
}

/// Error for a `next_agent` value outside the valid set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent: {0}")]
pub struct UnknownAgent(pub String);

/// Where a handoff routes the workflow next: another role, or a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAgent {
    Role(AgentRole),
    Done,
    Blocked,
}

impl NextAgent {
    pub fn as_role(&self) -> Option<AgentRole> {
        match self {
            NextAgent::Role(r) => Some(*r),
            _ => None,
        }
    }
}

impl std::fmt::Display for NextAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextAgent::Role(r) => write!(f, "{r}"),
            NextAgent::Done => f.write_str("DONE"),
            NextAgent::Blocked => f.write_str("BLOCKED"),
        }
    }
}

impl std::str::FromStr for NextAgent {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Terminals are conventionally uppercase but agents sometimes
        // emit them lowercased.
        match s {
            "DONE" | "done" => Ok(NextAgent::Done),
            "BLOCKED" | "blocked" => Ok(NextAgent::Blocked),
            other => other.parse().map(NextAgent::Role),
        }
    }
}

impl Serialize for NextAgent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NextAgent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// CI state carried on a step as the `ci:<state>` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    Pending,
    Passed,
    Failed,
}

crate::simple_display! {
    CiStatus {
        Pending => "pending",
        Passed => "passed",
        Failed => "failed",
    }
}

impl std::str::FromStr for CiStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CiStatus::Pending),
            "passed" => Ok(CiStatus::Passed),
            "failed" => Ok(CiStatus::Failed),
            other => Err(format!("unknown ci status: {other}")),
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
