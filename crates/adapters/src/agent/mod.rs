// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent runner: one external agent process per workflow step.
//!
//! The agent owns its own session state; whs only carries the opaque
//! session id and resumes through it. Errors are classified so the
//! dispatcher can distinguish "stop this workflow" (auth) from "stop
//! starting new work" (rate limit).

mod claude;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use claude::ClaudeCli;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentRunner, ScriptedRun};

use crate::exec::CommandError;
use async_trait::async_trait;
use std::path::PathBuf;
use whs_core::{QuestionItem, SessionId};

/// Default turn budget for a full step run.
pub const DEFAULT_MAX_TURNS: u32 = 50;

/// One agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub prompt: String,
    pub cwd: PathBuf,
    pub system_prompt: Option<String>,
    pub allowed_tools: Vec<String>,
    pub max_turns: u32,
    /// Resume a prior session instead of starting fresh.
    pub resume: Option<SessionId>,
    /// When set, the pre-tool safety hooks are installed, rooted at this
    /// worktree.
    pub safety_worktree: Option<PathBuf>,
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            cwd: cwd.into(),
            system_prompt: None,
            allowed_tools: Vec::new(),
            max_turns: DEFAULT_MAX_TURNS,
            resume: None,
            safety_worktree: None,
        }
    }

    whs_core::setters! {
        set {
            allowed_tools: Vec<String>,
            max_turns: u32,
        }
        option {
            system_prompt: String,
            resume: SessionId,
            safety_worktree: PathBuf,
        }
    }
}

/// A question the agent put to the user instead of finishing.
///
/// When present on an outcome, no handoff is expected; the session can be
/// resumed with the answer.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PendingAsk {
    #[serde(default)]
    pub context: String,
    pub questions: Vec<QuestionItem>,
}

/// Result of a completed agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub session_id: SessionId,
    pub output: String,
    pub cost_usd: f64,
    pub turns: u32,
    pub duration_ms: u64,
    pub pending_question: Option<PendingAsk>,
}

/// Classified agent failure.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Surface but do not retry; the workflow is blocked.
    #[error("agent authentication failed: {0}")]
    Auth(String),

    /// Pause the dispatcher; existing work is retried on resume.
    #[error("agent rate-limited: {0}")]
    RateLimited(String),

    #[error("agent run failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl AgentError {
    /// Classify an error message by its text.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if ["rate limit", "429", "too many requests"].iter().any(|p| lower.contains(p)) {
            AgentError::RateLimited(message)
        } else if ["authentication", "unauthorized", "401", "invalid api key", "please run /login"]
            .iter()
            .any(|p| lower.contains(p))
        {
            AgentError::Auth(message)
        } else {
            AgentError::Failed(message)
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AgentError::Auth(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AgentError::RateLimited(_))
    }
}

/// Runs an agent in a directory with a prompt.
#[async_trait]
pub trait AgentRunner: Clone + Send + Sync + 'static {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutcome, AgentError>;

    /// Resume a prior session with the human's answer.
    async fn resume_with_answer(
        &self,
        session: &SessionId,
        answer: &str,
        mut request: AgentRequest,
    ) -> Result<AgentOutcome, AgentError> {
        request.prompt = answer.to_string();
        request.resume = Some(session.clone());
        self.run(request).await
    }

    /// Best-effort cancellation at the next message boundary.
    fn abort(&self) {}
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
