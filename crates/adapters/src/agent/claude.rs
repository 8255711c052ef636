// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless Claude Code invocation (`claude --print --output-format json`).

use super::{AgentError, AgentOutcome, AgentRequest, AgentRunner, PendingAsk};
use crate::exec;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use whs_core::SessionId;

/// Agent runner shelling out to the `claude` CLI.
#[derive(Clone, Debug)]
pub struct ClaudeCli {
    program: String,
    /// Command prefix for the pre-tool hook handlers, usually the whs
    /// binary itself (`whs hook shell` / `whs hook path`). Hooks are only
    /// installed when this is set and the request carries a safety root.
    hook_command: Option<String>,
}

impl Default for ClaudeCli {
    fn default() -> Self {
        Self { program: "claude".to_string(), hook_command: None }
    }
}

impl ClaudeCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook_command(mut self, command: impl Into<String>) -> Self {
        self.hook_command = Some(command.into());
        self
    }

    /// Claude Code settings JSON installing the shell and file-path
    /// pre-tool hooks.
    pub(crate) fn hook_settings(&self, worktree: &std::path::Path) -> Option<String> {
        let hook = self.hook_command.as_deref()?;
        let worktree = worktree.display();
        let settings = serde_json::json!({
            "hooks": {
                "PreToolUse": [
                    {
                        "matcher": "Bash",
                        "hooks": [{
                            "type": "command",
                            "command": format!("{hook} hook shell --worktree {worktree}"),
                        }],
                    },
                    {
                        "matcher": "Write|Edit|MultiEdit|NotebookEdit",
                        "hooks": [{
                            "type": "command",
                            "command": format!("{hook} hook path --worktree {worktree}"),
                        }],
                    },
                ],
            },
        });
        Some(settings.to_string())
    }
}

/// `--output-format json` result shape (subset of fields we care about).
#[derive(Deserialize)]
struct RunResult {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    result: String,
    #[serde(default)]
    total_cost_usd: f64,
    #[serde(default)]
    num_turns: u32,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    pending_question: Option<PendingAsk>,
}

#[async_trait]
impl AgentRunner for ClaudeCli {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutcome, AgentError> {
        let max_turns = request.max_turns.to_string();
        let mut args: Vec<String> = vec![
            "--print".into(),
            "--output-format".into(),
            "json".into(),
            "--max-turns".into(),
            max_turns,
        ];
        if let Some(session) = &request.resume {
            args.push("--resume".into());
            args.push(session.to_string());
        }
        if let Some(system_prompt) = &request.system_prompt {
            args.push("--append-system-prompt".into());
            args.push(system_prompt.clone());
        }
        if !request.allowed_tools.is_empty() {
            args.push("--allowedTools".into());
            args.push(request.allowed_tools.join(","));
        }
        if let Some(worktree) = &request.safety_worktree {
            if let Some(settings) = self.hook_settings(worktree) {
                args.push("--settings".into());
                args.push(settings);
            }
        }
        args.push(request.prompt.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let started = Instant::now();
        let stdout = match exec::run(&self.program, &arg_refs, &request.cwd).await {
            Ok(stdout) => stdout,
            // The CLI exits non-zero on auth and rate-limit failures with
            // the reason on stderr.
            Err(crate::exec::CommandError::Failed { stderr, .. }) => {
                return Err(AgentError::classify(stderr))
            }
            Err(e) => return Err(e.into()),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let parsed: RunResult = serde_json::from_str(stdout.trim())
            .map_err(|e| AgentError::Failed(format!("unparseable agent output: {e}")))?;

        if parsed.is_error {
            return Err(AgentError::classify(parsed.result));
        }

        Ok(AgentOutcome {
            session_id: SessionId::from_string(parsed.session_id),
            output: parsed.result,
            cost_usd: parsed.total_cost_usd,
            turns: parsed.num_turns,
            duration_ms,
            pending_question: parsed.pending_question,
        })
    }
}
