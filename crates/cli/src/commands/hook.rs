// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs hook` - pre-tool hook handlers wired into agent runs.
//!
//! The agent runtime pipes the tool call as JSON on stdin; the handler
//! prints `{}` to allow or `{"decision": "deny", "message": ...}`.
//! Handlers always exit 0: a broken hook must not kill the agent.

use clap::Subcommand;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use whs_engine::safety;

#[derive(Subcommand)]
pub enum HookCommand {
    /// Check a shell command against the deny policy
    Shell {
        /// Worktree root the agent is confined to
        #[arg(long)]
        worktree: PathBuf,
    },
    /// Check a file write target against the worktree boundary
    Path {
        /// Worktree root the agent is confined to
        #[arg(long)]
        worktree: PathBuf,
    },
}

/// Input from the PreToolUse hook (subset of fields we care about).
#[derive(Default, Deserialize)]
struct PreToolUseInput {
    #[serde(default)]
    tool_input: ToolInput,
}

#[derive(Default, Deserialize)]
struct ToolInput {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default, alias = "notebook_path")]
    path: Option<String>,
}

/// Read and deserialize JSON from stdin, defaulting on parse failure.
fn read_hook_input() -> PreToolUseInput {
    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        return PreToolUseInput::default();
    }
    serde_json::from_str(&raw).unwrap_or_default()
}

pub fn run(command: HookCommand) {
    let decision = match command {
        HookCommand::Shell { worktree } => {
            let input = read_hook_input();
            match input.tool_input.command {
                Some(shell_command) => safety::check_command(&shell_command, &worktree),
                None => safety::HookDecision::Allow,
            }
        }
        HookCommand::Path { worktree } => {
            let input = read_hook_input();
            let target = input.tool_input.file_path.or(input.tool_input.path);
            match target {
                Some(target) => safety::check_path(&target, &worktree),
                None => safety::HookDecision::Allow,
            }
        }
    };
    println!("{}", decision.to_json());
}
