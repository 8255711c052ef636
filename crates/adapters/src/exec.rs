// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess plumbing shared by the CLI-backed adapters.
//!
//! Every external tool (`bd`, `wt`, `gh`, the agent CLI) is its own
//! process; a failure surfaces as one [`CommandError`] carrying the
//! command line and captured stderr, never a panic.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Failure of an external command invocation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("`{command}` failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` produced invalid JSON: {message}")]
    InvalidJson { command: String, message: String },
}

impl CommandError {
    /// The command line that failed, for diagnostics.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Failed { command, .. }
            | CommandError::Spawn { command, .. }
            | CommandError::InvalidJson { command, .. } => command,
        }
    }
}

fn render(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Run a command in `cwd`, capturing stdout. Non-zero exit becomes
/// [`CommandError::Failed`] with trimmed stderr.
pub async fn run(program: &str, args: &[&str], cwd: &Path) -> Result<String, CommandError> {
    run_with_env(program, args, cwd, &[]).await
}

/// [`run`] with additional environment variables.
pub async fn run_with_env(
    program: &str,
    args: &[&str],
    cwd: &Path,
    env: &[(&str, &str)],
) -> Result<String, CommandError> {
    let rendered = render(program, args);
    tracing::debug!(command = %rendered, cwd = %cwd.display(), "running external command");

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        command.env(key, value);
    }

    let output = command
        .output()
        .await
        .map_err(|source| CommandError::Spawn { command: rendered.clone(), source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CommandError::Failed { command: rendered, stderr });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command and parse its stdout as JSON.
pub async fn run_json<T: serde::de::DeserializeOwned>(
    program: &str,
    args: &[&str],
    cwd: &Path,
) -> Result<T, CommandError> {
    let stdout = run(program, args, cwd).await?;
    serde_json::from_str(&stdout).map_err(|e| CommandError::InvalidJson {
        command: render(program, args),
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
