// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-tool safety policy applied to every agent run.
//!
//! Two checks exist: shell commands are tested against an ordered deny
//! list, and file writes are confined to the worktree. Both are pure
//! functions over the command/path text with no filesystem access, so the
//! hook handlers stay fast and deterministic.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// Outcome of a pre-tool check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    Deny { message: String },
}

impl HookDecision {
    fn deny(message: impl Into<String>) -> Self {
        HookDecision::Deny { message: message.into() }
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, HookDecision::Deny { .. })
    }

    /// The JSON the hook protocol expects: `{}` to allow, or
    /// `{"decision": "deny", "message": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            HookDecision::Allow => serde_json::json!({}),
            HookDecision::Deny { message } => {
                serde_json::json!({"decision": "deny", "message": message})
            }
        }
    }
}

struct DenyRule {
    pattern: Regex,
    reason: &'static str,
}

fn deny_rules() -> &'static [DenyRule] {
    static RULES: OnceLock<Vec<DenyRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        // (pattern, reason); first match wins
        let table: &[(&str, &str)] = &[
            (
                r"\brm\s+(?:-[A-Za-z]*[rR][A-Za-z]*\s+)(?:-[A-Za-z]+\s+)*(?:/|~)(?:$|\s|/)",
                "recursive rm against the filesystem root or home directory",
            ),
            (
                r"\brm\s+(?:-[A-Za-z]*[rR][A-Za-z]*\s+)(?:-[A-Za-z]+\s+)*\S*\*",
                "recursive rm with a wildcard target",
            ),
            (
                r"\bgit\s+push\s+[^;|&]*(?:--force(?:\s|$)|-f(?:\s|$))",
                "force push rewrites remote history",
            ),
            (r"\bgit\s+reset\s+[^;|&]*--hard", "hard reset discards local work"),
            (r"\bchmod\s+[^;|&]*-[A-Za-z]*R[A-Za-z]*[^;|&]*\b777\b", "recursive chmod 777"),
            (r"\bmkfs(?:\.[A-Za-z0-9]+)?\b", "mkfs formats a filesystem"),
            (r"\bdd\b[^;|&]*\bof=/dev/", "dd onto a device node"),
            (
                r"\b(?:curl|wget)\b[^;|&]*\|\s*(?:ba|z|da|fi)?sh\b",
                "piping a download into a shell",
            ),
            (r"\bkill\b\s+(?:-[A-Za-z0-9]+\s+)*1(?:\s|$)", "killing pid 1"),
            (r"\bkillall\b", "killall is indiscriminate"),
            (r"\bshutdown\b", "shutdown halts the host"),
            (r"\breboot\b", "reboot halts the host"),
        ];
        table
            .iter()
            .filter_map(|(pattern, reason)| {
                Regex::new(pattern).ok().map(|pattern| DenyRule { pattern, reason })
            })
            .collect()
    })
}

/// Test a shell command against the deny list, then check any `cd` for a
/// worktree escape.
pub fn check_command(command: &str, worktree: &Path) -> HookDecision {
    for rule in deny_rules() {
        if rule.pattern.is_match(command) {
            return HookDecision::deny(rule.reason);
        }
    }

    // `cd` out of the worktree defeats the file-path hook.
    for segment in command.split(|c| matches!(c, ';' | '&' | '|')) {
        let segment = segment.trim();
        if let Some(target) = segment.strip_prefix("cd ") {
            let target = target.trim().trim_matches(|c| c == '"' || c == '\'');
            if !target.is_empty() && escapes_worktree(target, worktree) {
                return HookDecision::deny(format!("cd outside the worktree: {target}"));
            }
        }
    }

    HookDecision::Allow
}

/// Deny file writes whose resolved path escapes the worktree root.
pub fn check_path(target: &str, worktree: &Path) -> HookDecision {
    if escapes_worktree(target, worktree) {
        HookDecision::deny(format!("path outside the worktree: {target}"))
    } else {
        HookDecision::Allow
    }
}

/// Lexically resolve `target` against `worktree` and test containment.
///
/// A relative path from the worktree to the target that begins with `..`
/// (or a target that stays absolute outside the worktree) escapes.
fn escapes_worktree(target: &str, worktree: &Path) -> bool {
    if target.starts_with('~') {
        return true;
    }
    let path = Path::new(target);
    let base = if path.is_absolute() { PathBuf::new() } else { worktree.to_path_buf() };

    let mut resolved = base;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                resolved = PathBuf::from(std::path::MAIN_SEPARATOR_STR);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return true;
                }
            }
            Component::Normal(part) => resolved.push(part),
        }
    }

    !resolved.starts_with(worktree)
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
