// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trust-but-verify handoff resolution.
//!
//! Four tiers, first success wins. Each guards a different failure mode:
//! the handoff file survives a crash after the agent wrote it; the fenced
//! and inline parsers cover well-formed and sloppy emissions; the
//! resume-and-ask tier recovers an agent that finished without emitting;
//! BLOCKED is the floor when nothing else worked.

use std::path::Path;
use whs_adapters::{AgentRequest, AgentRunner};
use whs_core::{Handoff, NextAgent, SessionId, HANDOFF_FILE_NAME};

/// Turn budget for the forced-handoff resume.
const RESUME_MAX_TURNS: u32 = 10;

/// How much of the output tail the loose parser inspects.
const LOOSE_TAIL_CHARS: usize = 2000;

/// Lines of original output quoted in the BLOCKED fallback context.
const FALLBACK_TAIL_LINES: usize = 20;

const RESUME_PROMPT: &str = "You finished without a handoff. Emit one now: write a fenced \
yaml block containing `next_agent` (one of implementation, quality_review, release_manager, \
ux_specialist, architect, planner, DONE, BLOCKED) and `context` describing the state of the \
work, plus optional `pr_number` and `ci_status`. Nothing else.";

/// Resolves a structured handoff from an agent run.
pub struct HandoffResolver;

impl HandoffResolver {
    /// Tier 1: consume `<worktree>/.whs-handoff.json`.
    ///
    /// The file is removed only when it parses; an unparseable file is
    /// left in place for diagnosis.
    pub fn take_handoff_file(worktree: &Path) -> Option<Handoff> {
        let path = worktree.join(HANDOFF_FILE_NAME);
        let contents = std::fs::read_to_string(&path).ok()?;
        match Handoff::from_json_str(&contents) {
            Ok(handoff) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove handoff file");
                }
                Some(handoff)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unparseable handoff file");
                None
            }
        }
    }

    /// Tier 2: structured text parse over agent output.
    pub fn parse_output(output: &str) -> Option<Handoff> {
        for block in fenced_blocks(output, &["yaml", "yml"]) {
            if let Ok(handoff) = Handoff::from_yaml_str(&block) {
                return Some(handoff);
            }
        }
        for block in fenced_blocks(output, &["json"]) {
            if let Ok(handoff) = Handoff::from_json_str(&block) {
                return Some(handoff);
            }
        }
        if let Some(handoff) = parse_inline(output) {
            return Some(handoff);
        }
        parse_loose(output)
    }

    /// Resolve through all four tiers. Never fails: the floor is a
    /// BLOCKED handoff quoting the output tail.
    pub async fn resolve<R: AgentRunner>(
        worktree: &Path,
        output: &str,
        resume: Option<(&R, &SessionId)>,
    ) -> Handoff {
        if let Some(handoff) = Self::take_handoff_file(worktree) {
            return handoff;
        }
        if let Some(handoff) = Self::parse_output(output) {
            return handoff;
        }

        // Tier 3: resume the session and demand a handoff.
        if let Some((runner, session)) = resume {
            tracing::info!(%session, "no handoff in output; resuming to ask for one");
            let request = AgentRequest::new(RESUME_PROMPT, worktree)
                .max_turns(RESUME_MAX_TURNS)
                .resume(session.clone())
                .safety_worktree(worktree);
            match runner.run(request).await {
                Ok(outcome) => {
                    if let Some(handoff) = Self::take_handoff_file(worktree) {
                        return handoff;
                    }
                    if let Some(handoff) = Self::parse_output(&outcome.output) {
                        return handoff;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "forced-handoff resume failed");
                }
            }
        }

        Handoff::blocked(format!(
            "No handoff could be resolved from the agent output. Last output:\n{}",
            tail_lines(output, FALLBACK_TAIL_LINES)
        ))
    }
}

/// Contents of fenced code blocks whose info string matches one of
/// `labels`, in document order.
fn fenced_blocks(output: &str, labels: &[&str]) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        match &mut current {
            Some(lines) => {
                if trimmed.starts_with("```") {
                    blocks.push(lines.join("\n"));
                    current = None;
                } else {
                    lines.push(line);
                }
            }
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    if labels.iter().any(|l| info.trim().eq_ignore_ascii_case(l)) {
                        current = Some(Vec::new());
                    }
                }
            }
        }
    }
    blocks
}

/// Inline section: a `next_agent:` line start followed by further
/// `key: value` lines, one of which must be `context:`.
fn parse_inline(output: &str) -> Option<Handoff> {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.iter().position(|l| l.trim_start().starts_with("next_agent:"))?;

    let mut section = Vec::new();
    for line in &lines[start..] {
        let trimmed = line.trim_start();
        if section.is_empty() || looks_like_mapping_line(trimmed) {
            section.push(trimmed);
        } else {
            break;
        }
    }
    let text = section.join("\n");
    if !text.contains("context:") {
        return None;
    }
    Handoff::from_yaml_str(&text).ok()
}

fn looks_like_mapping_line(line: &str) -> bool {
    let Some(colon) = line.find(':') else {
        return false;
    };
    !line[..colon].is_empty()
        && line[..colon].chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Loose match in the output tail: `next_agent: <name>` plus an optional
/// single-line `context:`.
fn parse_loose(output: &str) -> Option<Handoff> {
    if output.is_empty() {
        return None;
    }
    let mut tail_start = output.len().saturating_sub(LOOSE_TAIL_CHARS);
    // Stay on a char boundary for multi-byte output
    while tail_start < output.len() && !output.is_char_boundary(tail_start) {
        tail_start += 1;
    }
    let tail = &output[tail_start..];

    let captures = loose_regex(&LOOSE_AGENT_RE, r"next_agent:\s*([A-Za-z_]+)")?.captures(tail)?;
    let next_agent: NextAgent = captures.get(1)?.as_str().parse().ok()?;

    let context = loose_regex(&LOOSE_CONTEXT_RE, r"context:\s*(.+)")
        .and_then(|re| re.captures(tail))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(Handoff::new(next_agent, context))
}

static LOOSE_AGENT_RE: std::sync::OnceLock<Option<regex::Regex>> = std::sync::OnceLock::new();
static LOOSE_CONTEXT_RE: std::sync::OnceLock<Option<regex::Regex>> = std::sync::OnceLock::new();

fn loose_regex(
    cell: &'static std::sync::OnceLock<Option<regex::Regex>>,
    pattern: &str,
) -> Option<&'static regex::Regex> {
    cell.get_or_init(|| regex::Regex::new(pattern).ok()).as_ref()
}

fn tail_lines(output: &str, n: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;
