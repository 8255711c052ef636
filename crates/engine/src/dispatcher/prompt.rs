// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt assembly for a workflow step.
//!
//! The prompt is the per-role brief from the project's agents directory
//! (when one exists), the work item, accumulated context from prior
//! steps, and the handoff instructions.

use whs_core::{ActiveWork, Issue, ProjectConfig};

const HANDOFF_INSTRUCTIONS: &str = "When you are finished, hand off by writing \
`.whs-handoff.json` at the worktree root, or by emitting a fenced yaml block, containing: \
`next_agent` (one of implementation, quality_review, release_manager, ux_specialist, \
architect, planner, DONE, BLOCKED), `context` (free text for the next agent), and optionally \
`pr_number` and `ci_status` (pending|passed|failed). Use DONE only when the work item is \
fully complete, BLOCKED when a human must intervene.";

/// Build the prompt for one step run.
pub fn build_step_prompt(
    project: &ProjectConfig,
    source: Option<&Issue>,
    work: &ActiveWork,
    prior_context: &str,
) -> String {
    let mut sections = Vec::new();

    let brief_path =
        project.repo_path.join(&project.agents_path).join(format!("{}.md", work.agent));
    match std::fs::read_to_string(&brief_path) {
        Ok(brief) => sections.push(brief.trim_end().to_string()),
        Err(_) => {
            sections.push(format!(
                "You are the {} agent working autonomously on the {} project.",
                work.agent, project.name
            ));
        }
    }

    let mut item = format!("# Work item\n{}: {}", work.work_item_id, work.work_item_title);
    if let Some(source) = source {
        if !source.description.is_empty() {
            item.push_str("\n\n");
            item.push_str(&source.description);
        }
    }
    sections.push(item);

    if !prior_context.is_empty() {
        sections.push(format!("# Context from prior steps\n{prior_context}"));
    }

    sections.push(format!("# Handoff\n{HANDOFF_INSTRUCTIONS}"));
    sections.join("\n\n")
}
