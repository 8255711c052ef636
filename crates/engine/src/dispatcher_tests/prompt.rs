// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::prompt::build_step_prompt;
use whs_core::{ActiveWork, AgentRole, Issue, ProjectConfig};

fn work(agent: AgentRole) -> ActiveWork {
    ActiveWork::builder()
        .work_item_id("bd-1")
        .work_item_title("Add auth")
        .project("api")
        .agent(agent)
        .build()
}

#[test]
fn prompt_uses_role_brief_when_present() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = tmp.path().join("api");
    let agents = repo.join("docs/llm/agents");
    std::fs::create_dir_all(&agents).unwrap();
    std::fs::write(agents.join("implementation.md"), "You write careful patches.\n").unwrap();

    let project = ProjectConfig::new("api", &repo);
    let prompt = build_step_prompt(&project, None, &work(AgentRole::Implementation), "");

    assert!(prompt.starts_with("You write careful patches."));
    assert!(prompt.contains("# Work item\nbd-1: Add auth"));
    assert!(prompt.contains("# Handoff"));
    assert!(prompt.contains("next_agent"));
}

#[test]
fn prompt_falls_back_without_brief() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectConfig::new("api", tmp.path().join("api"));
    let prompt = build_step_prompt(&project, None, &work(AgentRole::QualityReview), "");

    assert!(prompt.starts_with("You are the quality_review agent"));
}

#[test]
fn prompt_includes_source_description_and_context() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectConfig::new("api", tmp.path().join("api"));
    let source = Issue::builder()
        .id("bd-1")
        .title("Add auth")
        .description("Users must be able to log in with SSO.")
        .build();

    let prompt = build_step_prompt(
        &project,
        Some(&source),
        &work(AgentRole::Implementation),
        "## implementation\nopened PR 42",
    );

    assert!(prompt.contains("Users must be able to log in with SSO."));
    assert!(prompt.contains("# Context from prior steps\n## implementation\nopened PR 42"));

    // Section order: brief, work item, context, handoff
    let item_pos = prompt.find("# Work item").unwrap();
    let context_pos = prompt.find("# Context from prior steps").unwrap();
    let handoff_pos = prompt.find("# Handoff").unwrap();
    assert!(item_pos < context_pos && context_pos < handoff_pos);
}
