// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use whs_adapters::FakeAgentRunner;
use whs_core::{AgentRole, CiStatus};

fn no_runner() -> Option<(&'static FakeAgentRunner, &'static SessionId)> {
    None
}

#[test]
fn parses_yaml_fence() {
    let output = "I opened the PR.\n\n```yaml\nnext_agent: quality_review\ncontext: PR 42\npr_number: 42\nci_status: pending\n```\nbye";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Role(AgentRole::QualityReview));
    assert_eq!(handoff.context, "PR 42");
    assert_eq!(handoff.pr_number, Some(42));
    assert_eq!(handoff.ci_status, Some(CiStatus::Pending));
}

#[test]
fn parses_yml_alias_fence() {
    let output = "```yml\nnext_agent: DONE\ncontext: merged\n```";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Done);
}

#[test]
fn parses_json_fence_with_camel_case() {
    let output = "done!\n```json\n{\"nextAgent\": \"release_manager\", \"context\": \"ship it\", \"prNumber\": \"7\"}\n```";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Role(AgentRole::ReleaseManager));
    assert_eq!(handoff.pr_number, Some(7));
}

#[test]
fn first_valid_fence_wins() {
    let output = "```yaml\nnot: a-handoff\n```\n```yaml\nnext_agent: DONE\ncontext: ok\n```\n```yaml\nnext_agent: planner\ncontext: later\n```";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Done);
}

#[test]
fn yaml_fences_take_precedence_over_json() {
    let output = "```json\n{\"next_agent\": \"planner\", \"context\": \"from json\"}\n```\n```yaml\nnext_agent: DONE\ncontext: from yaml\n```";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.context, "from yaml");
}

#[test]
fn parses_inline_section() {
    let output = "All finished. Handing off:\n\nnext_agent: implementation\ncontext: tests are red, needs a fix\npr_number: 12\n\nGood luck!";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Role(AgentRole::Implementation));
    assert_eq!(handoff.context, "tests are red, needs a fix");
    assert_eq!(handoff.pr_number, Some(12));
}

#[test]
fn inline_without_context_falls_through_to_loose() {
    // No context: key in the section, loose tier still finds the agent
    let output = "next_agent: DONE\nsomething else entirely";
    let handoff = HandoffResolver::parse_output(output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Done);
    assert_eq!(handoff.context, "");
}

#[test]
fn loose_match_in_tail() {
    let padding = "x\n".repeat(300);
    let output = format!("{padding}I think next_agent: DONE and context: merged cleanly");
    let handoff = HandoffResolver::parse_output(&output).unwrap();
    assert_eq!(handoff.next_agent, NextAgent::Done);
    assert_eq!(handoff.context, "merged cleanly");
}

#[test]
fn loose_match_ignores_text_before_the_tail() {
    // The marker sits mid-prose (no inline section) and more than 2000
    // chars from the end, so no tier matches
    let output =
        format!("I think next_agent: DONE and context: early\n{}", "padding\n".repeat(400));
    assert!(HandoffResolver::parse_output(&output).is_none());
}

#[test]
fn invalid_agent_name_is_rejected_everywhere() {
    let fenced = "```yaml\nnext_agent: shipit\ncontext: no\n```";
    assert!(HandoffResolver::parse_output(fenced).is_none());

    let loose = "next_agent: shipit";
    assert!(HandoffResolver::parse_output(loose).is_none());
}

#[test]
fn no_handoff_in_plain_prose() {
    assert!(HandoffResolver::parse_output("I did some work and stopped.").is_none());
    assert!(HandoffResolver::parse_output("").is_none());
}

#[test]
fn handoff_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let handoff = Handoff::new(NextAgent::Done, "merged");
    std::fs::write(
        dir.path().join(HANDOFF_FILE_NAME),
        serde_json::to_string(&handoff).unwrap(),
    )
    .unwrap();

    let read = HandoffResolver::take_handoff_file(dir.path()).unwrap();
    assert_eq!(read, handoff);
    // Consumed on success
    assert!(!dir.path().join(HANDOFF_FILE_NAME).exists());
}

#[test]
fn invalid_handoff_file_is_left_in_place() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(HANDOFF_FILE_NAME), "{\"next_agent\": \"nope\"}").unwrap();

    assert!(HandoffResolver::take_handoff_file(dir.path()).is_none());
    assert!(dir.path().join(HANDOFF_FILE_NAME).exists());
}

#[tokio::test]
async fn resolve_prefers_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let file_handoff = Handoff::new(NextAgent::Done, "from file");
    std::fs::write(
        dir.path().join(HANDOFF_FILE_NAME),
        serde_json::to_string(&file_handoff).unwrap(),
    )
    .unwrap();

    let output = "```yaml\nnext_agent: planner\ncontext: from output\n```";
    let resolved = HandoffResolver::resolve(dir.path(), output, no_runner()).await;
    assert_eq!(resolved.context, "from file");
}

#[tokio::test]
async fn resolve_resumes_when_output_has_no_handoff() {
    let dir = tempfile::tempdir().unwrap();
    let runner = FakeAgentRunner::new();
    runner.push_output("```yaml\nnext_agent: quality_review\ncontext: recovered\n```");
    let session = SessionId::from_string("sess-1");

    let resolved =
        HandoffResolver::resolve(dir.path(), "I stopped abruptly", Some((&runner, &session)))
            .await;
    assert_eq!(resolved.next_agent, NextAgent::Role(AgentRole::QualityReview));
    assert_eq!(resolved.context, "recovered");

    // The resume used the prior session with a tight turn budget
    let request = &runner.requests()[0];
    assert_eq!(request.resume, Some(session));
    assert_eq!(request.max_turns, 10);
    assert!(request.prompt.contains("handoff"));
}

#[tokio::test]
async fn resolve_falls_back_to_blocked_with_tail() {
    let dir = tempfile::tempdir().unwrap();
    let output = "line one\nline two\nthe agent wandered off";
    let resolved = HandoffResolver::resolve::<FakeAgentRunner>(dir.path(), output, None).await;

    assert_eq!(resolved.next_agent, NextAgent::Blocked);
    assert!(resolved.context.contains("the agent wandered off"));
}

#[tokio::test]
async fn resolve_blocked_when_resume_also_fails() {
    let dir = tempfile::tempdir().unwrap();
    let runner = FakeAgentRunner::new();
    runner.push_output("still nothing useful");
    let session = SessionId::from_string("sess-1");

    let resolved =
        HandoffResolver::resolve(dir.path(), "original output", Some((&runner, &session))).await;
    assert_eq!(resolved.next_agent, NextAgent::Blocked);
    assert!(resolved.context.contains("original output"));
}
