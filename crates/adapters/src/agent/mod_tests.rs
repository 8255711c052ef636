// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    rate_limit_words = { "Rate limit exceeded, try later", true, false },
    http_429         = { "server returned 429", true, false },
    too_many         = { "Too Many Requests", true, false },
    auth_word        = { "Authentication failed", false, true },
    http_401         = { "HTTP 401 from api", false, true },
    api_key          = { "Invalid API key provided", false, true },
    login            = { "Please run /login", false, true },
    plain            = { "agent crashed mid-turn", false, false },
)]
fn classification(message: &str, rate_limit: bool, auth: bool) {
    let err = AgentError::classify(message);
    assert_eq!(err.is_rate_limit(), rate_limit);
    assert_eq!(err.is_auth(), auth);
    assert!(err.to_string().contains(message));
}

#[test]
fn request_defaults() {
    let request = AgentRequest::new("do the thing", "/w");
    assert_eq!(request.max_turns, DEFAULT_MAX_TURNS);
    assert!(request.resume.is_none());
    assert!(request.safety_worktree.is_none());
}

#[tokio::test]
async fn fake_mints_sessions_and_records_requests() {
    let runner = FakeAgentRunner::new();
    runner.push_output("all done");

    let outcome = runner.run(AgentRequest::new("prompt", "/w")).await.unwrap();
    assert_eq!(outcome.output, "all done");
    assert_eq!(outcome.session_id, SessionId::from_string("sess-fake-1"));

    let requests = runner.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "prompt");
}

#[tokio::test]
async fn fake_resume_keeps_session() {
    let runner = FakeAgentRunner::new();
    runner.push_output("resumed");

    let session = SessionId::from_string("sess-orig");
    let outcome = runner
        .resume_with_answer(&session, "Use JWT", AgentRequest::new("", "/w"))
        .await
        .unwrap();

    assert_eq!(outcome.session_id, session);
    let request = &runner.requests()[0];
    assert_eq!(request.prompt, "Use JWT");
    assert_eq!(request.resume, Some(session));
}

#[tokio::test]
async fn fake_exhausted_script_yields_empty_outcome() {
    let runner = FakeAgentRunner::new();
    let outcome = runner.run(AgentRequest::new("p", "/w")).await.unwrap();
    assert!(outcome.output.is_empty());
    assert!(outcome.pending_question.is_none());
}

#[tokio::test]
async fn fake_replays_errors() {
    let runner = FakeAgentRunner::new();
    runner.push_error(AgentError::RateLimited("429".to_string()));
    let err = runner.run(AgentRequest::new("p", "/w")).await.unwrap_err();
    assert!(err.is_rate_limit());
}

#[test]
fn claude_hook_settings_require_hook_command() {
    let bare = ClaudeCli::new();
    let request = AgentRequest::new("p", "/w").safety_worktree("/w");
    // No hook command configured: settings are omitted entirely
    assert!(bare.hook_settings(&request.cwd).is_none());

    let wired = ClaudeCli::new().with_hook_command("/usr/local/bin/whs");
    let settings = wired.hook_settings(std::path::Path::new("/w")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&settings).unwrap();
    let hooks = &parsed["hooks"]["PreToolUse"];
    assert_eq!(hooks[0]["matcher"], "Bash");
    assert!(hooks[0]["hooks"][0]["command"]
        .as_str()
        .unwrap()
        .contains("hook shell --worktree /w"));
    assert!(hooks[1]["hooks"][0]["command"]
        .as_str()
        .unwrap()
        .contains("hook path --worktree /w"));
}
