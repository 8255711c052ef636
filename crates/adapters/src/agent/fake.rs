// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted agent runner for testing.

use super::{AgentError, AgentOutcome, AgentRequest, AgentRunner, PendingAsk};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use whs_core::SessionId;

/// One scripted reply.
pub enum ScriptedRun {
    Outcome(AgentOutcome),
    Error(AgentError),
    /// Outcome held until the gate gets a permit, so a test can observe
    /// the dispatcher with a launch in flight.
    Gated { gate: std::sync::Arc<tokio::sync::Semaphore>, outcome: AgentOutcome },
}

#[derive(Default)]
struct FakeRunnerState {
    script: Vec<ScriptedRun>,
    requests: Vec<AgentRequest>,
    aborts: usize,
    next_session: u64,
}

/// Fake agent runner replaying scripted outcomes in order.
///
/// An exhausted script yields an empty-output outcome (which resolves to
/// a BLOCKED handoff downstream) rather than panicking inside a spawned
/// launch task.
#[derive(Clone, Default)]
pub struct FakeAgentRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
}

impl FakeAgentRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful run whose output is the given text.
    pub fn push_output(&self, output: impl Into<String>) {
        self.push(ScriptedRun::Outcome(AgentOutcome {
            session_id: SessionId::empty(),
            output: output.into(),
            cost_usd: 0.05,
            turns: 3,
            duration_ms: 1200,
            pending_question: None,
        }));
    }

    /// Script a successful run that ends in a pending question.
    pub fn push_question(&self, ask: PendingAsk) {
        self.push(ScriptedRun::Outcome(AgentOutcome {
            session_id: SessionId::empty(),
            output: String::new(),
            cost_usd: 0.02,
            turns: 2,
            duration_ms: 800,
            pending_question: Some(ask),
        }));
    }

    pub fn push_error(&self, error: AgentError) {
        self.push(ScriptedRun::Error(error));
    }

    /// Script a run that blocks until the returned gate is released with
    /// [`tokio::sync::Semaphore::add_permits`].
    pub fn push_gated_output(
        &self,
        output: impl Into<String>,
    ) -> std::sync::Arc<tokio::sync::Semaphore> {
        let gate = std::sync::Arc::new(tokio::sync::Semaphore::new(0));
        self.push(ScriptedRun::Gated {
            gate: gate.clone(),
            outcome: AgentOutcome {
                session_id: SessionId::empty(),
                output: output.into(),
                cost_usd: 0.05,
                turns: 3,
                duration_ms: 1200,
                pending_question: None,
            },
        });
        gate
    }

    pub fn push(&self, run: ScriptedRun) {
        self.inner.lock().script.push(run);
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.inner.lock().requests.clone()
    }

    pub fn aborts(&self) -> usize {
        self.inner.lock().aborts
    }
}

#[async_trait]
impl AgentRunner for FakeAgentRunner {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutcome, AgentError> {
        // Pop the scripted reply under the lock, await gates outside it.
        let (scripted, resumed) = {
            let mut state = self.inner.lock();
            let resumed = request.resume.clone();
            state.requests.push(request);
            let scripted = if state.script.is_empty() {
                ScriptedRun::Outcome(AgentOutcome {
                    session_id: SessionId::empty(),
                    output: String::new(),
                    cost_usd: 0.0,
                    turns: 0,
                    duration_ms: 0,
                    pending_question: None,
                })
            } else {
                state.script.remove(0)
            };
            (scripted, resumed)
        };

        let mut outcome = match scripted {
            ScriptedRun::Error(e) => return Err(e),
            ScriptedRun::Outcome(outcome) => outcome,
            ScriptedRun::Gated { gate, outcome } => {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
                outcome
            }
        };

        if outcome.session_id.is_empty() {
            // Resumes keep their session; fresh runs mint one.
            outcome.session_id = match resumed {
                Some(session) => session,
                None => {
                    let mut state = self.inner.lock();
                    state.next_session += 1;
                    SessionId::from_string(format!("sess-fake-{}", state.next_session))
                }
            };
        }
        Ok(outcome)
    }

    fn abort(&self) {
        self.inner.lock().aborts += 1;
    }
}
