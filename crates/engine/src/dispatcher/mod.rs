// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatcher: a single-process cooperative scheduler.
//!
//! One tick at a time; a tick issues asynchronous launches that run in
//! parallel but share the process. All shared-state mutations go through
//! pure functions on [`DispatcherState`] under one mutex, and every
//! mutation is persisted atomically, so a restarted dispatcher resumes
//! from what it observed last.

mod launch;
mod prompt;
mod tick;

pub use prompt::build_step_prompt;

use crate::metrics::MetricsStore;
use crate::state::StateStore;
use crate::workflow::WorkflowEngine;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use whs_adapters::{AgentRunner, IssueStore, Notifier, WorktreeProvider};
use whs_core::{ActiveWork, Clock, DispatcherState, IssueId, WhsConfig};

/// Tunables around the scheduling loop.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub whs: WhsConfig,
    /// Time between ticks.
    pub tick_interval: Duration,
    /// How long a graceful shutdown waits for running launches.
    pub drain_timeout: Duration,
    /// Tracker daemon health is checked every this many ticks.
    pub daemon_check_ticks: u64,
    /// Sync branch handed to tracker daemons.
    pub sync_branch: String,
    /// Install the pre-tool safety hooks on agent runs.
    pub safety_enabled: bool,
}

impl DispatcherConfig {
    pub fn new(whs: WhsConfig) -> Self {
        Self {
            whs,
            tick_interval: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(300),
            daemon_check_ticks: 60,
            sync_branch: "beads-sync".to_string(),
            safety_enabled: true,
        }
    }
}

/// External collaborators the dispatcher runs against.
pub struct DispatcherDeps<S, W, R, N, C> {
    pub store: S,
    pub worktrees: W,
    pub runner: R,
    pub notifier: N,
    pub clock: C,
}

struct Inner<S, W, R, N, C> {
    config: DispatcherConfig,
    engine: WorkflowEngine<S>,
    deps: DispatcherDeps<S, W, R, N, C>,
    state: Mutex<DispatcherState>,
    state_store: StateStore,
    metrics: MetricsStore,
    /// One launch task per work item. Pruned when tasks finish; the tick
    /// body is the only writer, so no cross-task coordination is needed.
    running: Mutex<HashMap<IssueId, tokio::task::JoinHandle<()>>>,
    shutdown: CancellationToken,
    force_stop: CancellationToken,
    shutdown_requests: AtomicU32,
    ticks: AtomicU64,
}

/// The scheduler. Cheap to clone; launches carry a clone into their task.
pub struct Dispatcher<S, W, R, N, C> {
    inner: Arc<Inner<S, W, R, N, C>>,
}

impl<S, W, R, N, C> Clone for Dispatcher<S, W, R, N, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, W, R, N, C> Dispatcher<S, W, R, N, C>
where
    S: IssueStore,
    W: WorktreeProvider,
    R: AgentRunner,
    N: Notifier,
    C: Clock,
{
    /// Create a dispatcher, loading persisted state from the orchestrator's
    /// state file.
    pub fn new(
        config: DispatcherConfig,
        deps: DispatcherDeps<S, W, R, N, C>,
    ) -> Result<Self, crate::error::EngineError> {
        let state_store = StateStore::for_orchestrator(&config.whs.orchestrator_path);
        let state = state_store.load()?;
        let metrics = MetricsStore::for_state_dir(
            state_store.path().parent().unwrap_or(&config.whs.orchestrator_path),
        );
        let engine =
            WorkflowEngine::new(deps.store.clone(), config.whs.orchestrator_path.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                engine,
                deps,
                state: Mutex::new(state),
                state_store,
                metrics,
                running: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                force_stop: CancellationToken::new(),
                shutdown_requests: AtomicU32::new(0),
                ticks: AtomicU64::new(0),
            }),
        })
    }

    /// Run until shutdown, then drain launches and persist state.
    pub async fn run(&self) {
        tracing::info!(
            orchestrator = %self.inner.config.whs.orchestrator_path.display(),
            projects = self.inner.config.whs.projects.len(),
            "dispatcher running"
        );
        loop {
            if self.inner.force_stop.is_cancelled() {
                break;
            }
            self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(self.inner.config.tick_interval) => {}
                _ = self.inner.shutdown.cancelled() => break,
            }
        }
        self.drain().await;
        self.persist_state();
        tracing::info!("dispatcher stopped");
    }

    /// First call: stop starting new work and wait (bounded) for running
    /// launches. Second call: force immediate stop.
    pub fn request_shutdown(&self) {
        let previous = self.inner.shutdown_requests.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            tracing::info!("shutdown requested; draining running launches");
            self.inner.shutdown.cancel();
        } else {
            tracing::warn!("second shutdown request; forcing stop");
            self.inner.force_stop.cancel();
        }
    }

    /// Alias for [`request_shutdown`](Self::request_shutdown).
    pub fn stop(&self) {
        self.request_shutdown();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop starting new work; running work is left alone.
    pub fn pause(&self) {
        let now = self.inner.deps.clock.epoch_ms();
        self.update_state(|s| s.with_paused(true, now));
        tracing::info!("dispatcher paused");
    }

    pub fn resume(&self) {
        let now = self.inner.deps.clock.epoch_ms();
        self.update_state(|s| s.with_paused(false, now));
        tracing::info!("dispatcher resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Current state value (a clone; the live value stays behind the
    /// mutex).
    pub fn state_snapshot(&self) -> DispatcherState {
        self.inner.state.lock().clone()
    }

    /// Launches that are still running.
    pub fn running_count(&self) -> usize {
        self.inner.running.lock().values().filter(|h| !h.is_finished()).count()
    }

    /// Await every outstanding launch. Test hook and shutdown helper.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<_> = {
                let mut running = self.inner.running.lock();
                running.drain().map(|(_, h)| h).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }

    async fn drain(&self) {
        if self.inner.running.lock().is_empty() {
            return;
        }
        tracing::info!("waiting for running launches");
        let wait = self.settle();
        tokio::select! {
            result = tokio::time::timeout(self.inner.config.drain_timeout, wait) => {
                if result.is_err() {
                    tracing::warn!("drain timeout elapsed; abandoning launches");
                }
            }
            _ = self.inner.force_stop.cancelled() => {
                tracing::warn!("force stop; abandoning launches");
            }
        }
    }

    /// Apply a pure state transition and persist the result atomically.
    pub(crate) fn update_state(
        &self,
        f: impl FnOnce(DispatcherState) -> DispatcherState,
    ) -> DispatcherState {
        let new_state = {
            let mut guard = self.inner.state.lock();
            let new_state = f(std::mem::take(&mut *guard));
            *guard = new_state.clone();
            new_state
        };
        if let Err(e) = self.inner.state_store.save(&new_state) {
            tracing::error!(error = %e, "failed to persist dispatcher state");
        }
        new_state
    }

    fn persist_state(&self) {
        let state = self.state_snapshot();
        if let Err(e) = self.inner.state_store.save(&state) {
            tracing::error!(error = %e, "failed to persist dispatcher state");
        }
    }

    pub(crate) fn engine(&self) -> &WorkflowEngine<S> {
        &self.inner.engine
    }

    pub(crate) fn clock_ms(&self) -> u64 {
        self.inner.deps.clock.epoch_ms()
    }

    /// True when a live launch task exists for the work item.
    pub(crate) fn launch_running(&self, work_item_id: &IssueId) -> bool {
        self.inner
            .running
            .lock()
            .get(work_item_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the launch task for a step and track it.
    pub(crate) fn spawn_launch(&self, work: ActiveWork) {
        let dispatcher = self.clone();
        let work_item_id = work.work_item_id.clone();
        let handle = tokio::spawn(async move {
            dispatcher.run_step(work).await;
        });
        self.inner.running.lock().insert(work_item_id, handle);
    }

    /// Drop finished launch handles. Called at the top of each tick; the
    /// tick body is single-threaded so this is the map's only writer
    /// besides [`spawn_launch`](Self::spawn_launch).
    pub(crate) fn prune_finished(&self) {
        self.inner.running.lock().retain(|_, h| !h.is_finished());
    }

    // Best-effort notifier wrappers: failures are logged and swallowed.

    pub(crate) async fn notify_progress(&self, work: &ActiveWork, message: &str) {
        if let Err(e) = self.inner.deps.notifier.notify_progress(work, message).await {
            tracing::warn!(error = %e, "notify_progress failed");
        }
    }

    pub(crate) async fn notify_question(&self, question: &whs_core::PendingQuestion) {
        if let Err(e) = self.inner.deps.notifier.notify_question(question).await {
            tracing::warn!(error = %e, "notify_question failed");
        }
    }

    pub(crate) async fn notify_complete(&self, work: &ActiveWork, outcome: &str) {
        if let Err(e) = self.inner.deps.notifier.notify_complete(work, outcome).await {
            tracing::warn!(error = %e, "notify_complete failed");
        }
    }

    pub(crate) async fn notify_error(&self, work: &ActiveWork, error: &str) {
        if let Err(e) = self.inner.deps.notifier.notify_error(work, error).await {
            tracing::warn!(error = %e, "notify_error failed");
        }
    }

    pub(crate) async fn notify_rate_limit(&self, message: &str) {
        if let Err(e) = self.inner.deps.notifier.notify_rate_limit(message).await {
            tracing::warn!(error = %e, "notify_rate_limit failed");
        }
    }
}

#[cfg(test)]
#[path = "../dispatcher_tests/mod.rs"]
mod tests;
