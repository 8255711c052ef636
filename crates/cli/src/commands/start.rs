// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs start` - run the dispatcher in the foreground.

use crate::exit_error::ExitError;
use crate::logging;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use whs_adapters::{
    AgentRunner, BeadsCli, ClaudeCli, DesktopNotifier, IssueStore, LogNotifier, Notifier,
    WorktreeProvider, WorktrunkCli,
};
use whs_core::{Clock, NotifierKind, SystemClock, WhsConfig};
use whs_engine::state::state_dir;
use whs_engine::{Dispatcher, DispatcherConfig, DispatcherDeps, DispatcherLock, LockError, StateStore};

fn duration_env(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

pub async fn start(config: WhsConfig) -> Result<(), ExitError> {
    let dir = state_dir(&config.orchestrator_path);
    let _log_guard = logging::init_with_file(&dir);

    // Exclusive ownership first: two dispatchers on one orchestrator
    // would double-dispatch every ready step.
    let state_store = StateStore::for_orchestrator(&config.orchestrator_path);
    let clock = SystemClock;
    let _lock = match DispatcherLock::acquire(state_store.lock_path(), clock.epoch_ms()) {
        Ok(lock) => lock,
        Err(LockError::Held(info)) => {
            return Err(ExitError::locked(format!(
                "another dispatcher is running (pid {}, started at {})",
                info.pid, info.started_at
            )));
        }
        Err(e) => return Err(ExitError::locked(format!("cannot acquire dispatcher lock: {e}"))),
    };

    let mut dispatcher_config = DispatcherConfig::new(config.clone());
    dispatcher_config.tick_interval =
        duration_env("WHS_TICK_MS", dispatcher_config.tick_interval);
    dispatcher_config.drain_timeout =
        duration_env("WHS_DRAIN_TIMEOUT_MS", dispatcher_config.drain_timeout);

    let runner = match std::env::current_exe() {
        Ok(exe) => ClaudeCli::new().with_hook_command(exe.display().to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "cannot resolve own binary; safety hooks disabled");
            ClaudeCli::new()
        }
    };

    match config.notifier {
        NotifierKind::Log => {
            run_dispatcher(dispatcher_config, runner, LogNotifier::new()).await
        }
        NotifierKind::Desktop => {
            run_dispatcher(dispatcher_config, runner, DesktopNotifier::new()).await
        }
    }
}

async fn run_dispatcher<N: Notifier>(
    config: DispatcherConfig,
    runner: ClaudeCli,
    notifier: N,
) -> Result<(), ExitError> {
    let deps = DispatcherDeps {
        store: BeadsCli::new(),
        worktrees: WorktrunkCli::new(),
        runner,
        notifier,
        clock: SystemClock,
    };
    let dispatcher = Dispatcher::new(config, deps)
        .map_err(|e| ExitError::new(1, format!("cannot start dispatcher: {e}")))?;

    install_signal_handlers(&dispatcher);
    dispatcher.run().await;
    Ok(())
}

/// SIGINT: graceful shutdown, twice forces. SIGUSR1/SIGUSR2: pause and
/// resume.
fn install_signal_handlers<S, W, R, N, C>(dispatcher: &Dispatcher<S, W, R, N, C>)
where
    S: IssueStore,
    W: WorktreeProvider,
    R: AgentRunner,
    N: Notifier,
    C: Clock,
{
    let on_interrupt = dispatcher.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            on_interrupt.request_shutdown();
        }
    });

    let on_pause = dispatcher.clone();
    tokio::spawn(async move {
        let Ok(mut stream) = signal(SignalKind::user_defined1()) else {
            return;
        };
        while stream.recv().await.is_some() {
            on_pause.pause();
        }
    });

    let on_resume = dispatcher.clone();
    tokio::spawn(async move {
        let Ok(mut stream) = signal(SignalKind::user_defined2()) else {
            return;
        };
        while stream.recv().await.is_some() {
            on_resume.resume();
        }
    });
}
