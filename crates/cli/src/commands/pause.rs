// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs pause` / `whs resume` - signal the running dispatcher.

use crate::exit_error::ExitError;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use whs_core::WhsConfig;
use whs_engine::{DispatcherLock, StateStore};

pub fn pause(config: WhsConfig) -> Result<(), ExitError> {
    send(config, Signal::SIGUSR1, "paused")
}

pub fn resume(config: WhsConfig) -> Result<(), ExitError> {
    send(config, Signal::SIGUSR2, "resumed")
}

fn send(config: WhsConfig, signal: Signal, verb: &str) -> Result<(), ExitError> {
    let store = StateStore::for_orchestrator(&config.orchestrator_path);
    let info = DispatcherLock::read(&store.lock_path())
        .ok_or_else(|| ExitError::new(1, "no dispatcher is running"))?;
    if DispatcherLock::is_stale(&info) {
        return Err(ExitError::new(
            1,
            format!("no dispatcher is running (stale lock from pid {})", info.pid),
        ));
    }

    let pid = i32::try_from(info.pid)
        .map_err(|_| ExitError::new(1, format!("implausible pid in lock file: {}", info.pid)))?;
    kill(Pid::from_raw(pid), signal)
        .map_err(|e| ExitError::new(1, format!("cannot signal pid {pid}: {e}")))?;
    println!("dispatcher (pid {pid}) {verb}");
    Ok(())
}
