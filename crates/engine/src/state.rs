// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the dispatcher: the state file and the exclusive
//! process lock.
//!
//! State writes are atomic (write-temp-then-rename) so a crash never
//! leaves a torn file. The lock is a pid file, not an advisory flock:
//! acquisition fails only when the recorded pid is a live process, so a
//! stale lock from a crashed dispatcher never wedges the next start.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use whs_core::DispatcherState;

/// State file name under the orchestrator's `.whs` directory.
const STATE_FILE: &str = "state.json";
/// Lock file, sibling to the state file.
const LOCK_FILE: &str = "dispatcher.lock";

/// Errors from state persistence.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Resolve the dispatcher's state directory for an orchestrator.
///
/// `WHS_STATE_DIR` overrides; the default is `<orchestrator>/.whs`.
pub fn state_dir(orchestrator: &Path) -> PathBuf {
    match std::env::var_os("WHS_STATE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => orchestrator.join(".whs"),
    }
}

/// Loads and atomically saves [`DispatcherState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_orchestrator(orchestrator: &Path) -> Self {
        Self::new(state_dir(orchestrator).join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.with_file_name(LOCK_FILE)
    }

    /// Load the persisted state; a missing file is an empty state.
    pub fn load(&self) -> Result<DispatcherState, StateError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DispatcherState::default())
            }
            Err(source) => return Err(StateError::Io { path: self.path.clone(), source }),
        };
        serde_json::from_str(&contents)
            .map_err(|e| StateError::Corrupt { path: self.path.clone(), message: e.to_string() })
    }

    /// Write the state atomically: temp file in the same directory, then
    /// rename over the target.
    pub fn save(&self, state: &DispatcherState) -> Result<(), StateError> {
        let io_err = |source| StateError::Io { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StateError::Corrupt { path: self.path.clone(), message: e.to_string() })?;

        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

/// Contents of the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub pid: u32,
    pub started_at: u64,
}

/// Errors from lock acquisition.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another dispatcher is running (pid {}, started at {})", .0.pid, .0.started_at)]
    Held(LockInfo),

    #[error("failed to access lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exclusive per-orchestrator dispatcher lock.
///
/// Released by [`release`](Self::release) or on drop; stale files (dead
/// pid) are replaced silently.
#[derive(Debug)]
pub struct DispatcherLock {
    path: PathBuf,
    held: bool,
}

impl DispatcherLock {
    /// Read the lock file if present. Unparseable contents read as None.
    pub fn read(path: &Path) -> Option<LockInfo> {
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Whether a lock record points at a dead process.
    pub fn is_stale(info: &LockInfo) -> bool {
        !pid_alive(info.pid)
    }

    /// Acquire the lock for the current process.
    pub fn acquire(path: impl Into<PathBuf>, started_at_ms: u64) -> Result<Self, LockError> {
        let path = path.into();
        if let Some(existing) = Self::read(&path) {
            if existing.pid != std::process::id() && !Self::is_stale(&existing) {
                return Err(LockError::Held(existing));
            }
            tracing::info!(pid = existing.pid, "replacing stale dispatcher lock");
        }

        let io_err = |source| LockError::Io { path: path.clone(), source };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let info = LockInfo { pid: std::process::id(), started_at: started_at_ms };
        let json = serde_json::to_string(&info)
            .map_err(|e| LockError::Io { path: path.clone(), source: std::io::Error::other(e) })?;
        std::fs::write(&path, json).map_err(io_err)?;
        Ok(Self { path, held: true })
    }

    /// Best-effort unlink on graceful stop.
    pub fn release(&mut self) {
        if self.held {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
                }
            }
            self.held = false;
        }
    }
}

impl Drop for DispatcherLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Probe liveness with a null signal. EPERM still means the process
/// exists, just owned by someone else.
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
