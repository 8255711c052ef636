// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use whs_core::ActiveWork;

#[test]
fn load_missing_file_is_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let state = store.load().unwrap();
    assert_eq!(state, DispatcherState::default());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join(".whs/state.json"));

    let state = DispatcherState::default()
        .with_paused(true, 1)
        .with_work_added(ActiveWork::builder().work_item_id("bd-1").build(), 2);
    store.save(&state).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded, state);
    // No temp file left behind
    assert!(!store.path().with_extension("json.tmp").exists());
}

#[test]
fn save_overwrites_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    store.save(&DispatcherState::default().with_paused(true, 1)).unwrap();
    store.save(&DispatcherState::default().with_paused(false, 2)).unwrap();

    let loaded = store.load().unwrap();
    assert!(!loaded.paused);
    assert_eq!(loaded.last_updated_ms, 2);
}

#[test]
fn corrupt_state_surfaces_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = StateStore::new(&path).load().unwrap_err();
    assert!(err.to_string().contains("state.json"));
}

#[test]
fn lock_path_is_sibling_of_state() {
    let store = StateStore::new("/orc/.whs/state.json");
    assert_eq!(store.lock_path(), PathBuf::from("/orc/.whs/dispatcher.lock"));
}

#[test]
fn acquire_and_release_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dispatcher.lock");

    let mut lock = DispatcherLock::acquire(&path, 42).unwrap();
    let info = DispatcherLock::read(&path).unwrap();
    assert_eq!(info.pid, std::process::id());
    assert_eq!(info.started_at, 42);

    lock.release();
    assert!(!path.exists());
}

#[test]
fn lock_released_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dispatcher.lock");
    {
        let _lock = DispatcherLock::acquire(&path, 1).unwrap();
        assert!(path.exists());
    }
    assert!(!path.exists());
}

#[test]
fn live_foreign_pid_blocks_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dispatcher.lock");
    // pid 1 is always alive
    std::fs::write(&path, r#"{"pid": 1, "startedAt": 7}"#).unwrap();

    let err = DispatcherLock::acquire(&path, 99).unwrap_err();
    match err {
        LockError::Held(info) => {
            assert_eq!(info.pid, 1);
            assert_eq!(info.started_at, 7);
        }
        other => panic!("expected Held, got {other:?}"),
    }
    // The holder's file is untouched
    assert!(path.exists());
}

#[test]
fn stale_lock_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dispatcher.lock");
    // A pid far above any real pid_max
    std::fs::write(&path, r#"{"pid": 4000000000, "startedAt": 7}"#).unwrap();

    let lock = DispatcherLock::acquire(&path, 99).unwrap();
    let info = DispatcherLock::read(&path).unwrap();
    assert_eq!(info.pid, std::process::id());
    drop(lock);
}

#[test]
fn stale_detection() {
    assert!(DispatcherLock::is_stale(&LockInfo { pid: 4_000_000_000, started_at: 0 }));
    assert!(!DispatcherLock::is_stale(&LockInfo { pid: std::process::id(), started_at: 0 }));
}

#[test]
fn lock_info_serde_uses_camel_case() {
    let info = LockInfo { pid: 7, started_at: 9 };
    let json = serde_json::to_value(info).unwrap();
    assert_eq!(json, serde_json::json!({"pid": 7, "startedAt": 9}));
}

#[test]
fn state_dir_defaults_under_orchestrator() {
    // Only exercised when the env override is absent; CI sets it per-test
    if std::env::var_os("WHS_STATE_DIR").is_none() {
        assert_eq!(state_dir(Path::new("/orc")), PathBuf::from("/orc/.whs"));
    }
}
