// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency gates, priority order, pause, shutdown, daemon health.

use super::*;

#[tokio::test]
async fn max_total_caps_active_work() {
    let ctx = setup_with(1, 1, 5).await;
    ctx.seed_task(0, "first", 1).await;
    ctx.seed_task(0, "second", 1).await;

    let gate = ctx.runner.push_gated_output(handoff_output("DONE", "ok", None, None));
    ctx.dispatcher.tick().await;

    // One launch in flight, the second task not started
    assert_eq!(ctx.dispatcher.running_count(), 1);
    assert_eq!(ctx.dispatcher.state_snapshot().active_count(), 1);
    assert_eq!(ctx.epics().len(), 1);

    // At capacity, another tick starts nothing new
    ctx.dispatcher.tick().await;
    assert_eq!(ctx.epics().len(), 1);

    gate.add_permits(1);
    ctx.dispatcher.settle().await;

    // Slot freed: the second task starts on the next tick
    ctx.runner.push_output(handoff_output("DONE", "ok", None, None));
    ctx.tick_and_settle().await;
    assert_eq!(ctx.epics().len(), 2);
}

#[tokio::test]
async fn max_per_project_skips_project_but_not_others() {
    let ctx = setup_with(2, 4, 1).await;
    ctx.seed_task(0, "a1", 1).await;
    ctx.seed_task(0, "a2", 1).await;
    ctx.seed_task(1, "b1", 1).await;

    let gate0 = ctx.runner.push_gated_output(handoff_output("DONE", "ok", None, None));
    ctx.dispatcher.tick().await;
    assert_eq!(ctx.dispatcher.state_snapshot().active_for_project("proj0"), 1);

    // proj0 is at its cap; the next tick starts proj1's work instead
    let gate1 = ctx.runner.push_gated_output(handoff_output("DONE", "ok", None, None));
    ctx.dispatcher.tick().await;
    let state = ctx.dispatcher.state_snapshot();
    assert_eq!(state.active_for_project("proj0"), 1);
    assert_eq!(state.active_for_project("proj1"), 1);

    // Both projects capped now; a2 stays untouched
    ctx.dispatcher.tick().await;
    assert_eq!(ctx.epics().len(), 2);

    gate0.add_permits(1);
    gate1.add_permits(1);
    ctx.dispatcher.settle().await;
}

#[tokio::test]
async fn highest_priority_ready_item_wins() {
    let ctx = setup_with(2, 4, 2).await;
    ctx.seed_task(0, "routine", 2).await;
    ctx.seed_task(1, "urgent", 0).await;

    let gate = ctx.runner.push_gated_output(handoff_output("DONE", "ok", None, None));
    ctx.dispatcher.tick().await;

    let epics = ctx.epics();
    assert_eq!(epics.len(), 1);
    assert!(epics[0].title.contains("urgent"));
    gate.add_permits(1);
    ctx.dispatcher.settle().await;
}

#[tokio::test]
async fn paused_dispatcher_starts_nothing() {
    let ctx = setup().await;
    ctx.seed_task(0, "work", 1).await;
    ctx.dispatcher.pause();

    ctx.tick_and_settle().await;
    assert!(ctx.epics().is_empty());
    assert!(ctx.runner.requests().is_empty());

    ctx.dispatcher.resume();
    ctx.runner.push_output(handoff_output("DONE", "ok", None, None));
    ctx.tick_and_settle().await;
    assert_eq!(ctx.epics().len(), 1);
}

#[tokio::test]
async fn shutdown_skips_dispatch_passes() {
    let ctx = setup().await;
    ctx.seed_task(0, "work", 1).await;

    ctx.dispatcher.request_shutdown();
    assert!(ctx.dispatcher.is_shutting_down());
    ctx.tick_and_settle().await;
    assert!(ctx.epics().is_empty());
}

#[tokio::test]
async fn second_shutdown_request_forces() {
    let ctx = setup().await;
    ctx.dispatcher.request_shutdown();
    assert!(!ctx.dispatcher.inner.force_stop.is_cancelled());
    ctx.dispatcher.stop();
    assert!(ctx.dispatcher.inner.force_stop.is_cancelled());
}

#[tokio::test]
async fn daemon_health_restarts_stopped_daemons() {
    let ctx = setup().await;
    // Re-enable the daemon pass on every tick
    let mut config = DispatcherConfig::new(ctx.dispatcher.inner.config.whs.clone());
    config.daemon_check_ticks = 1;
    let dispatcher = Dispatcher::new(
        config,
        DispatcherDeps {
            store: ctx.store.clone(),
            worktrees: ctx.worktrees.clone(),
            runner: ctx.runner.clone(),
            notifier: ctx.notifier.clone(),
            clock: ctx.clock.clone(),
        },
    )
    .unwrap();

    dispatcher.tick().await;
    assert_eq!(ctx.store.daemon_starts(ctx.orc()), 1);
    assert_eq!(ctx.store.daemon_starts(ctx.repo()), 1);

    // Daemons are running now; no duplicate starts
    dispatcher.tick().await;
    assert_eq!(ctx.store.daemon_starts(ctx.orc()), 1);

    // A daemon that dies gets restarted on a later check
    ctx.store.set_daemon_running(ctx.orc(), false);
    dispatcher.tick().await;
    assert_eq!(ctx.store.daemon_starts(ctx.orc()), 2);
}

#[tokio::test]
async fn restart_recovers_active_work_from_state_file() {
    let ctx = setup().await;
    ctx.seed_task(0, "Add auth", 1).await;
    // Hold the launch mid-flight, then force-drop it (simulated crash)
    let gate = ctx.runner.push_gated_output(handoff_output("DONE", "ok", None, None));
    ctx.dispatcher.tick().await;
    assert_eq!(ctx.dispatcher.state_snapshot().active_count(), 1);
    gate.add_permits(1);
    ctx.dispatcher.settle().await;

    // Fresh dispatcher over the same state dir sees the persisted state
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(ctx.dispatcher.inner.config.whs.clone()),
        DispatcherDeps {
            store: ctx.store.clone(),
            worktrees: ctx.worktrees.clone(),
            runner: ctx.runner.clone(),
            notifier: ctx.notifier.clone(),
            clock: ctx.clock.clone(),
        },
    )
    .unwrap();
    // The first workflow already completed, so nothing is active
    assert!(dispatcher.state_snapshot().active_work.is_empty());
    assert!(!dispatcher.state_snapshot().paused);
}
