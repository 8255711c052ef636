// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup.
//!
//! Filter resolution: `WHS_LOG` > `RUST_LOG` > `info`. The dispatcher
//! additionally mirrors everything into `<state-dir>/logs/whs.log`
//! through a non-blocking appender; the returned guard must stay alive
//! for the process lifetime.

use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    let directive = std::env::var("WHS_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    EnvFilter::new(directive)
}

/// Stderr-only logging for one-shot commands.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Stderr plus a rolling file under the state dir, for `whs start`.
pub fn init_with_file(state_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = state_dir.join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("warning: cannot create log directory {}: {e}", log_dir.display());
        init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&log_dir, "whs.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init();
    Some(guard)
}
