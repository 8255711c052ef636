// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! whs: the While-Humans-Sleep command line.

pub mod commands;
pub mod config;
pub mod exit_error;
pub mod logging;

pub use exit_error::ExitError;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Overnight multi-project orchestrator for autonomous coding agents.
#[derive(Parser)]
#[command(name = "whs", version, about)]
pub struct Cli {
    /// Explicit config file (default: walk up for .whs/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the dispatcher in the foreground
    Start,
    /// Run read-only pre-flight checks
    Doctor,
    /// Show paused flag, active work, and pending questions
    Status,
    /// Pause the running dispatcher (no new work starts)
    Pause,
    /// Resume a paused dispatcher
    Resume,
    /// Answer a pending agent question
    Answer {
        /// Question issue id (e.g. orc-37.1.1)
        question_id: String,
        /// The answer text passed back to the agent
        answer: String,
    },
    /// Pre-tool hook handlers invoked by the agent runtime
    #[command(subcommand, hide = true)]
    Hook(commands::hook::HookCommand),
}
