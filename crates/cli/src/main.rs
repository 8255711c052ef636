// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs` binary entry point.

use clap::Parser;
use whs_cli::{commands, config, logging, Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Hook(hook) => {
            // Hooks are on the agent's hot path: no logging setup, no
            // config loading, always exit 0.
            commands::hook::run(hook);
            return;
        }
        Command::Start => {
            // `start` installs its own stderr+file subscriber once the
            // state dir is known.
            match config::load_config(cli.config.as_deref()) {
                Ok(whs_config) => commands::start::start(whs_config).await,
                Err(e) => Err(e),
            }
        }
        command => {
            logging::init();
            match config::load_config(cli.config.as_deref()) {
                Ok(whs_config) => match command {
                    Command::Doctor => commands::doctor::doctor(whs_config).await,
                    Command::Status => commands::status::status(whs_config),
                    Command::Pause => commands::pause::pause(whs_config),
                    Command::Resume => commands::pause::resume(whs_config),
                    Command::Answer { question_id, answer } => {
                        commands::answer::answer(whs_config, &question_id, &answer).await
                    }
                    Command::Start | Command::Hook(_) => unreachable!("handled above"),
                },
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.code);
    }
}
