// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whs doctor` - read-only pre-flight checks.

use crate::exit_error::{ExitError, EXIT_UNHEALTHY};
use whs_adapters::{BeadsCli, GhCli, WorktrunkCli};
use whs_core::WhsConfig;
use whs_engine::{CheckStatus, Doctor};

pub async fn doctor(config: WhsConfig) -> Result<(), ExitError> {
    let doctor = Doctor::new(BeadsCli::new(), WorktrunkCli::new(), GhCli::new(), config);
    let report = doctor.run().await;

    for result in &report.checks {
        let marker = match result.status {
            CheckStatus::Pass => "ok  ",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "FAIL",
        };
        println!("[{marker}] {}: {}", result.name, result.message);
        for detail in &result.details {
            println!("       - {detail}");
        }
    }

    if report.ok() {
        Ok(())
    } else {
        Err(ExitError::new(EXIT_UNHEALTHY, "one or more doctor checks failed"))
    }
}
