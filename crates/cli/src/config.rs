// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration discovery.
//!
//! Search order: an explicit `--config` path, then `.whs/config.json`
//! walking up from the invocation directory, then the home config
//! (`~/.whs/config.json`). A project directory may hold a pointer config
//! (`{"orchestratorPath": ...}`) that redirects to the orchestrator's own
//! config; one hop is followed.

use crate::exit_error::ExitError;
use std::path::{Path, PathBuf};
use whs_core::{PointerConfig, WhsConfig};

const CONFIG_RELATIVE: &str = ".whs/config.json";

/// Load the orchestrator config per the search order.
pub fn load_config(explicit: Option<&Path>) -> Result<WhsConfig, ExitError> {
    if let Some(path) = explicit {
        return parse_config_file(path, true);
    }

    let cwd = std::env::current_dir()
        .map_err(|e| ExitError::config(format!("cannot determine working directory: {e}")))?;
    if let Some(found) = find_config_file(&cwd) {
        return parse_config_file(&found, true);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(CONFIG_RELATIVE);
        if home_config.exists() {
            return parse_config_file(&home_config, true);
        }
    }

    Err(ExitError::config(
        "no .whs/config.json found (searched up from the current directory and in $HOME)",
    ))
}

/// Nearest `.whs/config.json` walking up from `start`.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_RELATIVE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// Parse a config file, following a pointer config once.
fn parse_config_file(path: &Path, follow_pointer: bool) -> Result<WhsConfig, ExitError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ExitError::config(format!("cannot read {}: {e}", path.display())))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| ExitError::config(format!("invalid JSON in {}: {e}", path.display())))?;

    // A pointer config has no project list; it redirects to the
    // orchestrator's own config file.
    if value.get("projects").is_none() {
        if !follow_pointer {
            return Err(ExitError::config(format!(
                "{} is a pointer config pointing at another pointer",
                path.display()
            )));
        }
        let pointer: PointerConfig = serde_json::from_value(value)
            .map_err(|e| ExitError::config(format!("invalid config {}: {e}", path.display())))?;
        let target = pointer.orchestrator_path.join(CONFIG_RELATIVE);
        return parse_config_file(&target, false);
    }

    serde_json::from_value(value)
        .map_err(|e| ExitError::config(format!("invalid config {}: {e}", path.display())))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
