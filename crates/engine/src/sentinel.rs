// SPDX-License-Identifier: MIT

//! External control sentinels: `.cancel` and `.update` files dropped into
//! the study root by the `cancel`/`update` CLI subcommands.
//!
//! Acquire/rename discipline: the conductor first renames the sentinel to a
//! `.processing` sibling (an atomic claim), applies its effect, then removes
//! the `.processing` file. If applying the effect fails, the `.processing`
//! file is renamed back to its original name rather than deleted, so the
//! signal is not silently dropped — a crash mid-handling, or an error
//! applying it, leaves a sentinel (original or `.processing`) that the next
//! iteration picks back up. Both effects (cancel, config update) are
//! idempotent, so re-applying a stale signal is always safe.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CANCEL_SENTINEL: &str = ".cancel";
pub const UPDATE_SENTINEL: &str = ".update";

/// A claimed sentinel, renamed out of the way but not yet resolved.
pub struct Claimed {
    processing_path: PathBuf,
    original_path: PathBuf,
}

impl Claimed {
    /// The effect was applied successfully: delete the claim for good.
    pub fn confirm(self) -> std::io::Result<()> {
        fs::remove_file(&self.processing_path)
    }

    /// The effect failed: hand the signal back so the next iteration retries it.
    pub fn release(self) -> std::io::Result<()> {
        fs::rename(&self.processing_path, &self.original_path)
    }

    pub fn read_to_string(&self) -> std::io::Result<String> {
        fs::read_to_string(&self.processing_path)
    }
}

fn processing_path(study_root: &Path, name: &str) -> PathBuf {
    study_root.join(format!("{name}.processing"))
}

/// Claim `name` in `study_root`, whether it is present under its normal name
/// or was left as a `.processing` claim by a previous crashed iteration.
pub fn claim(study_root: &Path, name: &str) -> std::io::Result<Option<Claimed>> {
    let original_path = study_root.join(name);
    let processing = processing_path(study_root, name);

    if processing.exists() {
        return Ok(Some(Claimed {
            processing_path: processing,
            original_path,
        }));
    }
    if original_path.exists() {
        fs::rename(&original_path, &processing)?;
        return Ok(Some(Claimed {
            processing_path: processing,
            original_path,
        }));
    }
    Ok(None)
}

/// New values for a subset of [`cond_core::RuntimeConfig`] fields, written
/// by the `update` CLI subcommand as the `.update` sentinel's JSON body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub rlimit: Option<u32>,
    pub throttle: Option<u32>,
    pub sleep_interval: Option<u64>,
}
