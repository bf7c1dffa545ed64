// SPDX-License-Identifier: MIT

//! Conductor lock acquisition and the foreground/background run split.

use cond_adapters::SchedulerAdapter;
use cond_core::{BatchDefaults, Clock, ExecutionGraph, RuntimeConfig};
use fs2::FileExt;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine the log directory")]
    NoLogDir,

    #[error("conductor already running against this study")]
    LockFailed(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("conductor error: {0}")]
    Conductor(#[from] cond_engine::ConductorError),
}

/// Holds the study's exclusive lock file; the lock is released when this is
/// dropped (closing the file descriptor releases the `flock`).
pub struct LockGuard {
    #[allow(dead_code)]
    file: File,
}

/// Acquire the per-study exclusive lock, failing fast if another conductor
/// already holds it.
pub fn acquire_lock(lock_path: &Path) -> Result<LockGuard, LifecycleError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(lock_path)?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    Ok(LockGuard { file })
}

/// Run the conductor loop to completion in this process, holding the study
/// lock for the duration.
pub async fn run_foreground<C: Clock>(
    config: &Config,
    graph: &mut ExecutionGraph,
    runtime: &mut RuntimeConfig,
    batch_defaults: &BatchDefaults,
    adapter: &dyn SchedulerAdapter,
    clock: &C,
) -> Result<(), LifecycleError> {
    let _lock = acquire_lock(&config.lock_path)?;
    info!(pid = std::process::id(), study = %config.study_root.display(), "conductor starting");
    cond_engine::run_loop(graph, runtime, batch_defaults, &config.study_root, adapter, clock).await?;
    Ok(())
}

/// Re-exec the current binary with `args` (expected to include `--fg`),
/// stdio redirected to `<study_root>/logs/conductor.{out,err}`, detached
/// from this process so `run` can return immediately. No `fork()`: this is
/// a plain subprocess spawn, safe under `#![forbid(unsafe_code)]`.
pub fn spawn_background<I, S>(args: I, study_root: &Path) -> Result<u32, LifecycleError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let exe = std::env::current_exe()?;
    let logs_dir = study_root.join("logs");
    std::fs::create_dir_all(&logs_dir)?;
    let stdout = File::create(logs_dir.join("conductor.out"))?;
    let stderr = File::create(logs_dir.join("conductor.err"))?;

    let child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()?;
    info!(pid = child.id(), study = %study_root.display(), "conductor launched in background");
    Ok(child.id())
}
