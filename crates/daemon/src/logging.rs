// SPDX-License-Identifier: MIT

//! Conductor log setup: a non-blocking file appender with size-based
//! rotation, `RUST_LOG`-controlled filtering, matching the layout every
//! other crate in this workspace already logs through (`tracing`).

use crate::lifecycle::LifecycleError;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate `log_path` to `.1`/`.2`/`.3` if it has grown past [`MAX_LOG_SIZE`].
/// Best-effort: a failed rotation just leaves the oversized file in place.
pub fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Install a `tracing` subscriber writing to `log_path`, non-blocking. The
/// returned [`WorkerGuard`] must be held for the process lifetime — dropping
/// it stops the background flush thread.
pub fn setup_logging(log_path: &Path) -> Result<WorkerGuard, LifecycleError> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    rotate_log_if_needed(log_path);

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().ok_or(LifecycleError::NoLogDir)?,
        log_path.file_name().ok_or(LifecycleError::NoLogDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
