// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Process lifecycle for the conductor: a per-study lock file, log setup,
//! and the foreground/background split that lets `run` either block on the
//! conductor loop or hand it off to a detached child process.
//!
//! There is no true Unix daemon here (no `fork`): backgrounding works by
//! re-executing the current binary with `--fg` and redirected stdio, which
//! needs no `unsafe` code.

pub mod config;
pub mod lifecycle;
pub mod logging;

pub use config::Config;
pub use lifecycle::{acquire_lock, run_foreground, spawn_background, LifecycleError, LockGuard};
pub use logging::setup_logging;
