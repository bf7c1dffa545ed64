// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Scheduler adapters: the uniform interface over local-process and batch
//! backends (local, SLURM, LSF, Flux), plus `$(LAUNCHER)` resolution.

pub mod adapter;
pub mod error;
#[cfg(feature = "test-support")]
pub mod fake;
pub mod factory;
pub mod flux;
pub mod launcher;
pub mod local;
pub mod lsf;
pub mod slurm;
pub mod status;

pub use adapter::{RenderContext, SchedulerAdapter};
pub use error::AdapterError;
#[cfg(feature = "test-support")]
pub use fake::FakeAdapter;
pub use factory::build_adapter;
pub use flux::FluxAdapter;
pub use launcher::{expand_launcher_tokens, LauncherRequest};
pub use local::LocalAdapter;
pub use lsf::LsfAdapter;
pub use slurm::SlurmAdapter;
pub use status::JobStatus;
