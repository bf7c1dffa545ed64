// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Persistence for the study conductor: a durable [`GraphSnapshot`] the
//! conductor resumes from, and a human-readable [`status_snapshot`] table
//! for external readers (the `status` CLI command, operators tailing logs).

pub mod error;
pub mod graph_snapshot;
pub mod status_snapshot;

pub use error::StorageError;
pub use graph_snapshot::GraphSnapshot;
