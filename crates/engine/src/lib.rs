// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! The study expander and the persistent conductor loop that drives an
//! [`cond_core::ExecutionGraph`] to a terminal state.

pub mod conductor;
pub mod error;
pub mod expand;
pub mod sentinel;

pub use conductor::{
    run_iteration, run_loop, IterationOutcome, GRAPH_SNAPSHOT_FILENAME, STATUS_SNAPSHOT_FILENAME,
};
pub use error::ConductorError;
pub use expand::{expand, ExpandContext, ExpandError};
