// SPDX-License-Identifier: MIT

//! Error types for the expander and the conductor loop.

pub use crate::expand::ExpandError;
use cond_storage::StorageError;
use thiserror::Error;

/// Fatal conductor errors — everything else (a single adapter call failing,
/// a job exiting non-zero) is scoped to the affected node and handled
/// in-loop.
#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed update sentinel: {0}")]
    Json(#[from] serde_json::Error),
}
