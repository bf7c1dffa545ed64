// SPDX-License-Identifier: MIT

//! Scheduler-agnostic job status, reported by every adapter's `status` call.

use serde::{Deserialize, Serialize};

/// The scheduler-reported status of a submitted job. The mapping from a
/// scheduler's native state strings to this enum is total and conservative:
/// unrecognized strings map to [`JobStatus::Unknown`], never to a success
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    FinishedOk,
    FinishedError,
    Timeout,
    Cancelled,
    Unknown,
}
