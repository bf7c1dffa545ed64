// SPDX-License-Identifier: MIT

//! Job instance: a concrete task after parameter expansion, and its state
//! machine.

use crate::id::{JobInstanceId, SubmitId};
use crate::step::ResourceRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of a job instance.
///
/// `INITIALIZED -> PENDING_SUBMIT -> RUNNING -> {FINISHED, FAILED, TIMEDOUT, CANCELLED}`.
/// `TIMEDOUT` is intermediate: it either re-enters `PENDING_SUBMIT` (if
/// `restarts < rlimit`) or terminates as `FAILED`. `FAILED` on submission
/// re-enters `PENDING_SUBMIT` up to `attempts_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Initialized,
    PendingSubmit,
    Running,
    Finished,
    Failed,
    Timedout,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Initialized => "initialized",
            JobState::PendingSubmit => "pending_submit",
            JobState::Running => "running",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
            JobState::Timedout => "timedout",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single job instance: a step template expanded against zero or one
/// parameter combinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: JobInstanceId,
    pub step_name: String,
    /// The combo_key this instance was expanded for, or `None` for an
    /// unparameterized step.
    pub combo_key: Option<String>,
    pub workspace: PathBuf,
    pub cmd: String,
    pub restart_cmd: Option<String>,
    pub resources: ResourceRequest,
    pub state: JobState,
    pub submit_id: Option<SubmitId>,
    pub submit_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub restarts: u32,
    pub attempts: u32,
}

impl JobInstance {
    pub fn new(
        id: JobInstanceId,
        step_name: impl Into<String>,
        combo_key: Option<String>,
        workspace: PathBuf,
        cmd: String,
        restart_cmd: Option<String>,
        resources: ResourceRequest,
    ) -> Self {
        Self {
            id,
            step_name: step_name.into(),
            combo_key,
            workspace,
            cmd,
            restart_cmd,
            resources,
            state: JobState::Initialized,
            submit_id: None,
            submit_time: None,
            start_time: None,
            end_time: None,
            restarts: 0,
            attempts: 0,
        }
    }

    /// Command text to use for the next submission: `restart_cmd` once a
    /// restart has been triggered by a timeout, otherwise `cmd`.
    pub fn active_cmd(&self) -> &str {
        if self.restarts > 0 {
            self.restart_cmd.as_deref().unwrap_or(&self.cmd)
        } else {
            &self.cmd
        }
    }
}
