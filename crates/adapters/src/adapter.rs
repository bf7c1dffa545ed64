// SPDX-License-Identifier: MIT

//! The scheduler adapter contract: one implementation per backend
//! (local process, SLURM, LSF, Flux), each providing script rendering,
//! submission, status polling, and cancellation.

use crate::{AdapterError, JobStatus};
use async_trait::async_trait;
use cond_core::{BatchDefaults, ResourceRequest, SubmitId};
use std::collections::HashMap;
use std::path::Path;

/// Everything an adapter needs to render one job instance's script.
pub struct RenderContext<'a> {
    /// Fully token-substituted command text; any `$(LAUNCHER)...`
    /// occurrences are still present and are resolved here.
    pub cmd: &'a str,
    pub resources: &'a ResourceRequest,
    pub batch_defaults: &'a BatchDefaults,
    pub workspace: &'a Path,
}

/// The uniform interface over local-process and batch scheduler backends.
///
/// `status` must be idempotent and side-effect-free. Batch adapters must be
/// safe for concurrent `submit`/`status` calls; the local adapter enforces
/// sequential execution of the jobs it owns (no concurrency across jobs, to
/// match "run on the login node" semantics).
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// Render a shell script for `ctx` at `script_path`: scheduler-native
    /// resource headers, the resolved `$(LAUNCHER)` wrapper, then the
    /// command text. Rendering is idempotent: the same inputs always
    /// produce byte-identical output.
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, AdapterError>;

    /// Submit a rendered script, returning the scheduler-assigned submit id
    /// (for the local adapter, the forked child's pid).
    async fn submit(&self, script_path: &Path) -> Result<SubmitId, AdapterError>;

    /// Query the current status of a batch of submit ids.
    async fn status(
        &self,
        submit_ids: &[SubmitId],
    ) -> Result<HashMap<SubmitId, JobStatus>, AdapterError>;

    /// Best-effort termination of a batch of submit ids.
    async fn cancel(&self, submit_ids: &[SubmitId]) -> Result<(), AdapterError>;
}
