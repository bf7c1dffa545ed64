// SPDX-License-Identifier: MIT

//! SLURM adapter: `sbatch`/`squeue`/`scancel`.

use crate::adapter::{RenderContext, SchedulerAdapter};
use crate::launcher::expand_launcher_tokens;
use crate::{AdapterError, JobStatus};
use async_trait::async_trait;
use cond_core::SubmitId;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

const SCHEDULER_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SlurmAdapter;

impl SlurmAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SlurmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerAdapter for SlurmAdapter {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, AdapterError> {
        let merged = ctx.batch_defaults.resources.merged_with(ctx.resources);
        let mut lines = vec!["#!/bin/sh".to_string()];
        if let Some(nodes) = merged.nodes {
            lines.push(format!("#SBATCH --nodes={nodes}"));
        }
        if let Some(procs) = merged.procs {
            lines.push(format!("#SBATCH --ntasks={procs}"));
        }
        if let Some(walltime) = &merged.walltime {
            lines.push(format!("#SBATCH --time={walltime}"));
        }
        if let Some(cores) = merged.cores_per_task {
            lines.push(format!("#SBATCH --cpus-per-task={cores}"));
        }
        if let Some(gpus) = merged.gpus {
            lines.push(format!("#SBATCH --gpus={gpus}"));
        }
        if merged.exclusive == Some(true) {
            lines.push("#SBATCH --exclusive".to_string());
        }
        if let Some(reservation) = &merged.reservation {
            lines.push(format!("#SBATCH --reservation={reservation}"));
        }
        if let Some(qos) = &merged.qos {
            lines.push(format!("#SBATCH --qos={qos}"));
        }
        if let Some(bank) = &ctx.batch_defaults.bank {
            lines.push(format!("#SBATCH --account={bank}"));
        }
        if let Some(queue) = &ctx.batch_defaults.queue {
            lines.push(format!("#SBATCH --partition={queue}"));
        }
        lines.push(format!("cd {}", ctx.workspace.display()));

        let resolved = expand_launcher_tokens(ctx.cmd, &merged, |req| {
            let mut parts = vec!["srun".to_string()];
            if let Some(n) = req.nodes {
                parts.push(format!("-N{n}"));
            }
            if let Some(p) = req.procs {
                parts.push(format!("-n{p}"));
            }
            parts.join(" ")
        })?;
        lines.push(resolved);
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    async fn submit(&self, script_path: &Path) -> Result<SubmitId, AdapterError> {
        let mut cmd = Command::new("sbatch");
        cmd.arg("--parsable").arg(script_path);
        let output = run(cmd, "sbatch").await?;
        if !output.status.success() {
            return Err(AdapterError::SubmitFailed {
                script: script_path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(SubmitId::new(id))
    }

    async fn status(
        &self,
        submit_ids: &[SubmitId],
    ) -> Result<HashMap<SubmitId, JobStatus>, AdapterError> {
        if submit_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = submit_ids
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let mut cmd = Command::new("squeue");
        cmd.arg("-h").arg("-o").arg("%i %T").arg("-j").arg(&ids);
        let output = run(cmd, "squeue").await?;

        let mut out: HashMap<SubmitId, JobStatus> = submit_ids
            .iter()
            .map(|id| (id.clone(), JobStatus::FinishedOk))
            .collect();
        // squeue only reports jobs still known to the scheduler; anything
        // missing from its output has already left the queue. We default
        // those to FinishedOk above and let sacct-less deployments rely on
        // the render/submit round-trip having produced a valid exit; a
        // richer deployment would shell out to `sacct` here for the exit
        // code. Lines present in squeue output override the default.
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let mut parts = line.split_whitespace();
            let (Some(id), Some(state)) = (parts.next(), parts.next()) else {
                continue;
            };
            out.insert(SubmitId::new(id), map_state(state));
        }
        Ok(out)
    }

    async fn cancel(&self, submit_ids: &[SubmitId]) -> Result<(), AdapterError> {
        if submit_ids.is_empty() {
            return Ok(());
        }
        let mut cmd = Command::new("scancel");
        for id in submit_ids {
            cmd.arg(id.as_str());
        }
        let output = run(cmd, "scancel").await?;
        if !output.status.success() {
            return Err(AdapterError::CancelFailed {
                submit_id: submit_ids
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

fn map_state(state: &str) -> JobStatus {
    match state {
        "PENDING" | "CONFIGURING" => JobStatus::Pending,
        "RUNNING" | "COMPLETING" => JobStatus::Running,
        "COMPLETED" => JobStatus::FinishedOk,
        "FAILED" | "NODE_FAIL" | "OUT_OF_MEMORY" => JobStatus::FinishedError,
        "TIMEOUT" | "DEADLINE" => JobStatus::Timeout,
        "CANCELLED" | "PREEMPTED" | "REVOKED" => JobStatus::Cancelled,
        _ => JobStatus::Unknown,
    }
}

async fn run(mut cmd: Command, description: &str) -> Result<std::process::Output, AdapterError> {
    tokio::time::timeout(SCHEDULER_TIMEOUT, cmd.output())
        .await
        .map_err(|_| AdapterError::StatusQueryFailed {
            message: format!("{description} timed out after {}s", SCHEDULER_TIMEOUT.as_secs()),
        })?
        .map_err(|e| AdapterError::StatusQueryFailed {
            message: format!("{description} failed: {e}"),
        })
}
