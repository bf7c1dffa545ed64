// SPDX-License-Identifier: MIT

//! LSF adapter: `bsub`/`bjobs`/`bkill`.

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

pub struct LsfAdapter;

impl LsfAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LsfAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerAdapter for LsfAdapter {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, AdapterError> {
        let merged = ctx.batch_defaults.resources.merged_with(ctx.resources);
        let mut lines = vec!["#!/bin/sh".to_string()];
        if let Some(nodes) = merged.nodes {
            lines.push(format!("#BSUB -nnodes {nodes}"));
        }
        if let Some(procs) = merged.procs {
            lines.push(format!("#BSUB -n {procs}"));
        }
        if let Some(walltime) = &merged.walltime {
            lines.push(format!("#BSUB -W {walltime}"));
        }
        if let Some(rs_per_node) = merged.rs_per_node {
            lines.push(format!("#BSUB -R \"span[ptile={rs_per_node}]\""));
        }
        if let Some(reservation) = &merged.reservation {
            lines.push(format!("#BSUB -U {reservation}"));
        }
        if let Some(bank) = &ctx.batch_defaults.bank {
            lines.push(format!("#BSUB -P {bank}"));
        }
        if let Some(queue) = &ctx.batch_defaults.queue {
            lines.push(format!("#BSUB -q {queue}"));
        }
        lines.push(format!("cd {}", ctx.workspace.display()));

        let resolved = expand_launcher_tokens(ctx.cmd, &merged, |req| {
            let mut parts = vec!["jsrun".to_string()];
            if let Some(n) = req.nodes {
                parts.push(format!("-n{n}"));
            }
            if let Some(p) = req.procs {
                parts.push(format!("-a{p}"));
            }
            parts.join(" ")
        })?;
        lines.push(resolved);
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    async fn submit(&self, script_path: &Path) -> Result<SubmitId, AdapterError> {
        let mut cmd = Command::new("bsub");
        cmd.arg(script_path);
        let output = run(cmd, "bsub").await?;
        if !output.status.success() {
            return Err(AdapterError::SubmitFailed {
                script: script_path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        // bsub prints: Job <12345> is submitted to queue <...>.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = stdout
            .split('<')
            .nth(1)
            .and_then(|rest| rest.split('>').next())
            .ok_or_else(|| AdapterError::SubmitFailed {
                script: script_path.display().to_string(),
                message: format!("could not parse job id from bsub output: {stdout}"),
            })?;
        Ok(SubmitId::new(id))
    }

    async fn status(
        &self,
        submit_ids: &[SubmitId],
    ) -> Result<HashMap<SubmitId, JobStatus>, AdapterError> {
        if submit_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut cmd = Command::new("bjobs");
        cmd.arg("-noheader").arg("-o").arg("jobid stat");
        for id in submit_ids {
            cmd.arg(id.as_str());
        }
        let output = run(cmd, "bjobs").await?;

        let mut out: HashMap<SubmitId, JobStatus> = HashMap::new();
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let mut parts = line.split_whitespace();
            let (Some(id), Some(state)) = (parts.next(), parts.next()) else {
                continue;
            };
            out.insert(SubmitId::new(id), map_state(state));
        }
        for id in submit_ids {
            out.entry(id.clone()).or_insert(JobStatus::Unknown);
        }
        Ok(out)
    }

    async fn cancel(&self, submit_ids: &[SubmitId]) -> Result<(), AdapterError> {
        if submit_ids.is_empty() {
            return Ok(());
        }
        let mut cmd = Command::new("bkill");
        for id in submit_ids {
            cmd.arg(id.as_str());
        }
        let output = run(cmd, "bkill").await?;
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
        "PEND" | "PSUSP" | "WAIT" => JobStatus::Pending,
        "RUN" | "USUSP" => JobStatus::Running,
        "DONE" => JobStatus::FinishedOk,
        "EXIT" => JobStatus::FinishedError,
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
