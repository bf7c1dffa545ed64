// SPDX-License-Identifier: MIT

//! Flux adapter: `flux mini submit` / `flux jobs` / `flux cancel`.

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

pub struct FluxAdapter;

impl FluxAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FluxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchedulerAdapter for FluxAdapter {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, AdapterError> {
        let merged = ctx.batch_defaults.resources.merged_with(ctx.resources);
        let mut lines = vec!["#!/bin/sh".to_string(), format!("cd {}", ctx.workspace.display())];

        let resolved = expand_launcher_tokens(ctx.cmd, &merged, |req| {
            let mut parts = vec!["flux".to_string(), "mini".to_string(), "run".to_string()];
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
        let mut cmd = Command::new("flux");
        cmd.arg("mini").arg("submit").arg(script_path);
        let output = run(cmd, "flux mini submit").await?;
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
        let mut cmd = Command::new("flux");
        cmd.arg("jobs").arg("-no").arg("{id} {state}");
        for id in submit_ids {
            cmd.arg(id.as_str());
        }
        let output = run(cmd, "flux jobs").await?;

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
        let mut cmd = Command::new("flux");
        cmd.arg("cancel");
        for id in submit_ids {
            cmd.arg(id.as_str());
        }
        let output = run(cmd, "flux cancel").await?;
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
        "DEPEND" | "PRIORITY" | "SCHED" => JobStatus::Pending,
        "RUN" | "CLEANUP" => JobStatus::Running,
        "COMPLETED" | "INACTIVE" => JobStatus::FinishedOk,
        "FAILED" => JobStatus::FinishedError,
        "TIMEOUT" => JobStatus::Timeout,
        "CANCELED" => JobStatus::Cancelled,
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
