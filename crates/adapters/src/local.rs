// SPDX-License-Identifier: MIT

//! Local-process adapter: "submit" forks a child process and runs it
//! sequentially with every other job this adapter owns, matching "run on the
//! login node" semantics. No native resource headers, no `$(LAUNCHER)`
//! wrapper text.

use crate::adapter::{RenderContext, SchedulerAdapter};
use crate::launcher::expand_launcher_tokens;
use crate::{AdapterError, JobStatus};
use async_trait::async_trait;
use cond_core::SubmitId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::debug;

/// The local adapter enforces no concurrency across jobs it owns: `submit`
/// acquires an internal run-lock released only once the child exits (by a
/// background waiter task, not by `submit` returning), so a second local job
/// never starts while the first is still alive.
pub struct LocalAdapter {
    run_lock: Arc<AsyncMutex<()>>,
    /// A kill signal per in-flight submit id; consumed (and removed) by
    /// `cancel`, or dropped harmlessly by the waiter once the child exits.
    kill_signals: Mutex<HashMap<SubmitId, oneshot::Sender<()>>>,
    exit_codes: Arc<Mutex<HashMap<SubmitId, Option<i32>>>>,
}

impl Default for LocalAdapter {
    fn default() -> Self {
        Self {
            run_lock: Arc::new(AsyncMutex::new(())),
            kill_signals: Mutex::new(HashMap::new()),
            exit_codes: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulerAdapter for LocalAdapter {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, AdapterError> {
        let resolved = expand_launcher_tokens(ctx.cmd, ctx.resources, |_| String::new())?;
        Ok(format!("#!/bin/sh\nset -e\ncd {}\n{resolved}\n", ctx.workspace.display()))
    }

    async fn submit(&self, script_path: &Path) -> Result<SubmitId, AdapterError> {
        // Held until the background waiter below drops it on exit, not
        // until this call returns: that is what keeps a second local job
        // from starting while the first is still alive.
        let guard = self.run_lock.clone().lock_owned().await;

        let mut cmd = Command::new("sh");
        cmd.arg(script_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| AdapterError::SubmitFailed {
            script: script_path.display().to_string(),
            message: e.to_string(),
        })?;
        let pid = child
            .id()
            .ok_or_else(|| AdapterError::SubmitFailed {
                script: script_path.display().to_string(),
                message: "child exited before its pid could be read".to_string(),
            })?;
        let submit_id = SubmitId::new(pid.to_string());

        debug!(pid, script = %script_path.display(), "forked local job");
        let (kill_tx, mut kill_rx) = oneshot::channel();
        self.kill_signals.lock().insert(submit_id.clone(), kill_tx);

        let exit_codes = Arc::clone(&self.exit_codes);
        let id_for_waiter = submit_id.clone();
        tokio::spawn(async move {
            let code = tokio::select! {
                result = child.wait() => result.ok().and_then(|s| s.code()),
                _ = &mut kill_rx => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    None
                }
            };
            exit_codes.lock().insert(id_for_waiter, code);
            drop(guard);
        });
        Ok(submit_id)
    }

    async fn status(
        &self,
        submit_ids: &[SubmitId],
    ) -> Result<HashMap<SubmitId, JobStatus>, AdapterError> {
        let mut out = HashMap::new();
        for id in submit_ids {
            let status = match self.exit_codes.lock().get(id).copied() {
                Some(Some(0)) => JobStatus::FinishedOk,
                Some(Some(_)) => JobStatus::FinishedError,
                Some(None) => JobStatus::Cancelled,
                None => {
                    if self.kill_signals.lock().contains_key(id) {
                        JobStatus::Running
                    } else {
                        JobStatus::Unknown
                    }
                }
            };
            out.insert(id.clone(), status);
        }
        Ok(out)
    }

    async fn cancel(&self, submit_ids: &[SubmitId]) -> Result<(), AdapterError> {
        for id in submit_ids {
            if let Some(tx) = self.kill_signals.lock().remove(id) {
                let _ = tx.send(());
            }
        }
        Ok(())
    }
}
