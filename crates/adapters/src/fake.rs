// SPDX-License-Identifier: MIT

//! A scripted adapter for deterministic conductor-loop tests: each submit id
//! walks through a pre-programmed [`JobStatus`] sequence, one step per
//! `status()` call, then holds at its last entry.

use crate::adapter::{RenderContext, SchedulerAdapter};
use crate::{AdapterError, JobStatus};
use async_trait::async_trait;
use cond_core::SubmitId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct FakeAdapter {
    next_pid: AtomicU64,
    scripts: Mutex<HashMap<SubmitId, Vec<JobStatus>>>,
    cursors: Mutex<HashMap<SubmitId, usize>>,
    default_script: Vec<JobStatus>,
    submitted_scripts: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<SubmitId>>,
}

impl FakeAdapter {
    /// Every submission gets `default_script` unless [`Self::program`] was
    /// called first for a specific script path (matched by the rendered
    /// script's content, since the fake never writes real files for
    /// `submit` to read back).
    pub fn new(default_script: Vec<JobStatus>) -> Self {
        Self {
            next_pid: AtomicU64::new(1),
            scripts: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            default_script,
            submitted_scripts: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Pre-assign the status sequence the *next* `submit()` call will
    /// receive (by submission order).
    pub fn program_next(&self, submit_id: SubmitId, script: Vec<JobStatus>) {
        self.scripts.lock().insert(submit_id, script);
    }

    pub fn submitted_scripts(&self) -> Vec<String> {
        self.submitted_scripts.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<SubmitId> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl SchedulerAdapter for FakeAdapter {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, AdapterError> {
        Ok(ctx.cmd.to_string())
    }

    async fn submit(&self, script_path: &Path) -> Result<SubmitId, AdapterError> {
        self.submitted_scripts
            .lock()
            .push(script_path.display().to_string());
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let id = SubmitId::new(format!("fake-{pid}"));
        self.scripts
            .lock()
            .entry(id.clone())
            .or_insert_with(|| self.default_script.clone());
        self.cursors.lock().insert(id.clone(), 0);
        Ok(id)
    }

    async fn status(
        &self,
        submit_ids: &[SubmitId],
    ) -> Result<HashMap<SubmitId, JobStatus>, AdapterError> {
        let mut out = HashMap::new();
        let scripts = self.scripts.lock();
        let mut cursors = self.cursors.lock();
        for id in submit_ids {
            let script = scripts
                .get(id)
                .cloned()
                .unwrap_or_else(|| vec![JobStatus::Unknown]);
            let cursor = cursors.entry(id.clone()).or_insert(0);
            let status = script[(*cursor).min(script.len() - 1)];
            if *cursor + 1 < script.len() {
                *cursor += 1;
            }
            out.insert(id.clone(), status);
        }
        Ok(out)
    }

    async fn cancel(&self, submit_ids: &[SubmitId]) -> Result<(), AdapterError> {
        self.cancelled.lock().extend(submit_ids.iter().cloned());
        Ok(())
    }
}
