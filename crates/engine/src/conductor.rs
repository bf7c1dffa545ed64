// SPDX-License-Identifier: MIT

//! The persistent conductor loop: select ready jobs, submit respecting
//! throttle, poll running jobs, apply state transitions (restart on
//! timeout, resubmit on failure, cascade-cancel on exhaustion), honor
//! `cancel`/`update` sentinels, and persist a durable snapshot after every
//! pass.

use crate::error::ConductorError;
use crate::sentinel::{self, UpdateRequest, CANCEL_SENTINEL, UPDATE_SENTINEL};
use chrono::{DateTime, Utc};
use cond_adapters::{JobStatus, RenderContext, SchedulerAdapter};
use cond_core::{BatchDefaults, Clock, ExecutionGraph, JobInstanceId, JobState, RuntimeConfig, SubmitId};
use cond_storage::{graph_snapshot::GraphSnapshot, status_snapshot, StorageError};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Filename of the durable graph snapshot within a study root, also used by
/// `cond-cli` to locate it for `run --resume`.
pub const GRAPH_SNAPSHOT_FILENAME: &str = "graph.snapshot";
/// Filename of the human-readable status table within a study root, also
/// used by `cond-cli`'s `status` subcommand.
pub const STATUS_SNAPSHOT_FILENAME: &str = "status.snapshot";

/// What happened on one pass of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Every node in the graph has reached a terminal state (or the study
    /// was cancelled outright); the conductor should exit.
    pub done: bool,
}

/// Run the conductor to completion: repeat [`run_iteration`], sleeping
/// `runtime.sleep_interval` seconds between passes, until it reports `done`.
pub async fn run_loop<C: Clock>(
    graph: &mut ExecutionGraph,
    runtime: &mut RuntimeConfig,
    batch_defaults: &BatchDefaults,
    study_root: &Path,
    adapter: &dyn SchedulerAdapter,
    clock: &C,
) -> Result<(), ConductorError> {
    loop {
        let outcome = run_iteration(graph, runtime, batch_defaults, study_root, adapter, clock).await?;
        if outcome.done {
            info!("all nodes reached a terminal state, conductor exiting");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(runtime.sleep_interval)).await;
    }
}

/// One pass of the conductor loop. Exposed separately from [`run_loop`] so
/// tests can drive the loop deterministically against a [`cond_core::FakeClock`]
/// and a scripted adapter, without sleeping.
pub async fn run_iteration<C: Clock>(
    graph: &mut ExecutionGraph,
    runtime: &mut RuntimeConfig,
    batch_defaults: &BatchDefaults,
    study_root: &Path,
    adapter: &dyn SchedulerAdapter,
    clock: &C,
) -> Result<IterationOutcome, ConductorError> {
    let now = clock.now();

    apply_update_sentinel(study_root, runtime)?;

    if apply_cancel_sentinel(graph, adapter, study_root, now).await? {
        persist(graph, study_root)?;
        return Ok(IterationOutcome { done: true });
    }

    let transitioned = poll_running(graph, adapter, now).await;
    handle_transitions(graph, runtime, now, &transitioned);

    process_submissions(graph, runtime, batch_defaults, adapter, now).await;

    persist(graph, study_root)?;

    Ok(IterationOutcome {
        done: graph.all_terminal(),
    })
}

/// Adopt a pending `.update` sentinel's `rlimit`/`throttle`/`sleep_interval`
/// into `runtime`. A sentinel that fails to parse is released (not deleted)
/// so a corrected or retried write is picked up on a later pass.
fn apply_update_sentinel(study_root: &Path, runtime: &mut RuntimeConfig) -> Result<(), ConductorError> {
    let Some(claimed) = sentinel::claim(study_root, UPDATE_SENTINEL)? else {
        return Ok(());
    };

    let body = claimed.read_to_string()?;
    match serde_json::from_str::<UpdateRequest>(&body) {
        Ok(req) => {
            if let Some(v) = req.rlimit {
                runtime.rlimit = v;
            }
            if let Some(v) = req.throttle {
                runtime.throttle = v;
            }
            if let Some(v) = req.sleep_interval {
                runtime.sleep_interval = v;
            }
            claimed.confirm()?;
            info!(
                rlimit = runtime.rlimit,
                throttle = runtime.throttle,
                sleep_interval = runtime.sleep_interval,
                "applied live configuration update"
            );
        }
        Err(e) => {
            warn!(error = %e, "malformed update sentinel, leaving for retry");
            claimed.release()?;
        }
    }
    Ok(())
}

/// Handle a pending `.cancel` sentinel: best-effort-cancel every `RUNNING`
/// node through the adapter, then mark every non-terminal node `CANCELLED`
/// directly (a full-study cancel, unlike `cascade_cancel`'s targeted
/// descendant cascade from a single failed node). Returns whether a cancel
/// was processed this pass.
async fn apply_cancel_sentinel(
    graph: &mut ExecutionGraph,
    adapter: &dyn SchedulerAdapter,
    study_root: &Path,
    now: DateTime<Utc>,
) -> Result<bool, ConductorError> {
    let Some(claimed) = sentinel::claim(study_root, CANCEL_SENTINEL)? else {
        return Ok(false);
    };

    let running: Vec<SubmitId> = graph
        .nodes()
        .filter(|n| n.state == JobState::Running)
        .filter_map(|n| n.submit_id.clone())
        .collect();
    if !running.is_empty() {
        if let Err(e) = adapter.cancel(&running).await {
            warn!(error = %e, "adapter cancel failed, marking nodes cancelled anyway");
        }
    }

    let to_cancel: Vec<JobInstanceId> = graph
        .nodes()
        .filter(|n| !n.state.is_terminal())
        .map(|n| n.id.clone())
        .collect();
    for id in &to_cancel {
        graph.transition(id, JobState::Cancelled, now);
    }

    claimed.confirm()?;
    info!(cancelled = to_cancel.len(), "study cancelled via sentinel");
    Ok(true)
}

/// Poll every `RUNNING` node's adapter status and apply the resulting state
/// transition. A failed status query leaves every polled node `RUNNING`
/// (surfaced as `unknown`) rather
/// than failing the whole loop. Returns the ids that left `RUNNING` this pass.
async fn poll_running(graph: &mut ExecutionGraph, adapter: &dyn SchedulerAdapter, now: DateTime<Utc>) -> Vec<JobInstanceId> {
    let running: Vec<(JobInstanceId, SubmitId)> = graph
        .nodes()
        .filter(|n| n.state == JobState::Running)
        .filter_map(|n| n.submit_id.clone().map(|sid| (n.id.clone(), sid)))
        .collect();
    if running.is_empty() {
        return Vec::new();
    }

    let ids: Vec<SubmitId> = running.iter().map(|(_, sid)| sid.clone()).collect();
    let statuses: HashMap<SubmitId, JobStatus> = match adapter.status(&ids).await {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "status query failed, polled jobs stay running and are retried next pass");
            HashMap::new()
        }
    };

    let mut transitioned = Vec::new();
    for (job_id, submit_id) in &running {
        let status = statuses.get(submit_id).copied().unwrap_or(JobStatus::Unknown);
        let new_state = match status {
            JobStatus::Pending | JobStatus::Running | JobStatus::Unknown => None,
            JobStatus::FinishedOk => Some(JobState::Finished),
            JobStatus::FinishedError => Some(JobState::Failed),
            JobStatus::Timeout => Some(JobState::Timedout),
            JobStatus::Cancelled => Some(JobState::Cancelled),
        };
        if let Some(new_state) = new_state {
            graph.transition(job_id, new_state, now);
            transitioned.push(job_id.clone());
        }
    }
    transitioned
}

/// React to each node that left `RUNNING` this pass.
/// `TIMEDOUT` restarts (using `restart_cmd`) while `restarts < rlimit`;
/// `FAILED` resubmits while `attempts < attempts_max`; anything that
/// exhausts its budget terminalizes and cascades cancellation to its
/// `INITIALIZED` descendants.
fn handle_transitions(graph: &mut ExecutionGraph, runtime: &RuntimeConfig, now: DateTime<Utc>, transitioned: &[JobInstanceId]) {
    for id in transitioned {
        let Some(state) = graph.get(id).map(|n| n.state) else {
            continue;
        };
        match state {
            JobState::Timedout => {
                let Some(node) = graph.get(id) else { continue };
                let can_restart = runtime.rlimit == 0 || node.restarts < runtime.rlimit;
                if can_restart {
                    if let Some(node) = graph.get_mut(id) {
                        node.restarts += 1;
                    }
                    graph.transition(id, JobState::PendingSubmit, now);
                    info!(job = %id, "timed out, restarting with restart_cmd");
                } else {
                    graph.transition(id, JobState::Failed, now);
                    cascade(graph, id, now, "restart limit exhausted");
                }
            }
            JobState::Failed => {
                let Some(node) = graph.get(id) else { continue };
                if node.attempts < runtime.attempts_max {
                    graph.transition(id, JobState::PendingSubmit, now);
                    info!(job = %id, "job failed, resubmitting");
                } else {
                    cascade(graph, id, now, "attempt limit exhausted");
                }
            }
            JobState::Cancelled => cascade(graph, id, now, "job cancelled"),
            _ => {}
        }
    }
}

fn cascade(graph: &mut ExecutionGraph, id: &JobInstanceId, now: DateTime<Utc>, reason: &str) {
    let cancelled = graph.cascade_cancel(id, now);
    if !cancelled.is_empty() {
        info!(job = %id, ?cancelled, reason, "cascading cancellation to descendants");
    }
}

/// Promote ready `INITIALIZED` nodes to `PENDING_SUBMIT`, then drain the `PENDING_SUBMIT` queue (which also holds the restart/resubmit
/// candidates [`handle_transitions`] produced) while `inflight < throttle`.
async fn process_submissions(
    graph: &mut ExecutionGraph,
    runtime: &RuntimeConfig,
    batch_defaults: &BatchDefaults,
    adapter: &dyn SchedulerAdapter,
    now: DateTime<Utc>,
) {
    for id in graph.ready_nodes() {
        graph.transition(&id, JobState::PendingSubmit, now);
    }

    let queue: Vec<JobInstanceId> = graph
        .nodes()
        .filter(|n| n.state == JobState::PendingSubmit)
        .map(|n| n.id.clone())
        .collect();

    let mut inflight = graph.nodes().filter(|n| n.state == JobState::Running).count() as u32;

    for id in queue {
        if runtime.throttle > 0 && inflight >= runtime.throttle {
            break;
        }
        submit_node(graph, &id, adapter, batch_defaults, runtime, now).await;
        if graph.get(&id).map(|n| n.state) == Some(JobState::Running) {
            inflight += 1;
        }
    }
}

/// Render (idempotent: uses `active_cmd`, which becomes `restart_cmd` once
/// `restarts > 0`), write the script, and submit. A render or submit failure
/// is a scoped submission error: retried up to `attempts_max`, otherwise
/// the node terminalizes as `FAILED` and cascades.
async fn submit_node(
    graph: &mut ExecutionGraph,
    id: &JobInstanceId,
    adapter: &dyn SchedulerAdapter,
    batch_defaults: &BatchDefaults,
    runtime: &RuntimeConfig,
    now: DateTime<Utc>,
) {
    let Some(node) = graph.get(id) else { return };
    let cmd = node.active_cmd().to_string();
    let resources = node.resources.clone();
    let workspace = node.workspace.clone();
    let step_name = node.step_name.clone();

    if let Some(node) = graph.get_mut(id) {
        node.attempts += 1;
    }

    let render_ctx = RenderContext {
        cmd: &cmd,
        resources: &resources,
        batch_defaults,
        workspace: &workspace,
    };
    let script = match adapter.render(&render_ctx) {
        Ok(script) => script,
        Err(e) => {
            warn!(job = %id, error = %e, "script render failed");
            fail_or_retry(graph, id, runtime, now);
            return;
        }
    };

    let script_path = workspace.join(format!("{step_name}.sh"));
    if let Err(e) = std::fs::write(&script_path, script) {
        warn!(job = %id, error = %e, "writing rendered script failed");
        fail_or_retry(graph, id, runtime, now);
        return;
    }

    match adapter.submit(&script_path).await {
        Ok(submit_id) => {
            if let Some(node) = graph.get_mut(id) {
                node.submit_id = Some(submit_id);
            }
            graph.transition(id, JobState::Running, now);
        }
        Err(e) => {
            warn!(job = %id, error = %e, "submit failed");
            fail_or_retry(graph, id, runtime, now);
        }
    }
}

/// Leave `id` in `PENDING_SUBMIT` for another attempt next pass, unless
/// `attempts_max` is exhausted, in which case terminalize and cascade.
fn fail_or_retry(graph: &mut ExecutionGraph, id: &JobInstanceId, runtime: &RuntimeConfig, now: DateTime<Utc>) {
    let Some(node) = graph.get(id) else { return };
    if node.attempts < runtime.attempts_max {
        return;
    }
    graph.transition(id, JobState::Failed, now);
    cascade(graph, id, now, "submission attempts exhausted");
}

/// Persist the durable graph snapshot and the human-readable status table,
/// retrying transient I/O failures with exponential backoff. Exhausting
/// retries is a fatal conductor error.
fn persist(graph: &ExecutionGraph, study_root: &Path) -> Result<(), ConductorError> {
    let graph_path = study_root.join(GRAPH_SNAPSHOT_FILENAME);
    let status_path = study_root.join(STATUS_SNAPSHOT_FILENAME);

    save_with_retry(|| GraphSnapshot::new(graph.clone()).save(&graph_path))?;
    save_with_retry(|| status_snapshot::write(graph, &status_path))?;
    Ok(())
}

const PERSIST_RETRIES: u32 = 3;

fn save_with_retry(attempt_save: impl Fn() -> Result<(), StorageError>) -> Result<(), ConductorError> {
    let mut delay = Duration::from_millis(100);
    let mut attempt = 0u32;
    loop {
        match attempt_save() {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= PERSIST_RETRIES {
                    return Err(ConductorError::Persistence(e));
                }
                warn!(error = %e, attempt, "persistence failed, retrying");
                std::thread::sleep(delay);
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cond_adapters::FakeAdapter;
    use cond_core::{FakeClock, JobInstance, JobInstanceId, ResourceRequest};
    use std::path::PathBuf;

    fn node(name: &str) -> JobInstance {
        JobInstance::new(
            JobInstanceId::new(name),
            name,
            None,
            PathBuf::from(format!("/tmp/cond-conductor-test/{name}")),
            format!("echo {name}"),
            Some(format!("echo {name}-restart")),
            ResourceRequest::default(),
        )
    }

    fn setup_single_node(dir: &Path) -> ExecutionGraph {
        std::fs::create_dir_all(dir.join("say-hello")).unwrap();
        let mut graph = ExecutionGraph::new();
        let mut instance = node("say-hello");
        instance.workspace = dir.join("say-hello");
        graph.add_node(instance);
        graph
    }

    #[tokio::test]
    async fn ready_node_is_submitted_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = setup_single_node(dir.path());
        let mut runtime = RuntimeConfig::default();
        let batch_defaults = BatchDefaults::default();
        let adapter = FakeAdapter::new(vec![JobStatus::FinishedOk]);
        let clock = FakeClock::new();

        let outcome = run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert!(!outcome.done);
        assert_eq!(graph.get(&JobInstanceId::new("say-hello")).unwrap().state, JobState::Running);

        let outcome = run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert!(outcome.done);
        assert_eq!(graph.get(&JobInstanceId::new("say-hello")).unwrap().state, JobState::Finished);
        assert!(dir.path().join(GRAPH_SNAPSHOT_FILENAME).exists());
        assert!(dir.path().join(STATUS_SNAPSHOT_FILENAME).exists());
    }

    #[tokio::test]
    async fn restart_on_timeout_then_finishes() {
        // scenario 6: TIMEDOUT, TIMEDOUT, finished_ok with rlimit=2.
        let dir = tempfile::tempdir().unwrap();
        let mut graph = setup_single_node(dir.path());
        let mut runtime = RuntimeConfig {
            rlimit: 2,
            ..RuntimeConfig::default()
        };
        let batch_defaults = BatchDefaults::default();
        let adapter = FakeAdapter::new(vec![JobStatus::Timeout, JobStatus::Timeout, JobStatus::FinishedOk]);
        let clock = FakeClock::new();
        let id = JobInstanceId::new("say-hello");

        // submit -> running
        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert_eq!(graph.get(&id).unwrap().state, JobState::Running);

        // poll -> timedout -> restart -> resubmit -> running, restarts = 1
        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert_eq!(graph.get(&id).unwrap().state, JobState::Running);
        assert_eq!(graph.get(&id).unwrap().restarts, 1);

        // poll -> timedout again -> restart -> resubmit -> running, restarts = 2
        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert_eq!(graph.get(&id).unwrap().state, JobState::Running);
        assert_eq!(graph.get(&id).unwrap().restarts, 2);

        // poll -> finished_ok -> done
        let outcome = run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert!(outcome.done);
        let final_node = graph.get(&id).unwrap();
        assert_eq!(final_node.state, JobState::Finished);
        assert_eq!(final_node.restarts, 2);
    }

    #[tokio::test]
    async fn failed_dependency_cascades_cancel_to_child() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        let mut graph = ExecutionGraph::new();
        let mut a = node("a");
        a.workspace = dir.path().join("a");
        let mut b = node("b");
        b.workspace = dir.path().join("b");
        graph.add_node(a);
        graph.add_node(b);
        graph.add_edge(JobInstanceId::new("a"), JobInstanceId::new("b"));

        let mut runtime = RuntimeConfig::default();
        let batch_defaults = BatchDefaults::default();
        let adapter = FakeAdapter::new(vec![JobStatus::FinishedError]);
        let clock = FakeClock::new();

        // submit a (b not ready, stays initialized)
        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert_eq!(graph.get(&JobInstanceId::new("a")).unwrap().state, JobState::Running);
        assert_eq!(graph.get(&JobInstanceId::new("b")).unwrap().state, JobState::Initialized);

        // a fails (attempts_max=1 default, no retry) -> cascades to b
        let outcome = run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert!(outcome.done);
        assert_eq!(graph.get(&JobInstanceId::new("a")).unwrap().state, JobState::Failed);
        assert_eq!(graph.get(&JobInstanceId::new("b")).unwrap().state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn throttle_bounds_concurrent_running_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = ExecutionGraph::new();
        for name in ["a", "b", "c"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
            let mut n = node(name);
            n.workspace = dir.path().join(name);
            graph.add_node(n);
        }
        let mut runtime = RuntimeConfig {
            throttle: 2,
            ..RuntimeConfig::default()
        };
        let batch_defaults = BatchDefaults::default();
        let adapter = FakeAdapter::new(vec![JobStatus::Running]);
        let clock = FakeClock::new();

        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();

        let running = graph.nodes().filter(|n| n.state == JobState::Running).count();
        assert_eq!(running, 2);
    }

    #[tokio::test]
    async fn cancel_sentinel_terminates_all_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = setup_single_node(dir.path());
        let mut runtime = RuntimeConfig::default();
        let batch_defaults = BatchDefaults::default();
        let adapter = FakeAdapter::new(vec![JobStatus::Running]);
        let clock = FakeClock::new();

        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert_eq!(graph.get(&JobInstanceId::new("say-hello")).unwrap().state, JobState::Running);

        std::fs::write(dir.path().join(CANCEL_SENTINEL), b"").unwrap();
        let outcome = run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();
        assert!(outcome.done);
        assert_eq!(graph.get(&JobInstanceId::new("say-hello")).unwrap().state, JobState::Cancelled);
        assert!(!dir.path().join(CANCEL_SENTINEL).exists());
    }

    #[tokio::test]
    async fn update_sentinel_adopts_new_throttle() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = setup_single_node(dir.path());
        let mut runtime = RuntimeConfig::default();
        let batch_defaults = BatchDefaults::default();
        let adapter = FakeAdapter::new(vec![JobStatus::FinishedOk]);
        let clock = FakeClock::new();

        std::fs::write(dir.path().join(UPDATE_SENTINEL), br#"{"throttle": 7}"#).unwrap();
        run_iteration(&mut graph, &mut runtime, &batch_defaults, dir.path(), &adapter, &clock)
            .await
            .unwrap();

        assert_eq!(runtime.throttle, 7);
        assert!(!dir.path().join(UPDATE_SENTINEL).exists());
    }
}
