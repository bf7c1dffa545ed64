//! `cond cancel` and `cond update` act on a conductor already running in
//! the background against a study directory.

use crate::prelude::*;
use std::time::Duration;

// A step slow enough to stay RUNNING while we drop a sentinel into its
// study directory.
const SLOW_STUDY: &str = r#"
description:
  name: slow-study
study:
  - name: work
    run:
      cmd: sleep 5 && echo done > done.txt
"#;

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn cancel_sentinel_stops_a_running_study() {
    let ws = Workspace::new();
    let spec_path = ws.out_dir().join("spec.yaml");
    std::fs::write(&spec_path, SLOW_STUDY).unwrap();

    // Launch in the background (default mode: `run` without `--fg` detaches).
    cli()
        .args(&[
            "run",
            spec_path.to_str().unwrap(),
            "--out",
            ws.out_dir().to_str().unwrap(),
            "--sleep",
            "1",
        ])
        .passes();

    let found = wait_until(Duration::from_secs(5), || {
        std::fs::read_dir(ws.out_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.path().is_dir())
    });
    assert!(found, "study directory should appear");
    let study = ws.only_study_dir();

    let running = wait_until(Duration::from_secs(10), || study.path().join("graph.snapshot").exists());
    assert!(running, "conductor should have persisted at least one snapshot");

    cli()
        .args(&["cancel", study.path().to_str().unwrap()])
        .passes()
        .stdout_has("cancel requested");

    let cancelled = wait_until(Duration::from_secs(10), || {
        study.status_text().lines().any(|l| l.contains("cancelled"))
    });
    assert!(cancelled, "work should end up cancelled:\n{}", study.status_text());
}

#[test]
fn update_requires_at_least_one_field() {
    let ws = Workspace::new();
    cli()
        .args(&["update", ws.out_dir().to_str().unwrap()])
        .fails_with(1)
        .stderr_has("at least one of");
}

#[test]
fn update_writes_sentinel_picked_up_by_a_live_conductor() {
    let ws = Workspace::new();
    let spec_path = ws.out_dir().join("spec.yaml");
    std::fs::write(&spec_path, SLOW_STUDY).unwrap();

    cli()
        .args(&[
            "run",
            spec_path.to_str().unwrap(),
            "--out",
            ws.out_dir().to_str().unwrap(),
            "--sleep",
            "1",
        ])
        .passes();

    let found = wait_until(Duration::from_secs(5), || {
        std::fs::read_dir(ws.out_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.path().is_dir())
    });
    assert!(found, "study directory should appear");
    let study = ws.only_study_dir();

    cli()
        .args(&["update", "--throttle", "3", study.path().to_str().unwrap()])
        .passes()
        .stdout_has("update queued");

    let applied = wait_until(Duration::from_secs(10), || {
        !study.path().join(".update").exists() && !study.path().join(".update.processing").exists()
    });
    assert!(applied, "conductor should have consumed the update sentinel");

    // Let the study finish so the background conductor doesn't outlive the test.
    wait_until(Duration::from_secs(15), || {
        study.status_text().lines().any(|l| l.contains("finished_ok") || l.contains("cancelled"))
    });
}
