//! CLI help output and argument-validation specs.

use crate::prelude::*;

#[test]
fn cond_help_shows_usage() {
    cli().args(&["--help"]).passes().stdout_has("Usage:");
}

#[test]
fn cond_run_help_lists_flags() {
    cli()
        .args(&["run", "--help"])
        .passes()
        .stdout_has("--throttle")
        .stdout_has("--dry")
        .stdout_has("--fg");
}

#[test]
fn cond_status_help_shows_usage() {
    cli().args(&["status", "--help"]).passes().stdout_has("Usage:");
}

#[test]
fn run_without_a_spec_or_resume_fails() {
    cli().args(&["run"]).fails_with(1).stderr_has("a spec file is required");
}

#[test]
fn run_rejects_invalid_spec_with_exit_code_two() {
    let ws = Workspace::new();
    let spec_path = ws.out_dir().join("bad.yaml");
    std::fs::write(&spec_path, "description:\n  name: bad\nstudy: []\nbogus_key: true\n").unwrap();

    cli()
        .args(&["run", spec_path.to_str().unwrap(), "--out", ws.out_dir().to_str().unwrap(), "--dry"])
        .fails_with(2);
}

#[test]
fn run_rejects_unknown_dependency_with_exit_code_two() {
    let ws = Workspace::new();
    let spec_path = ws.out_dir().join("bad.yaml");
    std::fs::write(
        &spec_path,
        r#"
description:
  name: bad-dep
study:
  - name: step-a
    run:
      cmd: echo hi
      depends: [nonexistent]
"#,
    )
    .unwrap();

    cli()
        .args(&["run", spec_path.to_str().unwrap(), "--out", ws.out_dir().to_str().unwrap(), "--dry"])
        .fails_with(2);
}

#[test]
fn status_on_missing_study_fails() {
    let ws = Workspace::new();
    cli()
        .args(&["status", ws.out_dir().join("nope").to_str().unwrap()])
        .fails_with(1);
}
