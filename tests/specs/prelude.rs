//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for driving the `cond` binary end-to-end
//! against the local scheduler adapter.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to a binary built somewhere in this workspace's target
/// directory. Falls back to resolving relative to the test binary itself
/// when `CARGO_MANIFEST_DIR` is stale (e.g. a shared target dir).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn cond_binary() -> PathBuf {
    binary_path("cond")
}

/// Create a CLI builder for `cond` commands.
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level builder for fluent test assertions against the `cond` CLI.
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    pub fn command(self) -> Command {
        let mut cmd = Command::new(cond_binary());
        cmd.args(&self.args);
        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run and expect success (exit code 0).
    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect failure with the given exit code.
    pub fn fails_with(self, code: i32) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert_eq!(
            output.status.code(),
            Some(code),
            "stdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a CLI run, for chaining assertions.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{expected}'\nstdout: {stdout}"
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{expected}'\nstderr: {stderr}"
        );
        self
    }
}

/// A disposable output root for one test's studies, plus the spec file
/// written into it.
pub struct Workspace {
    out: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            out: tempfile::tempdir().unwrap(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        self.out.path()
    }

    fn spec_path(&self, spec_yaml: &str) -> PathBuf {
        let path = self.out.path().join("spec.yaml");
        std::fs::write(&path, spec_yaml).unwrap();
        path
    }

    /// Expand and run `spec_yaml` to completion in the foreground against
    /// the local adapter, then locate the single study directory it produced.
    pub fn run_fg(&self, spec_yaml: &str) -> StudyDir {
        let spec_path = self.spec_path(spec_yaml);
        cli()
            .args(&[
                "run",
                spec_path.to_str().unwrap(),
                "--out",
                self.out.path().to_str().unwrap(),
                "--sleep",
                "1",
                "--fg",
            ])
            .passes();
        self.only_study_dir()
    }

    /// Same as [`Self::run_fg`] but with extra `cond run` flags inserted
    /// before `--fg` (e.g. `--rlimit`, `--throttle`, `--hashws`).
    pub fn run_fg_with(&self, spec_yaml: &str, extra: &[&str]) -> StudyDir {
        let spec_path = self.spec_path(spec_yaml);
        let mut args = vec![
            "run".to_string(),
            spec_path.to_str().unwrap().to_string(),
            "--out".to_string(),
            self.out.path().to_str().unwrap().to_string(),
            "--sleep".to_string(),
            "1".to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        args.push("--fg".to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        cli().args(&arg_refs).passes();
        self.only_study_dir()
    }

    /// Expand-only (`--dry`): writes workspaces and rendered scripts but
    /// never launches the conductor.
    pub fn run_dry(&self, spec_yaml: &str) -> RunAssert {
        let spec_path = self.spec_path(spec_yaml);
        cli()
            .args(&[
                "run",
                spec_path.to_str().unwrap(),
                "--out",
                self.out.path().to_str().unwrap(),
                "--dry",
            ])
            .passes()
    }

    pub fn only_study_dir(&self) -> StudyDir {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(self.out.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        assert_eq!(
            candidates.len(),
            1,
            "expected exactly one study directory under {}, found {candidates:?}",
            self.out.path().display()
        );
        StudyDir {
            path: candidates.remove(0),
        }
    }
}

/// A single study's output directory, with helpers to read its status table.
pub struct StudyDir {
    path: PathBuf,
}

impl StudyDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status_text(&self) -> String {
        std::fs::read_to_string(self.path.join("status.snapshot"))
            .expect("status.snapshot should exist after a finished run")
    }

    /// The `STATE` column for the row whose `NAME` column equals `name`
    /// exactly (a bare step name, or `step/combo_key` for parameterized
    /// instances).
    pub fn state_of(&self, name: &str) -> String {
        for line in self.status_text().lines().skip(1) {
            let mut cols = line.split('\t');
            if cols.next() == Some(name) {
                return cols.nth(1).expect("STATE column present").to_string();
            }
        }
        panic!("no status row named '{name}' in:\n{}", self.status_text());
    }

    /// Every `NAME` column, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.status_text()
            .lines()
            .skip(1)
            .filter_map(|line| line.split('\t').next().map(str::to_string))
            .collect()
    }

    /// The `STATE` column of the one row whose `NAME` contains `needle`
    /// (for parameterized instances, where the exact combo-key suffix
    /// isn't worth reconstructing in a test).
    pub fn state_containing(&self, needle: &str) -> String {
        let mut matches: Vec<(String, String)> = self
            .status_text()
            .lines()
            .skip(1)
            .filter_map(|line| {
                let mut cols = line.split('\t');
                let name = cols.next()?.to_string();
                let state = cols.nth(1)?.to_string();
                Some((name, state))
            })
            .filter(|(name, _)| name.contains(needle))
            .collect();
        assert_eq!(
            matches.len(),
            1,
            "expected exactly one row containing '{needle}' in:\n{}",
            self.status_text()
        );
        matches.remove(0).1
    }

    /// How many rows have a `NAME` starting with `prefix` (counts a fan-out
    /// step's instances).
    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.names().iter().filter(|n| n.starts_with(prefix)).count()
    }

    pub fn workspace_of(&self, step_name: &str) -> PathBuf {
        self.path.join(step_name)
    }
}
