// SPDX-License-Identifier: MIT

//! The study aggregate: the whole object graph plus output root, batch
//! defaults, resolved env, and conductor runtime config.

use crate::step::ResourceRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Which scheduler backend a study targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Local,
    Slurm,
    Lsf,
    Flux,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Local => "local",
            SchedulerKind::Slurm => "slurm",
            SchedulerKind::Lsf => "lsf",
            SchedulerKind::Flux => "flux",
        }
    }
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SchedulerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(SchedulerKind::Local),
            "slurm" => Ok(SchedulerKind::Slurm),
            "lsf" => Ok(SchedulerKind::Lsf),
            "flux" => Ok(SchedulerKind::Flux),
            other => Err(format!("unknown scheduler type '{other}'")),
        }
    }
}

/// Batch defaults applied to every scheduled step (`batch:` top-level key).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDefaults {
    pub scheduler: Option<SchedulerKind>,
    pub host: Option<String>,
    pub bank: Option<String>,
    pub queue: Option<String>,
    #[serde(default)]
    pub resources: ResourceRequest,
}

/// Conductor runtime configuration: loop sleep interval, concurrency
/// throttle, restart/attempt limits, and the `hashws` workspace-naming flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Seconds between conductor loop iterations.
    pub sleep_interval: u64,
    /// Maximum concurrently `RUNNING` nodes; 0 means unbounded.
    pub throttle: u32,
    /// Maximum restarts on TIMEDOUT before terminalizing as FAILED; 0 means unbounded.
    pub rlimit: u32,
    /// Maximum submission attempts before terminalizing as FAILED.
    pub attempts_max: u32,
    /// Replace combo_key with a digest in workspace paths.
    pub hashws: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sleep_interval: 60,
            throttle: 0,
            rlimit: 0,
            attempts_max: 1,
            hashws: false,
        }
    }
}

/// The resolved environment: variables, labels (unresolved templates), and
/// acquired dependency name → resolved path mappings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedEnv {
    pub variables: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub dependencies: HashMap<String, String>,
}

/// The full study: output root, batch defaults, resolved env, and runtime
/// config. The execution graph itself lives separately (`ExecutionGraph`),
/// handed over to the conductor once expansion completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    pub description: String,
    pub output_root: PathBuf,
    pub spec_root: PathBuf,
    pub batch: BatchDefaults,
    pub env: ResolvedEnv,
    pub runtime: RuntimeConfig,
}
