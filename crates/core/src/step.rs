// SPDX-License-Identifier: MIT

//! Step template: a not-yet-expanded task description.

use serde::{Deserialize, Serialize};

/// One entry in a step template's `depends[]` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependsOn {
    /// Per-combination dependency, propagated to the child's effective-used set.
    PerCombination(String),
    /// Fan-in: depends on *all* expanded instances of the named step.
    FanIn(String),
}

impl DependsOn {
    /// The bare step name this dependency refers to, regardless of kind.
    pub fn step_name(&self) -> &str {
        match self {
            DependsOn::PerCombination(s) => s,
            DependsOn::FanIn(s) => s,
        }
    }

    /// Parse a `depends[]` entry. A trailing `_*` marks fan-in.
    pub fn parse(entry: &str) -> Self {
        match entry.strip_suffix("_*") {
            Some(base) => DependsOn::FanIn(base.to_string()),
            None => DependsOn::PerCombination(entry.to_string()),
        }
    }
}

/// A scheduler resource request. All fields optional; presence of `nodes` or
/// `procs` marks the step as scheduled (otherwise it runs locally).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequest {
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub procs: Option<u32>,
    #[serde(default)]
    pub walltime: Option<String>,
    #[serde(default, rename = "cores_per_task", alias = "cores per task")]
    pub cores_per_task: Option<u32>,
    #[serde(default)]
    pub gpus: Option<u32>,
    #[serde(default)]
    pub exclusive: Option<bool>,
    #[serde(default, rename = "rs_per_node", alias = "rs per node")]
    pub rs_per_node: Option<u32>,
    #[serde(default, rename = "tasks_per_rs", alias = "tasks per rs")]
    pub tasks_per_rs: Option<u32>,
    #[serde(default, rename = "cpus_per_rs", alias = "cpus per rs")]
    pub cpus_per_rs: Option<u32>,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default, rename = "bind_gpus", alias = "bind gpus")]
    pub bind_gpus: Option<bool>,
    #[serde(default)]
    pub reservation: Option<String>,
    #[serde(default)]
    pub qos: Option<String>,
}

impl ResourceRequest {
    /// A step is "scheduled" (dispatched to a batch system) iff it declares
    /// `nodes` or `procs`; otherwise it runs locally.
    pub fn is_scheduled(&self) -> bool {
        self.nodes.is_some() || self.procs.is_some()
    }

    /// Merge `overrides` on top of `self` (used for `batch_defaults` merged
    /// with a step's own resource request).
    pub fn merged_with(&self, overrides: &ResourceRequest) -> ResourceRequest {
        ResourceRequest {
            nodes: overrides.nodes.or(self.nodes),
            procs: overrides.procs.or(self.procs),
            walltime: overrides.walltime.clone().or_else(|| self.walltime.clone()),
            cores_per_task: overrides.cores_per_task.or(self.cores_per_task),
            gpus: overrides.gpus.or(self.gpus),
            exclusive: overrides.exclusive.or(self.exclusive),
            rs_per_node: overrides.rs_per_node.or(self.rs_per_node),
            tasks_per_rs: overrides.tasks_per_rs.or(self.tasks_per_rs),
            cpus_per_rs: overrides.cpus_per_rs.or(self.cpus_per_rs),
            bind: overrides.bind.clone().or_else(|| self.bind.clone()),
            bind_gpus: overrides.bind_gpus.or(self.bind_gpus),
            reservation: overrides
                .reservation
                .clone()
                .or_else(|| self.reservation.clone()),
            qos: overrides.qos.clone().or_else(|| self.qos.clone()),
        }
    }
}

/// A declarative step template (not yet expanded into job instances).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cmd: String,
    #[serde(default)]
    pub restart_cmd: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub resources: ResourceRequest,
}

impl StepTemplate {
    /// Parsed `depends[]` entries.
    pub fn parsed_depends(&self) -> Vec<DependsOn> {
        self.depends.iter().map(|d| DependsOn::parse(d)).collect()
    }

    /// All text blobs that may contain token references: cmd, restart_cmd,
    /// and every resource field that carries a string value.
    pub fn token_bearing_text(&self) -> Vec<&str> {
        let mut out = vec![self.cmd.as_str()];
        if let Some(r) = &self.restart_cmd {
            out.push(r);
        }
        if let Some(w) = &self.resources.walltime {
            out.push(w);
        }
        if let Some(b) = &self.resources.bind {
            out.push(b);
        }
        if let Some(r) = &self.resources.reservation {
            out.push(r);
        }
        if let Some(q) = &self.resources.qos {
            out.push(q);
        }
        out
    }
}
