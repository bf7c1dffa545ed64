// SPDX-License-Identifier: MIT

//! Custom parameter generator plugin: an external subprocess or a built-in
//! registry of named generators, each returning a [`ParameterModel`] over a
//! well-defined boundary. Not part of the core's trust boundary.

use cond_core::ParameterModel;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

const GENERATOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator subprocess '{path}' failed: {message}")]
    SubprocessFailed { path: String, message: String },

    #[error("generator subprocess '{path}' exited with status {status}: {stderr}")]
    NonZeroExit {
        path: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to parse generator output as a parameter table: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("unknown built-in generator '{0}'")]
    UnknownBuiltin(String),

    #[error("built-in generator '{generator}' rejected args: {message}")]
    BadArgs { generator: String, message: String },

    #[error(transparent)]
    Parameter(#[from] cond_core::ParameterError),
}

/// A single entry of a generator's JSON output: `{name, values, label}`.
#[derive(Debug, Deserialize)]
struct GeneratedParameter {
    name: String,
    values: Vec<String>,
    label: String,
}

/// Something that can produce a [`ParameterModel`] given user-supplied
/// key-value args (`pargs`).
pub trait ParameterGenerator {
    fn generate(&self, pargs: &HashMap<String, String>) -> Result<ParameterModel, GeneratorError>;
}

/// Invokes an external plugin script/binary as a subprocess, passing `pargs`
/// as `--key value` flags, and parses a JSON array of
/// `{name, values, label}` objects from stdout.
pub struct SubprocessGenerator {
    pub path: String,
}

impl SubprocessGenerator {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub async fn generate_async(
        &self,
        pargs: &HashMap<String, String>,
    ) -> Result<ParameterModel, GeneratorError> {
        let mut cmd = Command::new(&self.path);
        for (k, v) in pargs {
            cmd.arg(format!("--{k}")).arg(v);
        }

        let output = tokio::time::timeout(GENERATOR_TIMEOUT, cmd.output())
            .await
            .map_err(|_| GeneratorError::SubprocessFailed {
                path: self.path.clone(),
                message: format!("timed out after {}s", GENERATOR_TIMEOUT.as_secs()),
            })?
            .map_err(|e| GeneratorError::SubprocessFailed {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GeneratorError::NonZeroExit {
                path: self.path.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let entries: Vec<GeneratedParameter> = serde_json::from_slice(&output.stdout)?;
        parameter_model_from_entries(entries)
    }
}

fn parameter_model_from_entries(
    entries: Vec<GeneratedParameter>,
) -> Result<ParameterModel, GeneratorError> {
    let mut model = ParameterModel::new();
    for e in entries {
        model.add_parameter(e.name, e.values, e.label)?;
    }
    Ok(model)
}

/// Built-in generators addressable by name, avoiding a subprocess for the
/// common cases.
pub struct BuiltinRegistry;

impl BuiltinRegistry {
    /// Look up and run a named built-in generator.
    pub fn run(
        name: &str,
        pargs: &HashMap<String, String>,
    ) -> Result<ParameterModel, GeneratorError> {
        match name {
            "range" => range_generator(pargs),
            "cartesian" => cartesian_generator(pargs),
            other => Err(GeneratorError::UnknownBuiltin(other.to_string())),
        }
    }
}

/// `range`: generates a single parameter `start..end` integer sequence.
/// Expects `pargs["name"]`, `pargs["start"]`, `pargs["end"]`, optional
/// `pargs["label"]` (defaults to `"<name>.%%"`).
fn range_generator(pargs: &HashMap<String, String>) -> Result<ParameterModel, GeneratorError> {
    let bad_args = |message: String| GeneratorError::BadArgs {
        generator: "range".to_string(),
        message,
    };

    let name = pargs
        .get("name")
        .ok_or_else(|| bad_args("missing 'name'".to_string()))?;
    let start: i64 = pargs
        .get("start")
        .ok_or_else(|| bad_args("missing 'start'".to_string()))?
        .parse()
        .map_err(|_| bad_args("'start' is not an integer".to_string()))?;
    let end: i64 = pargs
        .get("end")
        .ok_or_else(|| bad_args("missing 'end'".to_string()))?
        .parse()
        .map_err(|_| bad_args("'end' is not an integer".to_string()))?;
    let label = pargs
        .get("label")
        .cloned()
        .unwrap_or_else(|| format!("{name}.%%"));

    if end <= start {
        return Err(bad_args(format!("'end' ({end}) must be greater than 'start' ({start})")));
    }

    let values: Vec<String> = (start..end).map(|v| v.to_string()).collect();
    let mut model = ParameterModel::new();
    model.add_parameter(name.clone(), values, label)?;
    Ok(model)
}

/// `cartesian`: takes `key=v1,v2;key2=v3,v4` pairs and emits the full cross
/// product as equal-length parameters, one per key.
fn cartesian_generator(pargs: &HashMap<String, String>) -> Result<ParameterModel, GeneratorError> {
    let bad_args = |message: String| GeneratorError::BadArgs {
        generator: "cartesian".to_string(),
        message,
    };

    let spec = pargs
        .get("pairs")
        .ok_or_else(|| bad_args("missing 'pairs'".to_string()))?;

    let mut axes: Vec<(String, Vec<String>)> = Vec::new();
    for clause in spec.split(';').filter(|c| !c.trim().is_empty()) {
        let (key, values) = clause
            .split_once('=')
            .ok_or_else(|| bad_args(format!("clause '{clause}' is missing '='")))?;
        let values: Vec<String> = values.split(',').map(|v| v.trim().to_string()).collect();
        if values.is_empty() {
            return Err(bad_args(format!("key '{key}' has no values")));
        }
        axes.push((key.trim().to_string(), values));
    }
    if axes.is_empty() {
        return Err(bad_args("no key=values clauses found".to_string()));
    }

    let mut rows: Vec<Vec<String>> = vec![vec![]];
    for (_, values) in &axes {
        let mut next = Vec::with_capacity(rows.len() * values.len());
        for row in &rows {
            for v in values {
                let mut extended = row.clone();
                extended.push(v.clone());
                next.push(extended);
            }
        }
        rows = next;
    }

    let mut model = ParameterModel::new();
    for (i, (key, _)) in axes.iter().enumerate() {
        let column: Vec<String> = rows.iter().map(|row| row[i].clone()).collect();
        model.add_parameter(key.clone(), column, format!("{key}.%%"))?;
    }
    Ok(model)
}
