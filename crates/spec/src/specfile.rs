// SPDX-License-Identifier: MIT

//! The on-disk YAML specification format and its deserialization.

use cond_core::step::ResourceRequest;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read spec file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spec YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("parameter '{0}' has an empty values list")]
    EmptyParameterValues(String),

    #[error("parameter '{name}' has {got} values, expected {expected} (all parameters must share the same length)")]
    UnequalParameterLength {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("parameter '{0}' label template is missing the '%%' placeholder")]
    LabelMissingPlaceholder(String),

    #[error("duplicate parameter name '{0}'")]
    DuplicateParameter(String),

    #[error("step '{0}' is declared more than once")]
    DuplicateStep(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("cyclic step dependency involving: {0:?}")]
    CyclicDependency(Vec<String>),
}

/// `description:` top-level block.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DescriptionBlock {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// `env:` top-level block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnvBlock {
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

/// One `env.dependencies[]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DependencySpec {
    Path { name: String, path: String },
    Git {
        name: String,
        url: String,
        #[serde(default)]
        tag: Option<String>,
    },
}

impl DependencySpec {
    pub fn name(&self) -> &str {
        match self {
            DependencySpec::Path { name, .. } => name,
            DependencySpec::Git { name, .. } => name,
        }
    }
}

/// `batch:` top-level block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BatchBlock {
    #[serde(default, rename = "type")]
    pub scheduler_type: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default, flatten)]
    pub resources: ResourceRequest,
}

/// `run:` block of a step template.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunBlock {
    pub cmd: String,
    #[serde(default)]
    pub restart: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
}

/// One entry of the `study:` list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub run: RunBlock,
    #[serde(default, flatten)]
    pub resources: ResourceRequest,
}

/// One entry of `global.parameters`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParameterSpec {
    pub values: Vec<String>,
    pub label: String,
}

/// `global:` top-level block.
///
/// `parameters` is an `IndexMap`, not a `HashMap`: declaration order in the
/// YAML document is significant (it is the order `combo_key` joins labels
/// in), and `serde_yaml` preserves insertion order through an `IndexMap`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlobalBlock {
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterSpec>,
}

/// The whole YAML document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpecFile {
    pub description: DescriptionBlock,
    #[serde(default)]
    pub env: EnvBlock,
    #[serde(default)]
    pub batch: BatchBlock,
    pub study: Vec<StepSpec>,
    #[serde(default)]
    pub global: GlobalBlock,
}

impl SpecFile {
    pub fn from_str(text: &str) -> Result<Self, SpecError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
description:
  name: hello-world
study:
  - name: say-hello
    run:
      cmd: echo "Hello, World!" > hello_world.txt
"#;

    #[test]
    fn parses_minimal_spec() {
        let spec = SpecFile::from_str(MINIMAL).unwrap();
        assert_eq!(spec.description.name, "hello-world");
        assert_eq!(spec.study.len(), 1);
        assert_eq!(spec.study[0].name, "say-hello");
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let text = format!("{MINIMAL}\nbogus: true\n");
        assert!(SpecFile::from_str(&text).is_err());
    }

    #[test]
    fn parses_fan_in_dependency_suffix() {
        let text = r#"
description:
  name: fan-in
study:
  - name: say-hello
    run:
      cmd: echo hi
  - name: bye-all
    run:
      cmd: echo bye
      depends: [say-hello_*]
"#;
        let spec = SpecFile::from_str(text).unwrap();
        assert_eq!(spec.study[1].run.depends, vec!["say-hello_*".to_string()]);
    }

    #[test]
    fn parses_global_parameters() {
        let text = r#"
description:
  name: fan-out
study:
  - name: say-hello
    run:
      cmd: echo "Hello, $(PLANET)!"
global:
  parameters:
    PLANET:
      values: [Mercury, Venus, Earth]
      label: "PLANET.%%"
"#;
        let spec = SpecFile::from_str(text).unwrap();
        let planet = &spec.global.parameters["PLANET"];
        assert_eq!(planet.values, vec!["Mercury", "Venus", "Earth"]);
        assert_eq!(planet.label, "PLANET.%%");
    }
}
