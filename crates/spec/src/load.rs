// SPDX-License-Identifier: MIT

//! Turns a parsed [`SpecFile`] into validated core types: a [`ParameterModel`]
//! and an ordered list of [`StepTemplate`]s, with the checks that are fatal
//! at load time rather than deferred to expansion.

use crate::specfile::{SpecError, SpecFile};
use cond_core::{ParameterError, ParameterModel, StepTemplate};
use std::collections::{HashMap, HashSet};

impl From<ParameterError> for SpecError {
    fn from(e: ParameterError) -> Self {
        match e {
            ParameterError::EmptyValues(name) => SpecError::EmptyParameterValues(name),
            ParameterError::MissingPlaceholder(name) => SpecError::LabelMissingPlaceholder(name),
            ParameterError::UnequalLength {
                name,
                got,
                expected,
            } => SpecError::UnequalParameterLength {
                name,
                got,
                expected,
            },
            ParameterError::DuplicateName(name) => SpecError::DuplicateParameter(name),
        }
    }
}

/// The load-time-validated form of a spec file, ready to hand to the expander.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub name: String,
    pub description: String,
    pub steps: Vec<StepTemplate>,
    pub parameters: ParameterModel,
    pub variables: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

pub fn load(spec: SpecFile) -> Result<LoadedSpec, SpecError> {
    let parameters = build_parameter_model(&spec)?;
    let steps = build_steps(&spec)?;
    check_duplicate_steps(&steps)?;
    check_known_dependencies(&steps)?;
    check_acyclic(&steps)?;

    Ok(LoadedSpec {
        name: spec.description.name,
        description: spec.description.description,
        steps,
        parameters,
        variables: spec.env.variables,
        labels: spec.env.labels,
    })
}

fn build_parameter_model(spec: &SpecFile) -> Result<ParameterModel, SpecError> {
    let mut model = ParameterModel::new();
    // global.parameters is an IndexMap, so this walks YAML declaration
    // order. combo_key ordering depends on it: `ParameterModel::project`
    // derives its insertion order from the order parameters are added here.
    for (name, p) in &spec.global.parameters {
        model.add_parameter(name.clone(), p.values.clone(), p.label.clone())?;
    }
    Ok(model)
}

fn build_steps(spec: &SpecFile) -> Result<Vec<StepTemplate>, SpecError> {
    Ok(spec
        .study
        .iter()
        .map(|s| StepTemplate {
            name: s.name.clone(),
            description: s.description.clone(),
            cmd: s.run.cmd.clone(),
            restart_cmd: s.run.restart.clone(),
            depends: s.run.depends.clone(),
            resources: s.resources.clone(),
        })
        .collect())
}

fn check_duplicate_steps(steps: &[StepTemplate]) -> Result<(), SpecError> {
    let mut seen = HashSet::new();
    for s in steps {
        if !seen.insert(s.name.as_str()) {
            return Err(SpecError::DuplicateStep(s.name.clone()));
        }
    }
    Ok(())
}

fn check_known_dependencies(steps: &[StepTemplate]) -> Result<(), SpecError> {
    let names: HashSet<&str> = steps.iter().map(|s| s.name.as_str()).collect();
    for s in steps {
        for d in s.parsed_depends() {
            if !names.contains(d.step_name()) {
                return Err(SpecError::UnknownDependency {
                    step: s.name.clone(),
                    dependency: d.step_name().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Cycle detection via iterative DFS with a recursion stack, ignoring the
/// per-combination/fan-in distinction.
fn check_acyclic(steps: &[StepTemplate]) -> Result<(), SpecError> {
    let by_name: HashMap<&str, &StepTemplate> = steps.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut state: HashMap<&str, u8> = HashMap::new(); // 0=unvisited 1=in-progress 2=done

    for s in steps {
        if state.get(s.name.as_str()).copied().unwrap_or(0) == 0 {
            let mut path = Vec::new();
            visit(s.name.as_str(), &by_name, &mut state, &mut path)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    name: &'a str,
    by_name: &HashMap<&'a str, &'a StepTemplate>,
    state: &mut HashMap<&'a str, u8>,
    path: &mut Vec<&'a str>,
) -> Result<(), SpecError> {
    state.insert(name, 1);
    path.push(name);

    if let Some(step) = by_name.get(name) {
        for d in step.parsed_depends() {
            let dep_name = by_name
                .get_key_value(d.step_name())
                .map(|(k, _)| *k)
                .unwrap_or(d.step_name());
            match state.get(dep_name).copied().unwrap_or(0) {
                0 => visit(dep_name, by_name, state, path)?,
                1 => {
                    let mut cycle: Vec<String> = path.iter().map(|s| s.to_string()).collect();
                    cycle.push(dep_name.to_string());
                    return Err(SpecError::CyclicDependency(cycle));
                }
                _ => {}
            }
        }
    }

    path.pop();
    state.insert(name, 2);
    Ok(())
}
