// SPDX-License-Identifier: MIT

//! The study expander: turns a [`LoadedSpec`] plus a resolved environment
//! into a concrete [`ExecutionGraph`] — dependency-aware parameter
//! propagation, per-combination fan-out, `_*` fan-in, workspace assignment,
//! token substitution, and eager script rendering (so `--dry` has something
//! to show without launching the conductor).

use cond_adapters::{AdapterError, RenderContext, SchedulerAdapter};
use cond_core::workspace::{workspace_path, HashwsSidecar};
use cond_core::{
    BatchDefaults, DependsOn, ExecutionGraph, JobInstance, JobInstanceId, ParameterCombination,
    ResourceRequest, StepTemplate,
};
use cond_spec::LoadedSpec;
use cond_token::{substitute, EvalContext, TokenError};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("cyclic step dependency involving: {0:?}")]
    CyclicDependency(Vec<String>),

    #[error("token substitution failed for step '{step}': {source}")]
    Token {
        step: String,
        #[source]
        source: TokenError,
    },

    #[error("script render failed for step '{step}': {source}")]
    Render {
        step: String,
        #[source]
        source: AdapterError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the expander needs beyond the loaded spec and parameter model:
/// the resolved environment (variables, labels, acquired dependency paths),
/// the study's output location, and the `hashws` workspace-naming flag.
pub struct ExpandContext {
    pub study_root: PathBuf,
    pub spec_root: PathBuf,
    pub hashws: bool,
    pub batch_defaults: BatchDefaults,
    pub variables: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub dependencies: HashMap<String, String>,
}

/// Topologically sort `steps` by `depends[]`, ignoring the fan-in `_*`
/// suffix for ordering purposes (fan-in preserves the same ordering
/// relation as a per-combination dependency).
fn topo_sort(steps: &[StepTemplate]) -> Result<Vec<&StepTemplate>, ExpandError> {
    let by_name: HashMap<&str, &StepTemplate> = steps.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut in_degree: HashMap<&str, usize> = steps.iter().map(|s| (s.name.as_str(), 0)).collect();
    let mut children: HashMap<&str, Vec<&str>> = steps.iter().map(|s| (s.name.as_str(), Vec::new())).collect();

    for s in steps {
        for d in s.parsed_depends() {
            let parent = by_name
                .get_key_value(d.step_name())
                .map(|(k, _)| *k)
                .unwrap_or(d.step_name());
            if let Some(deg) = in_degree.get_mut(s.name.as_str()) {
                *deg += 1;
            }
            if let Some(kids) = children.get_mut(parent) {
                kids.push(s.name.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = steps
        .iter()
        .map(|s| s.name.as_str())
        .filter(|n| in_degree[n] == 0)
        .collect();

    let mut order = Vec::with_capacity(steps.len());
    while let Some(name) = queue.pop_front() {
        order.push(by_name[name]);
        for &child in children.get(name).into_iter().flatten() {
            if let Some(deg) = in_degree.get_mut(child) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    if order.len() != steps.len() {
        let remaining: Vec<String> = steps
            .iter()
            .map(|s| s.name.clone())
            .filter(|n| !order.iter().any(|o| &o.name == n))
            .collect();
        return Err(ExpandError::CyclicDependency(remaining));
    }
    Ok(order)
}

/// Substitute every string-valued resource field against `ctx`/`workspaces`.
fn substitute_resources(
    resources: &ResourceRequest,
    ctx: &EvalContext,
    workspaces: &HashMap<String, String>,
) -> Result<ResourceRequest, TokenError> {
    let mut out = resources.clone();
    if let Some(w) = &resources.walltime {
        out.walltime = Some(substitute(w, ctx, workspaces)?.text);
    }
    if let Some(b) = &resources.bind {
        out.bind = Some(substitute(b, ctx, workspaces)?.text);
    }
    if let Some(r) = &resources.reservation {
        out.reservation = Some(substitute(r, ctx, workspaces)?.text);
    }
    if let Some(q) = &resources.qos {
        out.qos = Some(substitute(q, ctx, workspaces)?.text);
    }
    Ok(out)
}

fn eval_context(
    ctx: &ExpandContext,
    combo: Option<&ParameterCombination>,
    workspace: &Path,
) -> EvalContext {
    let mut ec = EvalContext {
        variables: ctx.variables.clone(),
        labels: ctx.labels.clone(),
        dependencies: ctx.dependencies.clone(),
        ..EvalContext::new()
    };
    ec.reserved.insert("SPECROOT".to_string(), ctx.spec_root.display().to_string());
    ec.reserved
        .insert("OUTPUT_PATH".to_string(), ctx.study_root.display().to_string());
    ec.reserved
        .insert("WORKSPACE".to_string(), workspace.display().to_string());
    if let Some(combo) = combo {
        for (name, value) in &combo.values {
            ec.parameter_values.insert(name.clone(), value.clone());
        }
        for (name, label) in &combo.labels {
            ec.parameter_labels.insert(name.clone(), label.clone());
        }
    }
    ec
}

/// One emitted job instance, kept alongside the [`ParameterCombination`] it
/// was expanded for so edge-building can match parent/child projections.
#[derive(Clone)]
struct Emitted {
    id: JobInstanceId,
    combo: Option<ParameterCombination>,
}

/// Expand `loaded` into a concrete execution graph. Also emits each
/// instance's rendered script to its workspace (eagerly — `--dry` needs
/// this without launching the conductor) and returns the `hashws` sidecar
/// recording the original combo_key for any hashed workspace name.
pub fn expand(
    loaded: &LoadedSpec,
    ctx: &ExpandContext,
    adapter: &dyn SchedulerAdapter,
) -> Result<(ExecutionGraph, HashwsSidecar), ExpandError> {
    let sorted = topo_sort(&loaded.steps)?;
    let param_names: BTreeSet<String> = loaded.parameters.names().into_iter().collect();
    let declared_order: Vec<String> = loaded.parameters.names();

    let mut effective_used: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut graph = ExecutionGraph::new();
    let mut sidecar = HashwsSidecar::default();
    let mut workspaces: HashMap<String, String> = HashMap::new();
    let mut emitted: HashMap<String, Vec<Emitted>> = HashMap::new();

    for step in &sorted {
        let direct = cond_core::used_parameters(&step.token_bearing_text(), &ctx.labels, &param_names);
        let mut eff = direct;
        for dep in step.parsed_depends() {
            if let DependsOn::PerCombination(parent) = dep {
                if let Some(parent_eff) = effective_used.get(&parent) {
                    eff.extend(parent_eff.iter().cloned());
                }
            }
        }
        effective_used.insert(step.name.clone(), eff.clone());

        let used_in_order: Vec<String> = declared_order.iter().filter(|n| eff.contains(*n)).cloned().collect();
        let combos: Vec<Option<ParameterCombination>> = if eff.is_empty() {
            vec![None]
        } else {
            loaded.parameters.project(&eff).into_iter().map(Some).collect()
        };

        debug!(step = %step.name, instances = combos.len(), "expanding step");

        let mut step_emitted = Vec::with_capacity(combos.len());
        for combo in combos {
            let combo_key = combo.as_ref().map(|c| c.combo_key(&used_in_order));
            let instance_id = match &combo_key {
                Some(key) => JobInstanceId::new(format!("{}_{}", step.name, key)),
                None => JobInstanceId::new(step.name.clone()),
            };
            let workspace = workspace_path(&ctx.study_root, &step.name, combo_key.as_deref(), ctx.hashws);
            std::fs::create_dir_all(&workspace)?;
            if ctx.hashws {
                if let Some(key) = &combo_key {
                    sidecar.record(&step.name, key);
                }
            }

            let eval_ctx = eval_context(ctx, combo.as_ref(), &workspace);
            let cmd = substitute(&step.cmd, &eval_ctx, &workspaces)
                .map_err(|source| ExpandError::Token {
                    step: step.name.clone(),
                    source,
                })?
                .text;
            let restart_cmd = match &step.restart_cmd {
                Some(text) => Some(
                    substitute(text, &eval_ctx, &workspaces)
                        .map_err(|source| ExpandError::Token {
                            step: step.name.clone(),
                            source,
                        })?
                        .text,
                ),
                None => None,
            };
            let resources = substitute_resources(&step.resources, &eval_ctx, &workspaces).map_err(|source| {
                ExpandError::Token {
                    step: step.name.clone(),
                    source,
                }
            })?;

            if !workspaces.contains_key(&step.name) {
                workspaces.insert(step.name.clone(), workspace.display().to_string());
            }

            let render_ctx = RenderContext {
                cmd: &cmd,
                resources: &resources,
                batch_defaults: &ctx.batch_defaults,
                workspace: &workspace,
            };
            let script = adapter.render(&render_ctx).map_err(|source| ExpandError::Render {
                step: step.name.clone(),
                source,
            })?;
            std::fs::write(workspace.join(format!("{}.sh", step.name)), script)?;

            let instance =
                JobInstance::new(instance_id.clone(), step.name.clone(), combo_key, workspace, cmd, restart_cmd, resources);
            graph.add_node(instance);
            step_emitted.push(Emitted {
                id: instance_id,
                combo,
            });
        }
        emitted.insert(step.name.clone(), step_emitted);
    }

    for step in &sorted {
        for dep in step.parsed_depends() {
            match dep {
                DependsOn::PerCombination(parent) => {
                    let parent_used = effective_used.get(&parent).cloned().unwrap_or_default();
                    let parent_order: Vec<String> =
                        declared_order.iter().filter(|n| parent_used.contains(*n)).cloned().collect();
                    let parent_instances = emitted.get(&parent).cloned().unwrap_or_default();
                    let mut by_key: HashMap<Option<String>, JobInstanceId> = HashMap::new();
                    for p in &parent_instances {
                        let key = p.combo.as_ref().map(|c| c.combo_key(&parent_order));
                        by_key.insert(key, p.id.clone());
                    }
                    for child in &emitted[&step.name] {
                        let key = child.combo.as_ref().map(|c| c.combo_key(&parent_order));
                        if let Some(parent_id) = by_key.get(&key) {
                            graph.add_edge(parent_id.clone(), child.id.clone());
                        }
                    }
                }
                DependsOn::FanIn(parent) => {
                    if let Some(parent_instances) = emitted.get(&parent) {
                        for p in parent_instances {
                            for child in &emitted[&step.name] {
                                graph.add_edge(p.id.clone(), child.id.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    info!(nodes = graph.len(), "study expansion complete");
    Ok((graph, sidecar))
}
