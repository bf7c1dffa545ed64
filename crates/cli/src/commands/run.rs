// SPDX-License-Identifier: MIT

//! `cond run <spec>` - expand a study spec into an execution graph and
//! launch its conductor, in the foreground or as a detached background
//! process.

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use cond_adapters::build_adapter;
use cond_core::{BatchDefaults, ResolvedEnv, RuntimeConfig, SchedulerKind, Study, SystemClock};
use cond_daemon::{lifecycle, Config};
use cond_engine::expand::{self, ExpandContext};
use cond_spec::specfile::{DependencySpec, SpecFile};
use cond_spec::{load, Dependency};
use cond_storage::{status_snapshot, GraphSnapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const STUDY_META_FILENAME: &str = "study.json";

#[derive(Args)]
pub struct RunArgs {
    /// Study spec YAML file. Omitted only when resuming via `--resume`.
    pub spec: Option<PathBuf>,

    /// Maximum submission attempts before a node is terminalized as failed.
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Maximum restarts on timeout before a node is terminalized as failed (0 = unbounded).
    #[arg(long)]
    pub rlimit: Option<u32>,

    /// Maximum concurrently running nodes (0 = unbounded).
    #[arg(long)]
    pub throttle: Option<u32>,

    /// Seconds between conductor loop iterations.
    #[arg(long)]
    pub sleep: Option<u64>,

    /// Expand and render scripts only; do not launch the conductor.
    #[arg(long)]
    pub dry: bool,

    /// Custom parameter generator: a built-in name (`range`, `cartesian`) or a subprocess path.
    #[arg(long)]
    pub pgen: Option<String>,

    /// `key=value` args passed to the parameter generator; repeatable.
    #[arg(long = "pargs")]
    pub pargs: Vec<String>,

    /// Override the study output root (otherwise the current directory).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Run the conductor in the foreground instead of backgrounding it.
    #[arg(long)]
    pub fg: bool,

    /// Replace per-combination workspace suffixes with a fixed-length digest.
    #[arg(long)]
    pub hashws: bool,

    /// Use a system temp directory as the output root.
    #[arg(long)]
    pub usetmp: bool,

    /// Resume an already-expanded study instead of expanding `spec`.
    #[arg(long, hide = true)]
    pub resume: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    if let Some(study_root) = args.resume.clone() {
        return resume(&study_root).await;
    }

    let spec_path = args
        .spec
        .clone()
        .ok_or_else(|| anyhow!("a spec file is required unless --resume is given"))?;

    let spec_file = SpecFile::from_path(&spec_path)?;
    let batch_defaults = batch_defaults_from(&spec_file.batch)?;
    let spec_root = spec_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let output_root = resolve_output_root(&args);
    let loaded = load::load(spec_file.clone())?;
    let study_root = output_root.join(format!(
        "{}_{}",
        loaded.name,
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    std::fs::create_dir_all(&study_root).context("creating study output directory")?;

    if let Some(file_name) = spec_path.file_name() {
        std::fs::copy(&spec_path, study_root.join(file_name)).context("copying spec into study root")?;
    }

    let dependencies = acquire_dependencies(&spec_file.env.dependencies, &study_root).await?;
    let parameters = match &args.pgen {
        Some(name) => generate_parameters(name, &args.pargs)?,
        None => loaded.parameters.clone(),
    };
    let mut loaded = loaded;
    loaded.parameters = parameters;

    let runtime = runtime_config_from(&args);
    let ctx = ExpandContext {
        study_root: study_root.clone(),
        spec_root,
        hashws: args.hashws,
        batch_defaults: batch_defaults.clone(),
        variables: spec_file.env.variables.clone(),
        labels: spec_file.env.labels.clone(),
        dependencies,
    };
    let adapter = build_adapter(batch_defaults.scheduler.unwrap_or(SchedulerKind::Local));
    let (mut graph, _sidecar) = expand::expand(&loaded, &ctx, adapter.as_ref())?;

    if args.dry {
        println!(
            "expanded {} instance(s) into {}",
            graph.len(),
            study_root.display()
        );
        return Ok(());
    }

    let study = Study {
        name: loaded.name.clone(),
        description: loaded.description.clone(),
        output_root: output_root.clone(),
        spec_root: ctx.spec_root.clone(),
        batch: batch_defaults.clone(),
        env: ResolvedEnv {
            variables: ctx.variables.clone(),
            labels: ctx.labels.clone(),
            dependencies: ctx.dependencies.clone(),
        },
        runtime: runtime.clone(),
    };
    persist_study(&study, &study_root)?;
    GraphSnapshot::new(graph.clone()).save(&study_root.join(cond_engine::conductor::GRAPH_SNAPSHOT_FILENAME))?;
    status_snapshot::write(&graph, &study_root.join(cond_engine::conductor::STATUS_SNAPSHOT_FILENAME))?;

    if args.fg {
        let config = Config::new(&study_root);
        let _log_guard = cond_daemon::setup_logging(&config.log_path)?;
        let mut runtime = runtime;
        lifecycle::run_foreground(&config, &mut graph, &mut runtime, &batch_defaults, adapter.as_ref(), &SystemClock)
            .await?;
        println!("study finished: {}", study_root.display());
    } else {
        let exe_args = vec![
            "run".to_string(),
            "--resume".to_string(),
            study_root.display().to_string(),
            "--fg".to_string(),
        ];
        let pid = lifecycle::spawn_background(exe_args, &study_root)?;
        println!("launched conductor (pid {pid}) for {}", study_root.display());
    }
    Ok(())
}

async fn resume(study_root: &Path) -> Result<()> {
    let study_path = study_root.join("meta").join(STUDY_META_FILENAME);
    let text = std::fs::read_to_string(&study_path).context("reading study metadata for resume")?;
    let study: Study = serde_json::from_str(&text).context("parsing study metadata")?;

    let snapshot_path = study_root.join(cond_engine::conductor::GRAPH_SNAPSHOT_FILENAME);
    let mut graph = GraphSnapshot::load(&snapshot_path)?
        .ok_or_else(|| anyhow!("no graph snapshot found at {}", snapshot_path.display()))?
        .into_graph();

    let mut runtime = study.runtime.clone();
    let adapter = build_adapter(study.batch.scheduler.unwrap_or(SchedulerKind::Local));
    let config = Config::new(study_root);
    let _log_guard = cond_daemon::setup_logging(&config.log_path)?;
    lifecycle::run_foreground(&config, &mut graph, &mut runtime, &study.batch, adapter.as_ref(), &SystemClock).await?;
    Ok(())
}

fn resolve_output_root(args: &RunArgs) -> PathBuf {
    if let Some(out) = &args.out {
        return out.clone();
    }
    if args.usetmp {
        return std::env::temp_dir();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn runtime_config_from(args: &RunArgs) -> RuntimeConfig {
    let mut runtime = RuntimeConfig::default();
    if let Some(attempts) = args.attempts {
        runtime.attempts_max = attempts;
    }
    if let Some(rlimit) = args.rlimit {
        runtime.rlimit = rlimit;
    }
    if let Some(throttle) = args.throttle {
        runtime.throttle = throttle;
    }
    if let Some(sleep) = args.sleep {
        runtime.sleep_interval = sleep;
    }
    runtime.hashws = args.hashws;
    runtime
}

fn batch_defaults_from(batch: &cond_spec::specfile::BatchBlock) -> Result<BatchDefaults> {
    let scheduler = batch
        .scheduler_type
        .as_deref()
        .map(|s| s.parse::<SchedulerKind>())
        .transpose()
        .map_err(|e| anyhow!(e))?;
    Ok(BatchDefaults {
        scheduler,
        host: batch.host.clone(),
        bank: batch.bank.clone(),
        queue: batch.queue.clone(),
        resources: batch.resources.clone(),
    })
}

async fn acquire_dependencies(
    specs: &[DependencySpec],
    study_root: &Path,
) -> Result<HashMap<String, String>> {
    let meta_dir = study_root.join("meta");
    let mut resolved = HashMap::new();
    for spec in specs {
        let dependency = match spec {
            DependencySpec::Path { name, path } => Dependency::Path {
                name: name.clone(),
                path: PathBuf::from(path),
            },
            DependencySpec::Git { name, url, tag } => Dependency::Git {
                name: name.clone(),
                url: url.clone(),
                dest: meta_dir.join(name),
                tag: tag.clone(),
            },
        };
        let path = dependency.acquire().await?;
        resolved.insert(spec.name().to_string(), path.display().to_string());
    }
    Ok(resolved)
}

fn generate_parameters(pgen: &str, pargs: &[String]) -> Result<cond_core::ParameterModel> {
    let mut args = HashMap::new();
    for kv in pargs {
        let (k, v) = kv
            .split_once('=')
            .ok_or_else(|| anyhow!("--pargs entry '{kv}' is not in key=value form"))?;
        args.insert(k.to_string(), v.to_string());
    }
    match cond_spec::BuiltinRegistry::run(pgen, &args) {
        Ok(model) => Ok(model),
        Err(cond_spec::GeneratorError::UnknownBuiltin(_)) => {
            let generator = cond_spec::SubprocessGenerator::new(pgen.to_string());
            let model = futures::executor::block_on(generator.generate_async(&args))?;
            Ok(model)
        }
        Err(e) => bail!(e),
    }
}

fn persist_study(study: &Study, study_root: &Path) -> Result<()> {
    let meta_dir = study_root.join("meta");
    std::fs::create_dir_all(&meta_dir)?;
    let text = serde_json::to_string_pretty(study)?;
    std::fs::write(meta_dir.join(STUDY_META_FILENAME), text)?;
    Ok(())
}
