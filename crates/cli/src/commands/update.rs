// SPDX-License-Identifier: MIT

//! `cond update [--rlimit N] [--throttle N] [--sleep N] <dir...>` - write the
//! `.update` sentinel for one or more studies, adopted by the running
//! conductor's next loop iteration.

use anyhow::{bail, Context, Result};
use clap::Args;
use cond_engine::sentinel::{UpdateRequest, UPDATE_SENTINEL};
use std::path::PathBuf;

#[derive(Args)]
pub struct UpdateArgs {
    /// New restart-on-timeout limit (0 = unbounded).
    #[arg(long)]
    pub rlimit: Option<u32>,

    /// New maximum concurrently running nodes (0 = unbounded).
    #[arg(long)]
    pub throttle: Option<u32>,

    /// New seconds between conductor loop iterations.
    #[arg(long)]
    pub sleep: Option<u64>,

    /// One or more study output directories.
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,
}

pub fn execute(args: UpdateArgs) -> Result<()> {
    if args.rlimit.is_none() && args.throttle.is_none() && args.sleep.is_none() {
        bail!("update requires at least one of --rlimit, --throttle, --sleep");
    }

    let request = UpdateRequest {
        rlimit: args.rlimit,
        throttle: args.throttle,
        sleep_interval: args.sleep,
    };
    let body = serde_json::to_string(&request)?;

    for dir in &args.dirs {
        let path = dir.join(UPDATE_SENTINEL);
        std::fs::write(&path, &body)
            .with_context(|| format!("writing update sentinel at {}", path.display()))?;
        println!("update queued for {}", dir.display());
    }
    Ok(())
}
