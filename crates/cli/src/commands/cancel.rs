// SPDX-License-Identifier: MIT

//! `cond cancel <dir...>` - drop a `.cancel` sentinel into one or more study
//! directories, picked up by the running conductor's next loop iteration.

use anyhow::{Context, Result};
use clap::Args;
use cond_engine::sentinel::CANCEL_SENTINEL;
use std::path::PathBuf;

#[derive(Args)]
pub struct CancelArgs {
    /// One or more study output directories.
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,
}

pub fn execute(args: CancelArgs) -> Result<()> {
    for dir in &args.dirs {
        let path = dir.join(CANCEL_SENTINEL);
        std::fs::write(&path, b"")
            .with_context(|| format!("writing cancel sentinel at {}", path.display()))?;
        println!("cancel requested for {}", dir.display());
    }
    Ok(())
}
