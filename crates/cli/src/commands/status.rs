// SPDX-License-Identifier: MIT

//! `cond status <dir...>` - print the status snapshot for one or more
//! studies, prefixed by its directory when more than one is given.

use anyhow::{Context, Result};
use clap::Args;
use cond_engine::STATUS_SNAPSHOT_FILENAME;
use std::path::PathBuf;

#[derive(Args)]
pub struct StatusArgs {
    /// One or more study output directories.
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,
}

pub fn execute(args: StatusArgs) -> Result<()> {
    let multiple = args.dirs.len() > 1;
    for dir in &args.dirs {
        let path = dir.join(STATUS_SNAPSHOT_FILENAME);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading status snapshot at {}", path.display()))?;
        if multiple {
            println!("==> {} <==", dir.display());
        }
        print!("{text}");
    }
    Ok(())
}
