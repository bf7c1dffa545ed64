// SPDX-License-Identifier: MIT

//! Durable on-disk representation of the execution graph: the conductor
//! rewrites this file atomically after every loop iteration so a fresh
//! process can resume (state per node, counters, submit ids, timestamps).

use crate::StorageError;
use chrono::{DateTime, Utc};
use cond_core::ExecutionGraph;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A point-in-time snapshot of the execution graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub graph: ExecutionGraph,
    pub created_at: DateTime<Utc>,
}

impl GraphSnapshot {
    pub fn new(graph: ExecutionGraph) -> Self {
        Self {
            graph,
            created_at: Utc::now(),
        }
    }

    /// Save atomically: write to a `.tmp` sibling, `fsync`, then rename over
    /// `path`. A crash mid-write leaves the previous snapshot intact.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Discard the snapshot envelope and take ownership of the graph.
    pub fn into_graph(self) -> ExecutionGraph {
        self.graph
    }

    /// Load the snapshot at `path`, or `Ok(None)` if it doesn't exist. A
    /// corrupt snapshot is rotated to a `.bak` file and treated as absent,
    /// so the conductor starts a fresh graph rather than failing outright.
    pub fn load(path: &Path) -> Result<Option<Self>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let bak_path = rotate_bak_path(path);
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak_path.display(),
                    "corrupt graph snapshot, moving to .bak and starting fresh",
                );
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak`/`.bak.N` path, rotating older backups out. Keeps up
/// to [`MAX_BAK_FILES`] backups, oldest dropped first.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}
