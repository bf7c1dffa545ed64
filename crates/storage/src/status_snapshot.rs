// SPDX-License-Identifier: MIT

//! The human-readable `status.snapshot` file: one row per node (name,
//! workspace, state, timestamps, restarts), consumed by the `status` CLI
//! command and by operators tailing the file directly.

use crate::StorageError;
use cond_core::ExecutionGraph;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const COLUMNS: [&str; 7] = [
    "NAME", "WORKSPACE", "STATE", "SUBMIT_TIME", "START_TIME", "END_TIME", "RESTARTS",
];

fn fmt_time(t: Option<chrono::DateTime<chrono::Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

/// Render the plain-text status table for `graph`, nodes in declaration
/// order, columns tab-separated.
pub fn render(graph: &ExecutionGraph) -> String {
    let mut out = String::new();
    out.push_str(&COLUMNS.join("\t"));
    out.push('\n');
    for node in graph.nodes() {
        let name = match &node.combo_key {
            Some(combo) => format!("{}/{}", node.step_name, combo),
            None => node.step_name.clone(),
        };
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            name,
            node.workspace.display(),
            node.state,
            fmt_time(node.submit_time),
            fmt_time(node.start_time),
            fmt_time(node.end_time),
            node.restarts,
        ));
    }
    out
}

/// Write the status snapshot atomically, mirroring [`crate::GraphSnapshot::save`].
pub fn write(graph: &ExecutionGraph, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(render(graph).as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
