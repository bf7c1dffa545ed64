// SPDX-License-Identifier: MIT

//! Per-study process layout: where the conductor's lock file and logs live,
//! all rooted under the study directory the expander already created.

use std::path::{Path, PathBuf};

/// Paths derived from a study's output directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// The study root, e.g. `<output_root>/<study_name>_<YYYYMMDD-HHMMSS>/`.
    pub study_root: PathBuf,
    /// Exclusive lock held for the lifetime of a running conductor, so a
    /// second `run`/resume against the same study fails fast.
    pub lock_path: PathBuf,
    /// Conductor log file, rotated by [`crate::logging::rotate_log_if_needed`].
    pub log_path: PathBuf,
}

impl Config {
    pub fn new(study_root: impl Into<PathBuf>) -> Self {
        let study_root = study_root.into();
        Self {
            lock_path: study_root.join("conductor.lock"),
            log_path: study_root.join("logs").join("conductor.log"),
            study_root,
        }
    }

    pub fn study_root(&self) -> &Path {
        &self.study_root
    }
}
