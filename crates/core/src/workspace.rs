// SPDX-License-Identifier: MIT

//! Workspace path policy for step instances.
//!
//! A step-instance workspace is `<study_root>/<step_name>/<combo_key>` when
//! the step is parameterized, else `<study_root>/<step_name>`. When `hashws`
//! is set, `combo_key` is replaced with a fixed-length digest so the OS path
//! length limit can't be exceeded; the label mapping is preserved in a
//! sidecar so status rendering can still display it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Length (in hex chars) of the digest used when `hashws` is set.
pub const HASHWS_DIGEST_LEN: usize = 16;

/// Compute the workspace directory for a step instance.
///
/// `combo_key` is `None` for an unparameterized step. When `hashws` is true
/// and a combo_key is present, it is replaced with a short digest.
pub fn workspace_path(study_root: &Path, step_name: &str, combo_key: Option<&str>, hashws: bool) -> PathBuf {
    match combo_key {
        None => study_root.join(step_name),
        Some(key) => {
            let dir_name = if hashws {
                hash_combo_key(key)
            } else {
                key.to_string()
            };
            study_root.join(step_name).join(dir_name)
        }
    }
}

/// Fixed-length digest of a combo_key, used as the on-disk directory name
/// when `hashws` is set.
pub fn hash_combo_key(combo_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(combo_key.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, HASHWS_DIGEST_LEN)
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let mut s = String::with_capacity(len);
    for b in bytes {
        if s.len() >= len {
            break;
        }
        s.push_str(&format!("{:02x}", b));
    }
    s.truncate(len);
    s
}

/// Sidecar record mapping a `hashws` digest back to its original combo_key,
/// so status rendering can still display human-readable labels.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HashwsSidecar {
    pub entries: Vec<HashwsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HashwsEntry {
    pub step_name: String,
    pub digest: String,
    pub combo_key: String,
}

impl HashwsSidecar {
    pub fn record(&mut self, step_name: &str, combo_key: &str) {
        let digest = hash_combo_key(combo_key);
        if !self
            .entries
            .iter()
            .any(|e| e.step_name == step_name && e.digest == digest)
        {
            self.entries.push(HashwsEntry {
                step_name: step_name.to_string(),
                digest,
                combo_key: combo_key.to_string(),
            });
        }
    }

    pub fn lookup(&self, step_name: &str, digest: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.step_name == step_name && e.digest == digest)
            .map(|e| e.combo_key.as_str())
    }
}
