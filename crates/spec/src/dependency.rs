// SPDX-License-Identifier: MIT

//! Dependency acquisition: verifying local paths and cloning git repositories
//! into the study workspace before expansion begins.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Timeout for `git clone`/`git checkout` invocations.
const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("dependency path '{0}' does not exist")]
    MissingPath(PathBuf),

    #[error("git clone of '{url}' into '{dest}' failed: {message}")]
    CloneFailed {
        url: String,
        dest: String,
        message: String,
    },

    #[error("git checkout of tag '{tag}' in '{dest}' failed: {message}")]
    CheckoutFailed {
        tag: String,
        dest: String,
        message: String,
    },
}

/// One declared external input, resolved to a concrete kind.
#[derive(Debug, Clone)]
pub enum Dependency {
    Path { name: String, path: PathBuf },
    Git {
        name: String,
        url: String,
        dest: PathBuf,
        tag: Option<String>,
    },
}

impl Dependency {
    pub fn name(&self) -> &str {
        match self {
            Dependency::Path { name, .. } => name,
            Dependency::Git { name, .. } => name,
        }
    }

    /// Verify or fetch this dependency, returning the resolved path to
    /// register into the token context as `$(name)`.
    pub async fn acquire(&self) -> Result<PathBuf, DependencyError> {
        match self {
            Dependency::Path { path, .. } => {
                if !path.exists() {
                    return Err(DependencyError::MissingPath(path.clone()));
                }
                Ok(path.clone())
            }
            Dependency::Git { url, dest, tag, .. } => {
                if dest.exists() && dest.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) {
                    debug!(dest = %dest.display(), "dependency clone already present, skipping");
                    return Ok(dest.clone());
                }
                clone(url, dest).await?;
                if let Some(tag) = tag {
                    checkout(dest, tag).await?;
                }
                info!(url, dest = %dest.display(), "acquired git dependency");
                Ok(dest.clone())
            }
        }
    }
}

async fn clone(url: &str, dest: &Path) -> Result<(), DependencyError> {
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg(url).arg(dest);
    let output = run_with_timeout(cmd, GIT_CLONE_TIMEOUT, "git clone")
        .await
        .map_err(|message| DependencyError::CloneFailed {
            url: url.to_string(),
            dest: dest.display().to_string(),
            message,
        })?;
    if !output.status.success() {
        return Err(DependencyError::CloneFailed {
            url: url.to_string(),
            dest: dest.display().to_string(),
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

async fn checkout(dest: &Path, tag: &str) -> Result<(), DependencyError> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(dest).arg("checkout").arg(tag);
    let output = run_with_timeout(cmd, GIT_CLONE_TIMEOUT, "git checkout")
        .await
        .map_err(|message| DependencyError::CheckoutFailed {
            tag: tag.to_string(),
            dest: dest.display().to_string(),
            message,
        })?;
    if !output.status.success() {
        return Err(DependencyError::CheckoutFailed {
            tag: tag.to_string(),
            dest: dest.display().to_string(),
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(())
}

async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<std::process::Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
    }
}
