// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to render script at {path}: {message}")]
    RenderFailed { path: String, message: String },

    #[error("$(LAUNCHER) override requested {requested} {dimension}, but only {available} available")]
    LauncherOverrideExceedsResources {
        requested: u32,
        available: u32,
        dimension: String,
    },

    #[error("submit of {script} failed: {message}")]
    SubmitFailed { script: String, message: String },

    #[error("status query failed: {message}")]
    StatusQueryFailed { message: String },

    #[error("cancel of submit id '{submit_id}' failed: {message}")]
    CancelFailed { submit_id: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
