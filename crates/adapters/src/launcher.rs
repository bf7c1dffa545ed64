// SPDX-License-Identifier: MIT

//! `$(LAUNCHER)` / `$(LAUNCHER)[<n>n,<p>p]` resolution: the final
//! deferred-token pass performed once a scheduler adapter is chosen.

use crate::AdapterError;
use cond_core::ResourceRequest;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static LAUNCHER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(LAUNCHER\)(\[([^\]]*)\])?").expect("valid regex"));

#[allow(clippy::expect_used)]
static BRACKET_N_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)n").expect("valid regex"));
#[allow(clippy::expect_used)]
static BRACKET_P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)p").expect("valid regex"));

/// The effective `(nodes, procs)` pair for one `$(LAUNCHER)...` occurrence,
/// after applying any bracketed override and validating it against the
/// step's resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LauncherRequest {
    pub nodes: Option<u32>,
    pub procs: Option<u32>,
}

fn parse_bracket(bracket: &str, resources: &ResourceRequest) -> Result<LauncherRequest, AdapterError> {
    let override_n = BRACKET_N_RE
        .captures(bracket)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());
    let override_p = BRACKET_P_RE
        .captures(bracket)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());

    let nodes = match override_n {
        Some(n) => {
            if let Some(step_nodes) = resources.nodes {
                if n > step_nodes {
                    return Err(AdapterError::LauncherOverrideExceedsResources {
                        requested: n,
                        available: step_nodes,
                        dimension: "nodes".to_string(),
                    });
                }
            }
            Some(n)
        }
        None => resources.nodes,
    };
    let procs = match override_p {
        Some(p) => {
            if let Some(step_procs) = resources.procs {
                if p > step_procs {
                    return Err(AdapterError::LauncherOverrideExceedsResources {
                        requested: p,
                        available: step_procs,
                        dimension: "procs".to_string(),
                    });
                }
            }
            Some(p)
        }
        None => resources.procs,
    };

    Ok(LauncherRequest { nodes, procs })
}

/// Replace every `$(LAUNCHER)`/`$(LAUNCHER)[...]` occurrence in `cmd` using
/// `make_wrapper` to render the native parallel-run wrapper text for the
/// resolved `(nodes, procs)` pair.
pub fn expand_launcher_tokens(
    cmd: &str,
    resources: &ResourceRequest,
    make_wrapper: impl Fn(LauncherRequest) -> String,
) -> Result<String, AdapterError> {
    let mut err = None;
    let out = LAUNCHER_RE.replace_all(cmd, |caps: &regex::Captures| {
        if err.is_some() {
            return String::new();
        }
        let bracket = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        match parse_bracket(bracket, resources) {
            Ok(req) => make_wrapper(req),
            Err(e) => {
                err = Some(e);
                String::new()
            }
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(out.into_owned()),
    }
}
