// SPDX-License-Identifier: MIT

//! Fixed-point token substitution.
//!
//! Token forms: `$(NAME)` (value lookup, first-match-wins over variables,
//! labels, parameter values, reserved tokens, then dependencies),
//! `$(PARAM.label)` (the current combination's label for that parameter),
//! `$(STEPNAME.workspace)` (a previously expanded step instance's
//! workspace), and `$(LAUNCHER)` / `$(LAUNCHER)[<n>n,<p>p]` (deferred until
//! a scheduler adapter resolves it).
//!
//! The layered precedence described in the token substitution contract
//! (variables -> labels -> parameter values -> parameter labels -> reserved
//! -> dependencies, applied as successive whole-text sub-passes within one
//! iteration) is implemented here as an equivalent per-token first-match
//! lookup: once a token is substituted by an earlier-precedence source it is
//! gone from the text, so a later source never gets a chance to compete for
//! the same occurrence. The externally observable result — first-match-wins,
//! fixed order — is identical.

use crate::context::EvalContext;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum fixed-point iterations before a remaining unresolved (non-LAUNCHER)
/// token is treated as a cycle.
pub const MAX_PASSES: usize = 16;

#[allow(clippy::expect_used)]
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_-]*)(\.(label|workspace))?\)(\[[^\]]*\])?")
        .expect("constant regex pattern is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unresolved token(s) after {passes} passes: {tokens:?} (possible substitution cycle)")]
    UnresolvedCycle { passes: usize, tokens: Vec<String> },
}

/// Result of a substitution pass: the text with every resolvable token
/// replaced, plus the raw (untouched) `$(LAUNCHER)...` occurrences left for
/// the caller (a scheduler adapter) to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    pub launcher_occurrences: Vec<String>,
}

/// Step-workspace lookup: resolves `$(STEPNAME.workspace)` references.
pub trait WorkspaceLookup {
    fn workspace_of(&self, step_name: &str) -> Option<&str>;
}

impl WorkspaceLookup for std::collections::HashMap<String, String> {
    fn workspace_of(&self, step_name: &str) -> Option<&str> {
        self.get(step_name).map(String::as_str)
    }
}

/// Substitute all tokens in `text` against `ctx`, resolving `$(STEP.workspace)`
/// via `workspaces`. Runs to a fixed point (or [`MAX_PASSES`]), leaving
/// `$(LAUNCHER)...` occurrences untouched.
pub fn substitute(
    text: &str,
    ctx: &EvalContext,
    workspaces: &impl WorkspaceLookup,
) -> Result<Substituted, TokenError> {
    let mut current = text.to_string();

    for pass in 0..MAX_PASSES {
        let (next, changed) = one_pass(&current, ctx, workspaces);
        current = next;
        if !changed {
            let remaining = unresolved_non_launcher(&current);
            if remaining.is_empty() {
                let launchers = launcher_occurrences(&current);
                return Ok(Substituted {
                    text: current,
                    launcher_occurrences: launchers,
                });
            }
            return Err(TokenError::UnresolvedCycle {
                passes: pass + 1,
                tokens: remaining,
            });
        }
    }

    let remaining = unresolved_non_launcher(&current);
    if remaining.is_empty() {
        let launchers = launcher_occurrences(&current);
        Ok(Substituted {
            text: current,
            launcher_occurrences: launchers,
        })
    } else {
        Err(TokenError::UnresolvedCycle {
            passes: MAX_PASSES,
            tokens: remaining,
        })
    }
}

/// One left-to-right pass: replace every resolvable occurrence, leave
/// `LAUNCHER` and genuinely-unresolvable tokens untouched. Returns the new
/// text and whether anything changed.
#[allow(clippy::unwrap_used)] // group 0 is the whole match, always present on a `Captures`
fn one_pass(text: &str, ctx: &EvalContext, workspaces: &impl WorkspaceLookup) -> (String, bool) {
    let mut changed = false;
    let out = TOKEN_RE.replace_all(text, |caps: &regex::Captures| {
        let name = &caps[1];
        let suffix = caps.get(3).map(|m| m.as_str());
        let whole = caps.get(0).unwrap().as_str();

        if name == "LAUNCHER" {
            return whole.to_string();
        }

        let resolved = match suffix {
            Some("label") => ctx.lookup_label(name).map(|s| s.to_string()),
            Some("workspace") => workspaces.workspace_of(name).map(|s| s.to_string()),
            _ => ctx.lookup(name).map(|s| s.to_string()),
        };

        match resolved {
            Some(value) => {
                changed = true;
                value
            }
            None => whole.to_string(),
        }
    });
    (out.into_owned(), changed)
}

#[allow(clippy::unwrap_used)] // group 0 is the whole match, always present on a `Captures`
fn unresolved_non_launcher(text: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(text)
        .filter(|c| &c[1] != "LAUNCHER")
        .map(|c| c.get(0).unwrap().as_str().to_string())
        .collect()
}

#[allow(clippy::unwrap_used)] // group 0 is the whole match, always present on a `Captures`
fn launcher_occurrences(text: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(text)
        .filter(|c| &c[1] == "LAUNCHER")
        .map(|c| c.get(0).unwrap().as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn resolves_simple_variable() {
        let ctx = EvalContext::new().with_variable("NAME", "World");
        let ws: HashMap<String, String> = HashMap::new();
        let result = substitute("Hello, $(NAME)!", &ctx, &ws).unwrap();
        assert_eq!(result.text, "Hello, World!");
    }

    #[test]
    fn resolves_parameter_label() {
        let ctx = EvalContext::new().with_parameter("SIZE", "10", "SIZE.10");
        let ws: HashMap<String, String> = HashMap::new();
        let result = substitute("out_$(SIZE.label).log", &ctx, &ws).unwrap();
        assert_eq!(result.text, "out_SIZE.10.log");
    }

    #[test]
    fn labels_may_reference_parameters_via_fixed_point() {
        // OUTFILE label references $(SIZE.label); resolving OUTFILE requires
        // two passes: first SIZE.label resolves, then OUTFILE resolves using
        // the label's now-substituted text looked up as a variable... here we
        // model OUTFILE as a *label* (variables-of-variables).
        let ctx = EvalContext::new()
            .with_label("OUTFILE", "$(SIZE.label).log")
            .with_parameter("SIZE", "10", "SIZE.10");
        let ws: HashMap<String, String> = HashMap::new();
        let result = substitute("$(OUTFILE)", &ctx, &ws).unwrap();
        assert_eq!(result.text, "SIZE.10.log");
    }

    #[test]
    fn step_workspace_reference_resolves_from_workspace_table() {
        let ctx = EvalContext::new();
        let mut ws: HashMap<String, String> = HashMap::new();
        ws.insert("build".to_string(), "/study/build".to_string());
        let result = substitute("cd $(build.workspace)", &ctx, &ws).unwrap();
        assert_eq!(result.text, "cd /study/build");
    }

    #[test]
    fn launcher_is_left_untouched_for_later_resolution() {
        let ctx = EvalContext::new();
        let ws: HashMap<String, String> = HashMap::new();
        let result = substitute("$(LAUNCHER) ./run.sh", &ctx, &ws).unwrap();
        assert_eq!(result.text, "$(LAUNCHER) ./run.sh");
        assert_eq!(result.launcher_occurrences, vec!["$(LAUNCHER)".to_string()]);
    }

    #[test]
    fn launcher_bracket_form_is_left_untouched() {
        let ctx = EvalContext::new();
        let ws: HashMap<String, String> = HashMap::new();
        let result = substitute("$(LAUNCHER)[2n,4p] ./run.sh", &ctx, &ws).unwrap();
        assert_eq!(result.launcher_occurrences, vec!["$(LAUNCHER)[2n,4p]".to_string()]);
    }

    #[test]
    fn unresolvable_non_launcher_token_is_fatal() {
        let ctx = EvalContext::new();
        let ws: HashMap<String, String> = HashMap::new();
        let err = substitute("$(MISSING)", &ctx, &ws).unwrap_err();
        assert_eq!(
            err,
            TokenError::UnresolvedCycle {
                passes: 1,
                tokens: vec!["$(MISSING)".to_string()],
            }
        );
    }

    #[test]
    fn first_match_wins_variables_over_reserved() {
        let ctx = EvalContext::new()
            .with_variable("WORKSPACE", "from-var")
            .with_reserved("WORKSPACE", "from-reserved");
        let ws: HashMap<String, String> = HashMap::new();
        let result = substitute("$(WORKSPACE)", &ctx, &ws).unwrap();
        assert_eq!(result.text, "from-var");
    }
}
