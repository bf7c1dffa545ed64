// SPDX-License-Identifier: MIT

//! Evaluation context for token substitution.

use std::collections::HashMap;

/// All the maps a substitution pass may draw from. Lookup precedence for a
/// bare `$(NAME)` reference is, in order: variables, labels, parameter
/// values, reserved tokens, dependencies — first match wins.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub variables: HashMap<String, String>,
    /// Label templates (unresolved text, e.g. `"$(SIZE.label).log"`), resolved
    /// during the "labels" pass.
    pub labels: HashMap<String, String>,
    /// The current combination's parameter values.
    pub parameter_values: HashMap<String, String>,
    /// The current combination's per-parameter label strings (already
    /// rendered, e.g. `"PLANET.Earth"`).
    pub parameter_labels: HashMap<String, String>,
    pub reserved: HashMap<String, String>,
    pub dependencies: HashMap<String, String>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.labels.insert(key.into(), template.into());
        self
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.parameter_values.insert(name.clone(), value.into());
        self.parameter_labels.insert(name, label.into());
        self
    }

    pub fn with_reserved(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.reserved.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dependencies.insert(key.into(), value.into());
        self
    }

    /// First-match-wins lookup for a bare `$(NAME)` reference, following the
    /// fixed precedence: variables -> labels -> parameter values -> reserved
    /// -> dependencies. Labels are returned as their *unresolved* template
    /// text here; a later pass resolves any tokens inside them.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.variables
            .get(name)
            .or_else(|| self.labels.get(name))
            .or_else(|| self.parameter_values.get(name))
            .or_else(|| self.reserved.get(name))
            .or_else(|| self.dependencies.get(name))
            .map(String::as_str)
    }

    pub fn lookup_label(&self, name: &str) -> Option<&str> {
        self.parameter_labels.get(name).map(String::as_str)
    }
}
