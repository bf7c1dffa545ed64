// SPDX-License-Identifier: MIT

//! Parameter model: an ordered set of named parameters with equal-length
//! value vectors, yielding combinations and per-combination label strings.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::expect_used)]
static PARAM_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_-]*)(\.label)?\)").expect("valid regex"));

/// Scan `texts` for `$(NAME)`/`$(NAME.label)` references, returning the set
/// of referenced parameter names. A reference to a *label* is followed
/// transitively (labels legally reference parameters), but a reference to a
/// plain variable is not.
pub fn used_parameters(
    texts: &[&str],
    labels: &HashMap<String, String>,
    parameter_names: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    let mut visited_labels: HashSet<String> = HashSet::new();
    let mut queue: Vec<String> = texts.iter().map(|s| s.to_string()).collect();

    while let Some(text) = queue.pop() {
        for cap in PARAM_REF_RE.captures_iter(&text) {
            let name = &cap[1];
            if parameter_names.contains(name) {
                used.insert(name.to_string());
            } else if let Some(template) = labels.get(name) {
                if visited_labels.insert(name.to_string()) {
                    queue.push(template.clone());
                }
            }
        }
    }
    used
}

/// Errors raised while building or using a [`ParameterModel`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("parameter '{0}' has no values")]
    EmptyValues(String),
    #[error("parameter '{0}' label template is missing the '%%' placeholder")]
    MissingPlaceholder(String),
    #[error(
        "parameter '{name}' has {got} values, expected {expected} (all parameters in a study must have the same number of values)"
    )]
    UnequalLength {
        name: String,
        got: usize,
        expected: usize,
    },
    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),
}

/// A single named parameter: a value vector plus a label template
/// (containing a `%%` placeholder substituted by the value's string form).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<String>,
    pub label_template: String,
}

impl Parameter {
    /// Render this parameter's label for the value at combination index `i`.
    pub fn label_at(&self, i: usize) -> String {
        self.label_template.replace("%%", &self.values[i])
    }
}

/// A mapping from parameter name to one value, drawn at a common index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterCombination {
    pub index: usize,
    pub values: IndexMap<String, String>,
    pub labels: IndexMap<String, String>,
}

impl ParameterCombination {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// The stable `combo_key` for a subset of parameters, in declared order:
    /// `"·".join(label_i for each parameter used by a step, in declared order)`.
    pub fn combo_key(&self, used_in_order: &[String]) -> String {
        used_in_order
            .iter()
            .filter_map(|name| self.labels.get(name))
            .cloned()
            .collect::<Vec<_>>()
            .join("\u{00B7}")
    }
}

/// An ordered set of named parameters with equal-length value vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterModel {
    parameters: Vec<Parameter>,
}

impl ParameterModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter. Validates `%%` in the label template and that the
    /// value-list length matches every previously added parameter.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        values: Vec<String>,
        label_template: impl Into<String>,
    ) -> Result<(), ParameterError> {
        let name = name.into();
        let label_template = label_template.into();

        if self.parameters.iter().any(|p| p.name == name) {
            return Err(ParameterError::DuplicateName(name));
        }
        if values.is_empty() {
            return Err(ParameterError::EmptyValues(name));
        }
        if !label_template.contains("%%") {
            return Err(ParameterError::MissingPlaceholder(name));
        }
        if let Some(first) = self.parameters.first() {
            if first.values.len() != values.len() {
                return Err(ParameterError::UnequalLength {
                    name,
                    got: values.len(),
                    expected: first.values.len(),
                });
            }
        }

        self.parameters.push(Parameter {
            name,
            values,
            label_template,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Number of combinations (length of each parameter's value vector, or 0
    /// if there are no parameters).
    pub fn len(&self) -> usize {
        self.parameters.first().map(|p| p.values.len()).unwrap_or(0)
    }

    /// Yield all `N` combinations in insertion order by index.
    pub fn combinations(&self) -> Vec<ParameterCombination> {
        (0..self.len())
            .map(|i| {
                let mut values = IndexMap::new();
                let mut labels = IndexMap::new();
                for p in &self.parameters {
                    values.insert(p.name.clone(), p.values[i].clone());
                    labels.insert(p.name.clone(), p.label_at(i));
                }
                ParameterCombination {
                    index: i,
                    values,
                    labels,
                }
            })
            .collect()
    }

    /// Distinct projections of the combinations onto `used`, preserving
    /// first-seen (declaration) order. `used` need not be in declared order;
    /// the resulting combo's `values`/`labels` maps follow this model's
    /// declared parameter order regardless.
    pub fn project(&self, used: &BTreeSet<String>) -> Vec<ParameterCombination> {
        let mut seen: IndexMap<Vec<(String, String)>, ParameterCombination> = IndexMap::new();
        for combo in self.combinations() {
            let key: Vec<(String, String)> = self
                .parameters
                .iter()
                .filter(|p| used.contains(&p.name))
                .map(|p| (p.name.clone(), combo.values[&p.name].clone()))
                .collect();
            seen.entry(key).or_insert(combo);
        }
        seen.into_values().collect()
    }
}
