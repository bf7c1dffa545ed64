// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Spec file parsing, load-time validation, dependency acquisition, and the
//! custom parameter generator plugin boundary.

pub mod dependency;
pub mod generator;
pub mod load;
pub mod specfile;

pub use dependency::{Dependency, DependencyError};
pub use generator::{BuiltinRegistry, GeneratorError, ParameterGenerator, SubprocessGenerator};
pub use load::{load, LoadedSpec};
pub use specfile::{
    BatchBlock, DependencySpec, DescriptionBlock, EnvBlock, GlobalBlock, ParameterSpec, RunBlock,
    SpecError, SpecFile, StepSpec,
};
