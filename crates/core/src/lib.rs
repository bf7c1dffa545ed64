// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Core data model for the study conductor: parameters, step templates,
//! job instances, the execution graph, and the study aggregate.

pub mod clock;
pub mod graph;
pub mod id;
pub mod job;
pub mod parameter;
pub mod step;
pub mod study;
pub mod workspace;

pub use clock::{Clock, FakeClock, SystemClock};
pub use graph::{Edge, ExecutionGraph};
pub use id::{JobInstanceId, ShortId, StudyId, SubmitId};
pub use job::{JobInstance, JobState};
pub use parameter::{used_parameters, Parameter, ParameterCombination, ParameterError, ParameterModel};
pub use step::{DependsOn, ResourceRequest, StepTemplate};
pub use study::{BatchDefaults, ResolvedEnv, RuntimeConfig, SchedulerKind, Study};
