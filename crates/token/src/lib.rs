// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! Token substitution engine: evaluation context plus a fixed-point
//! substitution pass over `$(NAME)`, `$(NAME.label)`, `$(STEP.workspace)`
//! and deferred `$(LAUNCHER)` tokens.

pub mod context;
pub mod substitute;

pub use context::EvalContext;
pub use substitute::{substitute, Substituted, TokenError, WorkspaceLookup, MAX_PASSES};
