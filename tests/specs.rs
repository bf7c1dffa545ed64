//! Behavioral specifications for the `cond` CLI, run against real study
//! directories and a real (local-adapter) conductor.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/hello_world.rs"]
mod hello_world;
#[path = "specs/fan_out.rs"]
mod fan_out;
#[path = "specs/dependencies.rs"]
mod dependencies;
#[path = "specs/fan_in.rs"]
mod fan_in;
#[path = "specs/parameter_propagation.rs"]
mod parameter_propagation;
#[path = "specs/cancel_and_update.rs"]
mod cancel_and_update;
#[path = "specs/cli_help.rs"]
mod cli_help;
