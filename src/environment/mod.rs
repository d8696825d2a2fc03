// src/environment/mod.rs

//! Subprocess plumbing and Python virtual environments

mod command;
mod venv;

pub use command::{CommandOutput, DEFAULT_COMMAND_TIMEOUT, run_command};
pub use venv::{EnvironmentPackage, VirtualEnv};
