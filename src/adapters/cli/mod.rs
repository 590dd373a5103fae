//! CLI Adapter
//!
//! Command-line interface for the ethid binary.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CheckConfigCmd, CliApp, Command, ReplayCmd, RunArgs, SimulateCmd};
