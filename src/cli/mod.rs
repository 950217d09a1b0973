//! CLI module for stackpilot.
//!
//! This module provides the command-line interface for planning
//! deployments and following stack operations.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
