//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::monitor::OperationKind;

/// Stackpilot - CloudFormation change-set planner and stack monitor.
#[derive(Parser, Debug)]
#[command(name = "stackpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "STACKPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration.
    Validate,

    /// Preview a deployment through a temporary change set.
    Plan {
        /// Plan even if the template did not change.
        #[arg(short, long)]
        force: bool,
    },

    /// Follow an in-flight stack operation until it settles.
    Monitor {
        /// Operation to follow.
        #[arg(long, value_enum)]
        operation: OperationKind,

        /// Stack id (ARN); defaults to the configured stack name.
        #[arg(long)]
        stack_id: Option<String>,

        /// The stack was deployed with rollback disabled.
        #[arg(long)]
        disable_rollback: bool,

        /// Give up after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Delete the stack and wait for the deletion to finish.
    Remove {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}
