// src/cli.rs
//! CLI definitions for pysolver
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use pysolver::config::{GateWithoutTransitive, TraversalOrder};
use pysolver::index::VersionSelection;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pysolver")]
#[command(version)]
#[command(about = "Resolve Python package dependency graphs by installing and inspecting releases", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output destination: `-` for stdout, a file path, or an http(s) URL
    #[arg(short, long, global = true, default_value = "-")]
    pub output: String,

    /// Emit compact JSON instead of pretty printed
    #[arg(short = 'P', long, global = true)]
    pub no_pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve requirements into a dependency report
    Resolve(ResolveArgs),

    /// Parse requirements and print them without resolving
    Parse {
        /// Requirements, one per line
        #[arg(short, long, env = "PYSOLVER_PACKAGES")]
        requirements: Vec<String>,

        /// File with one requirement per line
        #[arg(long)]
        requirements_file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Serialize)]
pub struct ResolveArgs {
    /// Requirements, one per line
    #[arg(short, long, env = "PYSOLVER_PACKAGES")]
    pub requirements: Vec<String>,

    /// File with one requirement per line
    #[arg(long)]
    pub requirements_file: Option<PathBuf>,

    /// TOML configuration file, flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Index URLs to resolve against, in order
    #[arg(short, long, value_delimiter = ',')]
    pub index: Vec<String>,

    /// Major version of the target interpreter
    #[arg(short, long)]
    pub python_version: Option<u8>,

    /// Root packages to skip
    #[arg(short, long, value_delimiter = ',')]
    pub exclude_packages: Vec<String>,

    /// Resolve only the root requirements
    #[arg(short = 'T', long)]
    pub no_transitive: bool,

    /// Which matching versions of each requirement to probe
    #[arg(long, value_enum)]
    pub selection: Option<VersionSelection>,

    /// Order in which discovered releases are probed
    #[arg(long, value_enum)]
    pub traversal: Option<TraversalOrder>,

    /// Subgraph check endpoint consulted before queueing dependencies
    #[arg(long, env = "PYSOLVER_SUBGRAPH_CHECK_API")]
    pub subgraph_check_api: Option<String>,

    /// Solver identity sent to the subgraph check endpoint
    #[arg(long, env = "PYSOLVER_NAME")]
    pub solver_name: Option<String>,

    /// Attempts per subgraph check query
    #[arg(long)]
    pub gate_retries: Option<u32>,

    /// Delay between subgraph check attempts in milliseconds
    #[arg(long)]
    pub gate_retry_delay_ms: Option<u64>,

    /// Behaviour when a subgraph check is configured without transitive resolution
    #[arg(long, value_enum)]
    pub gate_without_transitive: Option<GateWithoutTransitive>,

    /// Deadline for each pip or interpreter command in seconds
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// Existing virtual environment to probe in
    #[arg(long)]
    pub virtualenv: Option<PathBuf>,
}
