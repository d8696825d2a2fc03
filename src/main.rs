// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let pretty = !cli.no_pretty;
    match cli.command {
        Commands::Resolve(ref args) => commands::cmd_resolve(args, &cli.output, pretty),
        Commands::Parse {
            ref requirements,
            ref requirements_file,
        } => commands::cmd_parse(requirements, requirements_file.as_deref(), &cli.output, pretty),
    }
}
