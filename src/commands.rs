// src/commands.rs
//! Command handlers for the pysolver CLI

use crate::cli::ResolveArgs;
use anyhow::{Context, Result};
use pysolver::config::{GateConfig, PythonMajor, SolverConfig};
use pysolver::output::{Envelope, write_envelope};
use pysolver::requirement::{PythonRequirementParser, RequirementParser};
use serde_json::{Value, json};
use std::path::Path;
use tracing::info;

/// Split requirement text into entries, skipping blanks and comments
///
/// Accepts real newlines as well as literal `\n` sequences, which is how
/// multi-line values usually arrive through environment variables.
pub fn split_requirements(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .lines()
        .map(|line| line.split(" #").next().unwrap_or(line).trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Gather requirements from flags and an optional file
pub fn collect_requirements(inline: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut requirements: Vec<String> = inline.iter().flat_map(|r| split_requirements(r)).collect();
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read requirements from {}", path.display()))?;
        requirements.extend(split_requirements(&text));
    }
    if requirements.is_empty() {
        anyhow::bail!("No requirements given, use --requirements or --requirements-file");
    }
    Ok(requirements)
}

/// Configuration file values overridden by flags
pub fn build_config(args: &ResolveArgs) -> Result<SolverConfig> {
    let mut config = match args.config {
        Some(ref path) => SolverConfig::load(path)?,
        None => SolverConfig::default(),
    };

    if !args.index.is_empty() {
        config.index_urls = args.index.clone();
    }
    if let Some(version) = args.python_version {
        config.python_version = PythonMajor::try_from(version)?;
    }
    config
        .exclude_packages
        .extend(args.exclude_packages.iter().cloned());
    if args.no_transitive {
        config.transitive = false;
    }
    if let Some(selection) = args.selection {
        config.selection = selection;
    }
    if let Some(traversal) = args.traversal {
        config.traversal = traversal;
    }
    if let Some(policy) = args.gate_without_transitive {
        config.gate_without_transitive = policy;
    }
    if let Some(timeout) = args.command_timeout {
        config.command_timeout_secs = timeout;
    }
    if let Some(ref venv) = args.virtualenv {
        config.virtualenv = Some(venv.clone());
    }

    if let Some(ref url) = args.subgraph_check_api {
        let solver_name = args
            .solver_name
            .clone()
            .or_else(|| config.subgraph_check.as_ref().and_then(|g| g.solver_name.clone()));
        let mut gate = GateConfig::new(url.clone(), String::new());
        gate.solver_name = solver_name;
        config.subgraph_check = Some(gate);
    }
    if let Some(ref mut gate) = config.subgraph_check {
        if let Some(ref name) = args.solver_name {
            gate.solver_name = Some(name.clone());
        }
        if let Some(retries) = args.gate_retries {
            gate.max_attempts = retries;
        }
        if let Some(delay) = args.gate_retry_delay_ms {
            gate.retry_delay_ms = delay;
        }
    }

    config.validate()?;
    Ok(config)
}

pub fn cmd_resolve(args: &ResolveArgs, output: &str, pretty: bool) -> Result<()> {
    let requirements = collect_requirements(&args.requirements, args.requirements_file.as_deref())?;
    let config = build_config(args)?;
    info!(
        "Resolving {} requirements against {}",
        requirements.len(),
        config.index_urls.join(", ")
    );

    let report = pysolver::resolve(&config, &requirements)?;

    let arguments = json!({
        "requirements": requirements,
        "config": config,
        "flags": args,
    });
    write_envelope(&Envelope::new(report, arguments), output, pretty)?;
    Ok(())
}

pub fn cmd_parse(
    requirements: &[String],
    requirements_file: Option<&Path>,
    output: &str,
    pretty: bool,
) -> Result<()> {
    let requirements = collect_requirements(requirements, requirements_file)?;
    let parser = PythonRequirementParser;

    let parsed: Vec<Value> = requirements
        .iter()
        .map(|text| match parser.parse(text) {
            Ok(req) => json!({
                "requirement": text,
                "package_name": req.name,
                "normalized_package_name": req.normalized_name,
                "specifier": req.specifier_text,
                "extras": req.extras,
                "marker": req.marker.as_ref().map(ToString::to_string),
                "url": req.url,
            }),
            Err(e) => json!({
                "requirement": text,
                "error": e.to_string(),
            }),
        })
        .collect();

    let arguments = json!({ "requirements": requirements });
    write_envelope(&Envelope::new(parsed, arguments), output, pretty)?;
    Ok(())
}
