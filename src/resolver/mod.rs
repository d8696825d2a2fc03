// src/resolver/mod.rs

//! Dependency resolution
//!
//! [`resolve`] is the entry point used by the command line: it prepares an
//! interpreter environment, builds one solver per configured index and runs
//! a [`ResolutionEngine`] over the requirements. The engine itself is
//! generic over its index and installer so it can be driven by in-memory
//! fixtures.

mod engine;
mod frontier;
mod report;

pub use engine::ResolutionEngine;
pub use frontier::{Frontier, PackageKey};
pub use report::{
    DeclaredDependency, ErrorDetails, IndexVersions, ResolutionError, ResolutionReport,
    ResolvedNode, UnparsedRequirement, UnresolvedRequirement,
};

use crate::config::SolverConfig;
use crate::environment::VirtualEnv;
use crate::error::Result;
use crate::gate::{HttpSubgraphGate, SubgraphGate};
use crate::index::{IndexSolver, SimpleIndex};
use crate::installer::PipInstaller;
use tracing::info;

/// Resolve `requirements` with the real indexes and a real environment
pub fn resolve(config: &SolverConfig, requirements: &[String]) -> Result<ResolutionReport> {
    config.validate()?;

    let venv = match config.virtualenv {
        Some(ref root) => VirtualEnv::existing(root, config.command_timeout())?,
        None => VirtualEnv::create(config.python_version, config.command_timeout())?,
    };
    info!("Using interpreter environment at {}", venv.root().display());

    let environment_packages = venv.installed_packages()?;
    let environment = venv.marker_environment()?;

    let solvers = config
        .index_urls
        .iter()
        .map(|url| SimpleIndex::new(url).map(|index| IndexSolver::new(index, config.selection)))
        .collect::<Result<Vec<_>>>()?;

    let installer = PipInstaller::for_env(&venv);
    let gate = config
        .effective_gate()
        .map(HttpSubgraphGate::new)
        .transpose()?;

    let mut engine = ResolutionEngine::new(config, &solvers, &installer, &environment);
    if let Some(ref gate) = gate {
        engine = engine.with_gate(gate as &dyn SubgraphGate);
    }

    let mut report = engine.run(requirements)?;
    report.environment_packages = environment_packages;
    Ok(report)
}
