// src/resolver/engine.rs

//! Dependency graph traversal
//!
//! For every configured index the engine seeds a fresh frontier with the
//! releases matching the root requirements, then probes releases one at a
//! time: install, introspect, release, resolve every declared dependency
//! against every index, and queue the releases not seen before.
//!
//! Per-release failures become report entries. Only errors for which
//! [`Error::is_fatal`] holds stop the run.

use super::frontier::{Frontier, PackageKey};
use super::report::{
    DeclaredDependency, ErrorDetails, IndexVersions, ResolutionError, ResolutionReport,
    ResolvedNode, UnparsedRequirement, UnresolvedRequirement,
};
use crate::config::SolverConfig;
use crate::error::{Error, Result};
use crate::gate::SubgraphGate;
use crate::index::{IndexSolver, ReleaseFetcher};
use crate::installer::{InstallGuard, Installer};
use crate::requirement::{MarkerEnvironment, Requirement, RequirementParser};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Resolves requirements into a dependency report
pub struct ResolutionEngine<'a, F, I: ?Sized> {
    config: &'a SolverConfig,
    solvers: &'a [IndexSolver<F>],
    installer: &'a I,
    environment: &'a MarkerEnvironment,
    gate: Option<&'a dyn SubgraphGate>,
}

impl<'a, F: ReleaseFetcher, I: Installer + ?Sized> ResolutionEngine<'a, F, I> {
    /// Create an engine over one solver per configured index
    pub fn new(
        config: &'a SolverConfig,
        solvers: &'a [IndexSolver<F>],
        installer: &'a I,
        environment: &'a MarkerEnvironment,
    ) -> Self {
        Self {
            config,
            solvers,
            installer,
            environment,
            gate: None,
        }
    }

    /// Consult `gate` before queueing transitive dependencies
    pub fn with_gate(mut self, gate: &'a dyn SubgraphGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Resolve `requirements` against every index in turn
    pub fn run(&self, requirements: &[String]) -> Result<ResolutionReport> {
        self.config.validate()?;

        let mut report = ResolutionReport {
            environment: Some(self.environment.clone()),
            ..Default::default()
        };
        for solver in self.solvers {
            let index_report = self.resolve_index(solver, requirements)?;
            report.absorb(index_report);
        }

        info!(
            "Resolution finished: {} resolved, {} errors, {} unparsed, {} unresolved",
            report.tree.len(),
            report.errors.len(),
            report.unparsed.len(),
            report.unresolved.len()
        );
        Ok(report)
    }

    fn resolve_index(
        &self,
        solver: &IndexSolver<F>,
        requirements: &[String],
    ) -> Result<ResolutionReport> {
        let index_url = solver.index_url();
        let mut report = ResolutionReport::default();
        let mut frontier = Frontier::new(self.config.traversal);
        let mut gated: HashSet<PackageKey> = HashSet::new();

        for text in requirements {
            debug!("Parsing requirement {:?}", text);
            let requirement = match solver.parser().parse(text) {
                Ok(requirement) => requirement,
                Err(e) => {
                    warn!("Failed to parse requirement {:?}: {}", text, e);
                    report.unparsed.push(UnparsedRequirement {
                        requirement: text.clone(),
                        details: e.to_string(),
                    });
                    continue;
                }
            };

            if self.config.is_excluded(&requirement.name) {
                debug!("Skipping excluded package {}", requirement.name);
                continue;
            }

            info!(
                "Resolving package {} with version specifier {:?} from {}",
                requirement.name,
                requirement.version_spec(),
                index_url
            );
            let versions = self.resolve_versions(solver, &requirement)?;
            if versions.is_empty() {
                warn!(
                    "No versions were resolved for {} {:?} on {}",
                    requirement.name,
                    requirement.version_spec(),
                    index_url
                );
                let is_provided = solver
                    .fetcher()
                    .provides_package(&requirement.name)
                    .unwrap_or_else(|e| {
                        warn!("Failed to check whether {} is provided: {}", requirement.name, e);
                        false
                    });
                report.unresolved.push(UnresolvedRequirement {
                    package_name: requirement.name.clone(),
                    version_spec: requirement.version_spec().to_string(),
                    index_url: index_url.to_string(),
                    is_provided,
                });
                continue;
            }

            for version in versions {
                info!("Adding {} {} for solving", requirement.name, version);
                frontier.push(PackageKey::new(&requirement.name, &version));
            }
        }

        while let Some(key) = frontier.pop() {
            info!("Using index {} to discover {} {}", index_url, key.name, key.version);

            let node = match self.probe(solver, &key) {
                Ok(node) => node,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("Probing {} on {} failed: {}", key, index_url, e);
                    let is_provided = solver
                        .fetcher()
                        .provides_package_version(&key.name, &key.version)
                        .unwrap_or_else(|err| {
                            warn!("Failed to check whether {} is provided: {}", key, err);
                            false
                        });
                    report.errors.push(ResolutionError {
                        package_name: key.name.clone(),
                        package_version: key.version.clone(),
                        index_url: index_url.to_string(),
                        kind: e.kind(),
                        details: ErrorDetails::from(&e),
                        is_provided,
                    });
                    continue;
                }
            };

            let node = self.resolve_dependencies(node, &mut frontier, &mut gated)?;
            report.tree.push(node);
        }

        Ok(report)
    }

    /// Install, introspect and release one release
    fn probe(&self, solver: &IndexSolver<F>, key: &PackageKey) -> Result<ResolvedNode> {
        let index_url = solver.index_url();
        let metadata = {
            let guard = InstallGuard::acquire(self.installer, &key.name, &key.version, index_url)?;
            guard.introspect()?
        };

        let package_name = metadata.name.clone().unwrap_or_else(|| key.name.clone());
        let package_version = metadata
            .version
            .clone()
            .unwrap_or_else(|| key.version.clone());
        if package_version != key.version {
            warn!(
                "Requested to install {} {} but installed version is {}",
                key.name, key.version, package_version
            );
        }

        let sha256 = self.package_hashes(solver, &key.name, &key.version, &package_version);

        let mut dependencies = Vec::new();
        for text in &metadata.requires {
            match solver.parser().parse(text) {
                Ok(requirement) => {
                    dependencies.push(DeclaredDependency::new(&requirement, self.environment))
                }
                Err(e) => warn!(
                    "Skipping unparseable dependency {:?} of {} {}: {}",
                    text, key.name, key.version, e
                ),
            }
        }

        Ok(ResolvedNode {
            package_name,
            package_version,
            package_version_requested: key.version.clone(),
            index_url: index_url.to_string(),
            dependencies,
            sha256,
            importlib_metadata: metadata,
        })
    }

    /// Artifact digests for the requested version, or the installed one
    fn package_hashes(
        &self,
        solver: &IndexSolver<F>,
        package_name: &str,
        requested: &str,
        installed: &str,
    ) -> Vec<String> {
        let fetcher = solver.fetcher();
        let hashes = match fetcher.package_hashes(package_name, requested) {
            Err(Error::NotFoundError(_)) if requested != installed => {
                fetcher.package_hashes(package_name, installed)
            }
            other => other,
        };

        match hashes {
            Ok(hashes) => hashes.into_iter().map(|h| h.sha256).collect(),
            Err(e) => {
                warn!(
                    "Failed to obtain hashes for {} {} from {}: {}",
                    package_name,
                    requested,
                    fetcher.index_url(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Match declared dependencies on every index and queue new releases
    fn resolve_dependencies(
        &self,
        mut node: ResolvedNode,
        frontier: &mut Frontier,
        gated: &mut HashSet<PackageKey>,
    ) -> Result<ResolvedNode> {
        for dependency in &mut node.dependencies {
            let requirement = dependency_requirement(dependency)?;

            for dep_solver in self.solvers {
                info!(
                    "Resolving dependency versions for {} with range {:?} from {}",
                    requirement.normalized_name,
                    requirement.version_spec(),
                    dep_solver.index_url()
                );
                let versions = self.resolve_versions(dep_solver, &requirement)?;
                debug!(
                    "Resolved versions for {} {:?}: {:?}",
                    requirement.normalized_name,
                    requirement.version_spec(),
                    versions
                );
                dependency.resolved_versions.push(IndexVersions {
                    versions: versions.clone(),
                    index: dep_solver.index_url().to_string(),
                });

                if !self.config.transitive {
                    continue;
                }

                for version in versions {
                    let key = PackageKey::new(&requirement.normalized_name, &version);
                    if frontier.is_visited(&key) || gated.contains(&key) {
                        continue;
                    }
                    if let Some(gate) = self.gate {
                        if !gate.should_resolve(&key.name, &key.version, &node.index_url)? {
                            debug!("Subgraph of {} is already resolved, not queueing", key);
                            gated.insert(key);
                            continue;
                        }
                    }
                    debug!("Adding {} for the next resolution round", key);
                    frontier.push(key);
                }
            }
        }

        Ok(node)
    }

    /// Versions of one requirement available on one index
    ///
    /// A missing package or a failing index yields no versions. A solve that
    /// answers for a different package name is an invariant violation.
    fn resolve_versions(
        &self,
        solver: &IndexSolver<F>,
        requirement: &Requirement,
    ) -> Result<Vec<String>> {
        let solved = match solver.solve(std::slice::from_ref(requirement)) {
            Ok(solved) => solved,
            Err(Error::NotFoundError(_)) => {
                info!(
                    "No versions were resolved for {} {:?} on {}",
                    requirement.name,
                    requirement.version_spec(),
                    solver.index_url()
                );
                return Ok(Vec::new());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    "Failed to resolve versions for {} {:?} on {}: {}",
                    requirement.name,
                    requirement.version_spec(),
                    solver.index_url(),
                    e
                );
                return Ok(Vec::new());
            }
        };

        if solved.len() > 1
            || solved
                .keys()
                .any(|name| *name != requirement.normalized_name)
        {
            return Err(Error::AmbiguousResolution {
                requested: requirement.name.clone(),
                names: solved.keys().cloned().collect(),
            });
        }

        Ok(solved
            .into_values()
            .flatten()
            .map(|release| release.version)
            .collect())
    }
}

/// Name and specifier of a declared dependency as a requirement
fn dependency_requirement(dependency: &DeclaredDependency) -> Result<Requirement> {
    let mut requirement = Requirement::named(&dependency.normalized_package_name);
    if let Some(ref spec) = dependency.specifier {
        requirement.specifier = crate::version::Specifier::parse(spec)?;
        requirement.specifier_text = Some(spec.clone());
    }
    Ok(requirement)
}
