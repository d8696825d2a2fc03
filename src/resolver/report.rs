// src/resolver/report.rs

//! Resolution report
//!
//! The report is the complete, serializable outcome of a run. Field names
//! are part of the output format consumed downstream.

use crate::environment::EnvironmentPackage;
use crate::error::{CommandError, Error, ErrorKind};
use crate::installer::PackageMetadata;
use crate::requirement::{MarkerEnvironment, Requirement};
use serde::Serialize;

/// Versions of a dependency matched on one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexVersions {
    pub versions: Vec<String>,
    pub index: String,
}

/// A dependency declared by a resolved package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredDependency {
    pub package_name: String,
    pub normalized_package_name: String,
    pub specifier: Option<String>,
    pub resolved_versions: Vec<IndexVersions>,
    /// Extras requested on the dependency itself
    pub extras: Vec<String>,
    /// Extras the marker is conditional on
    pub extra: Vec<String>,
    pub marker: Option<String>,
    pub marker_evaluated: Option<String>,
    pub marker_evaluation_result: Option<bool>,
    pub marker_evaluation_error: Option<String>,
}

impl DeclaredDependency {
    /// Record a parsed requirement together with its marker evaluation
    pub fn new(requirement: &Requirement, environment: &MarkerEnvironment) -> Self {
        let evaluation = requirement.evaluate_marker(environment);
        Self {
            package_name: requirement.name.clone(),
            normalized_package_name: requirement.normalized_name.clone(),
            specifier: requirement.specifier_text.clone(),
            resolved_versions: Vec::new(),
            extras: requirement.extras.iter().cloned().collect(),
            extra: evaluation.extras.into_iter().collect(),
            marker: requirement.marker.as_ref().map(ToString::to_string),
            marker_evaluated: evaluation.evaluated,
            marker_evaluation_result: evaluation.result,
            marker_evaluation_error: evaluation.error,
        }
    }
}

/// A release that was installed and inspected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    pub package_name: String,
    /// Version reported by the installed distribution
    pub package_version: String,
    pub package_version_requested: String,
    pub index_url: String,
    pub dependencies: Vec<DeclaredDependency>,
    pub sha256: Vec<String>,
    pub importlib_metadata: PackageMetadata,
}

/// Failure details attached to an error entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    Command(CommandError),
    Message { message: String },
}

impl From<&Error> for ErrorDetails {
    fn from(error: &Error) -> Self {
        match error {
            Error::CommandFailed(e) => Self::Command(e.clone()),
            other => Self::Message {
                message: other.to_string(),
            },
        }
    }
}

/// A release that could not be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionError {
    pub package_name: String,
    pub package_version: String,
    pub index_url: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub details: ErrorDetails,
    /// Whether the index lists this release
    pub is_provided: bool,
}

/// Requirement text that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnparsedRequirement {
    pub requirement: String,
    pub details: String,
}

/// Root requirement with no matching release on an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRequirement {
    pub package_name: String,
    pub version_spec: String,
    pub index_url: String,
    /// Whether the index knows the package at all
    pub is_provided: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub tree: Vec<ResolvedNode>,
    pub errors: Vec<ResolutionError>,
    pub unparsed: Vec<UnparsedRequirement>,
    pub unresolved: Vec<UnresolvedRequirement>,
    pub environment: Option<MarkerEnvironment>,
    pub environment_packages: Vec<EnvironmentPackage>,
}

impl ResolutionReport {
    /// Append the per-index results of `other`
    pub fn absorb(&mut self, other: ResolutionReport) {
        self.tree.extend(other.tree);
        self.errors.extend(other.errors);
        self.unparsed.extend(other.unparsed);
        self.unresolved.extend(other.unresolved);
    }

    /// Find a resolved node by normalized name and requested version
    pub fn node(&self, package_name: &str, version: &str) -> Option<&ResolvedNode> {
        let name = crate::requirement::normalize_name(package_name);
        self.tree.iter().find(|n| {
            crate::requirement::normalize_name(&n.package_name) == name
                && n.package_version_requested == version
        })
    }
}
