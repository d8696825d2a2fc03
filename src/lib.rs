// src/lib.rs

//! pysolver
//!
//! Resolves the dependency graph of Python packages by installing each
//! candidate release into a scratch interpreter environment and reading the
//! dependencies it declares.
//!
//! # Architecture
//!
//! - Indexes: release listings behind the [`ReleaseFetcher`] trait
//! - Requirements: PEP 508 parsing and marker evaluation
//! - Probing: RAII install/introspect/release through an [`Installer`]
//! - Traversal: iterative, one frontier and visited set per index
//! - Report: every per-package failure is data, only fatal errors abort

pub mod config;
pub mod environment;
mod error;
pub mod gate;
pub mod index;
pub mod installer;
pub mod output;
pub mod requirement;
pub mod resolver;
pub mod version;

pub use config::{GateConfig, GateWithoutTransitive, PythonMajor, SolverConfig, TraversalOrder};
pub use error::{CommandError, Error, ErrorKind, Result};
pub use gate::{HttpSubgraphGate, SubgraphGate};
pub use index::{IndexSolver, ReleaseFetcher, SimpleIndex, StaticIndex, VersionSelection};
pub use installer::{InstallGuard, Installer, PackageMetadata, PipInstaller};
pub use requirement::{MarkerEnvironment, PythonRequirementParser, Requirement, RequirementParser};
pub use resolver::{ResolutionEngine, ResolutionReport, resolve};
pub use version::{Specifier, compare_versions};
