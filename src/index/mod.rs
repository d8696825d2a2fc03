// src/index/mod.rs

//! Package indexes
//!
//! A [`ReleaseFetcher`] answers the only questions the resolver asks an
//! index: which versions of a package exist and which artifact hashes belong
//! to a release. [`SimpleIndex`] talks to a PEP 503/691 simple repository
//! over HTTP, [`StaticIndex`] serves a fixed in-memory catalogue.

mod memory;
mod simple;
pub mod solver;

pub use memory::StaticIndex;
pub use simple::SimpleIndex;
pub use solver::{IndexSolver, VersionSelection};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One published version of a package on an index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub index_url: String,
}

/// All releases of a package known to one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSet {
    /// Normalized package name
    pub package_name: String,
    pub releases: Vec<Release>,
}

/// Digest of a single release artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHash {
    /// Artifact file name
    pub name: String,
    pub sha256: String,
}

/// Source of release listings for one index
pub trait ReleaseFetcher {
    /// Base URL identifying the index
    fn index_url(&self) -> &str;

    /// List every release of `package_name`
    ///
    /// Returns [`Error::NotFoundError`] when the index does not know the
    /// package.
    fn fetch_releases(&self, package_name: &str) -> Result<ReleaseSet>;

    /// Artifact hashes of one release
    fn package_hashes(&self, package_name: &str, version: &str) -> Result<Vec<ArtifactHash>>;

    /// Whether the index lists the package at all
    fn provides_package(&self, package_name: &str) -> Result<bool> {
        match self.fetch_releases(package_name) {
            Ok(set) => Ok(!set.releases.is_empty()),
            Err(Error::NotFoundError(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether the index lists this exact release
    fn provides_package_version(&self, package_name: &str, version: &str) -> Result<bool> {
        match self.fetch_releases(package_name) {
            Ok(set) => Ok(set.releases.iter().any(|r| r.version == version)),
            Err(Error::NotFoundError(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<T: ReleaseFetcher + ?Sized> ReleaseFetcher for Box<T> {
    fn index_url(&self) -> &str {
        (**self).index_url()
    }

    fn fetch_releases(&self, package_name: &str) -> Result<ReleaseSet> {
        (**self).fetch_releases(package_name)
    }

    fn package_hashes(&self, package_name: &str, version: &str) -> Result<Vec<ArtifactHash>> {
        (**self).package_hashes(package_name, version)
    }

    fn provides_package(&self, package_name: &str) -> Result<bool> {
        (**self).provides_package(package_name)
    }

    fn provides_package_version(&self, package_name: &str, version: &str) -> Result<bool> {
        (**self).provides_package_version(package_name, version)
    }
}
