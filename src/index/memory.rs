// src/index/memory.rs

//! In-memory index
//!
//! Serves a fixed catalogue of releases. Used for offline runs against a
//! pre-computed listing and throughout the test suite.

use super::{ArtifactHash, Release, ReleaseFetcher, ReleaseSet};
use crate::error::{Error, Result};
use crate::requirement::normalize_name;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct StaticRelease {
    version: String,
    hashes: Vec<ArtifactHash>,
}

/// Release catalogue keyed by normalized package name
#[derive(Debug, Clone)]
pub struct StaticIndex {
    url: String,
    packages: HashMap<String, Vec<StaticRelease>>,
}

impl StaticIndex {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            packages: HashMap::new(),
        }
    }

    /// Add releases of a package, in listing order
    pub fn with_releases(mut self, package_name: &str, versions: &[&str]) -> Self {
        let entry = self.packages.entry(normalize_name(package_name)).or_default();
        entry.extend(versions.iter().map(|v| StaticRelease {
            version: v.to_string(),
            hashes: Vec::new(),
        }));
        self
    }

    /// Attach an artifact hash to an already listed release
    pub fn with_hash(mut self, package_name: &str, version: &str, file: &str, sha256: &str) -> Self {
        let entry = self.packages.entry(normalize_name(package_name)).or_default();
        let position = match entry.iter().position(|r| r.version == version) {
            Some(position) => position,
            None => {
                entry.push(StaticRelease {
                    version: version.to_string(),
                    hashes: Vec::new(),
                });
                entry.len() - 1
            }
        };
        entry[position].hashes.push(ArtifactHash {
            name: file.to_string(),
            sha256: sha256.to_string(),
        });
        self
    }
}

impl ReleaseFetcher for StaticIndex {
    fn index_url(&self) -> &str {
        &self.url
    }

    fn fetch_releases(&self, package_name: &str) -> Result<ReleaseSet> {
        let name = normalize_name(package_name);
        let releases = self.packages.get(&name).ok_or_else(|| {
            Error::NotFoundError(format!("{} is not provided by {}", package_name, self.url))
        })?;

        Ok(ReleaseSet {
            package_name: name,
            releases: releases
                .iter()
                .map(|r| Release {
                    version: r.version.clone(),
                    index_url: self.url.clone(),
                })
                .collect(),
        })
    }

    fn package_hashes(&self, package_name: &str, version: &str) -> Result<Vec<ArtifactHash>> {
        let name = normalize_name(package_name);
        self.packages
            .get(&name)
            .and_then(|releases| releases.iter().find(|r| r.version == version))
            .map(|r| r.hashes.clone())
            .ok_or_else(|| {
                Error::NotFoundError(format!(
                    "{} {} is not provided by {}",
                    package_name, version, self.url
                ))
            })
    }
}
