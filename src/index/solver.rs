// src/index/solver.rs

//! Requirement to release matching for a single index

use super::{Release, ReleaseFetcher};
use crate::error::{Error, Result};
use crate::requirement::{PythonRequirementParser, Requirement, RequirementParser};
use crate::version::sort_versions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Which matching releases a solve keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VersionSelection {
    /// Every matching release, ascending
    #[default]
    All,
    /// Only the highest matching release
    Highest,
    /// Only the lowest matching release
    Lowest,
}

/// Pairs a requirement parser with the release listing of one index
pub struct IndexSolver<F, P = PythonRequirementParser> {
    parser: P,
    fetcher: F,
    selection: VersionSelection,
}

impl<F: ReleaseFetcher> IndexSolver<F> {
    pub fn new(fetcher: F, selection: VersionSelection) -> Self {
        Self::with_parser(PythonRequirementParser, fetcher, selection)
    }
}

impl<F: ReleaseFetcher, P: RequirementParser> IndexSolver<F, P> {
    pub fn with_parser(parser: P, fetcher: F, selection: VersionSelection) -> Self {
        Self {
            parser,
            fetcher,
            selection,
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn index_url(&self) -> &str {
        self.fetcher.index_url()
    }

    /// Match requirements against the index
    ///
    /// Keys are normalized package names; values are the matching releases
    /// in ascending version order, reduced according to the configured
    /// [`VersionSelection`]. A package listed twice is rejected.
    pub fn solve(&self, requirements: &[Requirement]) -> Result<BTreeMap<String, Vec<Release>>> {
        let mut solved = BTreeMap::new();

        for requirement in requirements {
            debug!("Fetching releases for {}", requirement);
            let set = self.fetcher.fetch_releases(&requirement.name)?;

            if solved.contains_key(&set.package_name) {
                return Err(Error::ParseError(format!(
                    "{} is listed multiple times",
                    set.package_name
                )));
            }

            if set.releases.is_empty() {
                info!(
                    "No releases found for {} on {}",
                    requirement.name,
                    self.fetcher.index_url()
                );
            }

            let mut matching: Vec<Release> = set
                .releases
                .into_iter()
                .filter(|r| requirement.specifier.matches(&r.version))
                .collect();
            sort_versions(&mut matching, |r| r.version.as_str());
            debug!("  matching: {:?}", matching);

            let selected = match self.selection {
                VersionSelection::All => matching,
                VersionSelection::Highest => matching.pop().into_iter().collect(),
                VersionSelection::Lowest => matching.into_iter().take(1).collect(),
            };
            solved.insert(set.package_name, selected);
        }

        Ok(solved)
    }

    /// Parse requirement text, then [`solve`](Self::solve)
    pub fn solve_str(&self, requirements: &[String]) -> Result<BTreeMap<String, Vec<Release>>> {
        let parsed = self.parser.parse_all(requirements)?;
        self.solve(&parsed)
    }
}
