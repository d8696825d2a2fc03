// src/requirement/mod.rs

//! Requirement parsing and environment markers
//!
//! A requirement is the textual request for a package as it appears on the
//! command line or in `Requires-Dist` metadata:
//!
//! ```text
//! selinon[postgresql,redis] (==1.1.0); extra == 'workflow'
//! ```
//!
//! Parsing is exposed through the [`RequirementParser`] trait so that other
//! ecosystems can plug in their own grammar next to [`PythonRequirementParser`].

pub mod marker;
mod parser;

pub use marker::{
    MarkerEnvironment, MarkerEvaluation, MarkerExpression, MarkerOperator, MarkerTree, MarkerValue,
};

use crate::error::Result;
use crate::version::Specifier;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static NAME_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("valid separator regex"));

/// Canonical form of a package name
///
/// Lowercase, with every run of `-`, `_` and `.` collapsed to a single `-`,
/// so `Backports.Weakref` and `backports-weakref` compare equal.
pub fn normalize_name(name: &str) -> String {
    NAME_SEPARATORS
        .replace_all(name.trim(), "-")
        .to_lowercase()
}

/// A parsed package requirement
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    /// Name as written
    pub name: String,
    pub normalized_name: String,
    /// Specifier clauses as written, whitespace removed and sorted
    pub specifier_text: Option<String>,
    /// Expanded specifier used for matching
    pub specifier: Specifier,
    pub extras: BTreeSet<String>,
    pub marker: Option<MarkerTree>,
    /// Direct reference (`name @ url`)
    pub url: Option<String>,
}

impl Requirement {
    /// Requirement on any version of `name`
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            normalized_name: normalize_name(name),
            specifier_text: None,
            specifier: Specifier::any(),
            extras: BTreeSet::new(),
            marker: None,
            url: None,
        }
    }

    /// Evaluate the marker with `extra` neutralized
    pub fn evaluate_marker(&self, environment: &MarkerEnvironment) -> MarkerEvaluation {
        marker::evaluate_marker(self.marker.as_ref(), environment)
    }

    /// Specifier text for logs and reports, empty when unconstrained
    pub fn version_spec(&self) -> &str {
        self.specifier_text.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        if let Some(ref url) = self.url {
            write!(f, " @ {}", url)?;
        }
        if let Some(ref spec) = self.specifier_text {
            write!(f, "{}", spec)?;
        }
        if let Some(ref marker) = self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

/// Turns requirement text into [`Requirement`] values
pub trait RequirementParser {
    /// Parse a single requirement
    fn parse(&self, text: &str) -> Result<Requirement>;

    /// Parse several requirements, failing on the first malformed one
    fn parse_all(&self, texts: &[String]) -> Result<Vec<Requirement>> {
        texts.iter().map(|t| self.parse(t)).collect()
    }
}

/// PEP 508 requirement parser
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonRequirementParser;

impl RequirementParser for PythonRequirementParser {
    fn parse(&self, text: &str) -> Result<Requirement> {
        parser::parse_requirement(text)
    }
}
