// src/version/specifier.rs

//! Version specifiers as a disjunction of conjunctions
//!
//! `>=1.0,<2.0` parses to a single conjunction. Compatible-release and
//! prefix-match clauses are expanded into plain comparisons at parse time,
//! so matching only ever deals with the six ordering operators.

use super::{bump_last, compare_versions, release_components};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators understood by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl Operator {
    /// Parse a matcher operator
    ///
    /// `=` and `===` are accepted as equality. `~=` is not a matcher
    /// operator: it must be expanded by [`Specifier::parse`] first.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "==" | "=" | "===" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessOrEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterOrEqual),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown comparison operator '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::NotEqual => ordering != Ordering::Equal,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessOrEqual => ordering != Ordering::Greater,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(operator, version)` comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub operator: Operator,
    pub version: String,
}

impl Clause {
    pub fn new(operator: Operator, version: impl Into<String>) -> Self {
        Self {
            operator,
            version: version.into(),
        }
    }

    pub fn matches(&self, version: &str) -> bool {
        self.operator
            .holds(compare_versions(version, &self.version))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// One disjunct of a specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecifierTerm {
    Single(Clause),
    /// All clauses must hold
    All(Vec<Clause>),
}

impl SpecifierTerm {
    fn from_clauses(mut clauses: Vec<Clause>) -> Self {
        if clauses.len() == 1 {
            SpecifierTerm::Single(clauses.remove(0))
        } else {
            SpecifierTerm::All(clauses)
        }
    }

    pub fn matches(&self, version: &str) -> bool {
        match self {
            SpecifierTerm::Single(clause) => clause.matches(version),
            SpecifierTerm::All(clauses) => clauses.iter().all(|c| c.matches(version)),
        }
    }
}

impl fmt::Display for SpecifierTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecifierTerm::Single(clause) => write!(f, "{}", clause),
            SpecifierTerm::All(clauses) => {
                let parts: Vec<String> = clauses.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Top-level disjunction of terms; an empty specifier matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Specifier {
    terms: Vec<SpecifierTerm>,
}

/// Operators as they may appear in requirement text, longest first
const SPEC_OPERATORS: &[&str] = &["===", "~=", "==", "!=", "<=", ">=", "<", ">", "="];

impl Specifier {
    /// Specifier that accepts any version
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from_terms(terms: Vec<SpecifierTerm>) -> Self {
        Self { terms }
    }

    /// Parse comma-separated clauses such as `>=1.0,<2.0` or `~=1.4.2`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::any());
        }

        // Disjunctive normal form: each clause may expand into alternatives
        let mut alternatives: Vec<Vec<Clause>> = vec![Vec::new()];
        for raw in text.split(',') {
            let expanded = expand_clause(raw.trim())?;
            let mut next = Vec::with_capacity(alternatives.len() * expanded.len());
            for prefix in &alternatives {
                for option in &expanded {
                    let mut combined = prefix.clone();
                    combined.extend(option.iter().cloned());
                    next.push(combined);
                }
            }
            alternatives = next;
        }

        Ok(Self {
            terms: alternatives
                .into_iter()
                .map(SpecifierTerm::from_clauses)
                .collect(),
        })
    }

    /// Either this specifier or `other`
    pub fn or(mut self, other: Specifier) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::any();
        }
        self.terms.extend(other.terms);
        self
    }

    pub fn terms(&self) -> &[SpecifierTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Check whether `version` satisfies any term
    pub fn matches(&self, version: &str) -> bool {
        self.terms.is_empty() || self.terms.iter().any(|t| t.matches(version))
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join(" || "))
    }
}

/// Split a clause into its operator and version text
fn split_operator(clause: &str) -> Result<(&'static str, &str)> {
    for &op in SPEC_OPERATORS {
        if let Some(rest) = clause.strip_prefix(op) {
            let version = rest.trim();
            if version.is_empty() {
                return Err(Error::ParseError(format!(
                    "missing version after '{}' in '{}'",
                    op, clause
                )));
            }
            validate_version(version, clause)?;
            return Ok((op, version));
        }
    }
    Err(Error::ParseError(format!(
        "expected a comparison operator in '{}'",
        clause
    )))
}

fn validate_version(version: &str, clause: &str) -> Result<()> {
    let body = version.strip_suffix(".*").unwrap_or(version);
    let valid = !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+' | '!'));
    if valid {
        Ok(())
    } else {
        Err(Error::ParseError(format!(
            "invalid version '{}' in '{}'",
            version, clause
        )))
    }
}

/// Expand one textual clause into alternatives of plain comparisons
fn expand_clause(clause: &str) -> Result<Vec<Vec<Clause>>> {
    let (op, version) = split_operator(clause)?;

    if let Some(prefix) = version.strip_suffix(".*") {
        let components = release_components(prefix);
        let exact = components.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(".");
        if components.is_empty() || exact != prefix {
            return Err(Error::ParseError(format!(
                "prefix match requires a numeric release in '{}'",
                clause
            )));
        }
        let upper = upper_bound(&components, clause)?;
        return match op {
            "==" => Ok(vec![vec![
                Clause::new(Operator::GreaterOrEqual, prefix),
                Clause::new(Operator::LessThan, upper),
            ]]),
            "!=" => Ok(vec![
                vec![Clause::new(Operator::LessThan, prefix)],
                vec![Clause::new(Operator::GreaterOrEqual, upper)],
            ]),
            _ => Err(Error::ParseError(format!(
                "'.*' suffix is only allowed with '==' or '!=' in '{}'",
                clause
            ))),
        };
    }

    if op == "~=" {
        let mut components = release_components(version);
        if components.len() < 2 {
            return Err(Error::ParseError(format!(
                "'~=' requires at least two release components in '{}'",
                clause
            )));
        }
        components.pop();
        let upper = upper_bound(&components, clause)?;
        return Ok(vec![vec![
            Clause::new(Operator::GreaterOrEqual, version),
            Clause::new(Operator::LessThan, upper),
        ]]);
    }

    let operator = Operator::parse(op).map_err(|e| Error::ParseError(e.to_string()))?;
    Ok(vec![vec![Clause::new(operator, version)]])
}

fn upper_bound(components: &[u64], clause: &str) -> Result<String> {
    bump_last(components).ok_or_else(|| {
        Error::ParseError(format!("release component out of range in '{}'", clause))
    })
}
