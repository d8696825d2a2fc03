// src/requirement/parser.rs

//! PEP 508 requirement grammar
//!
//! ```text
//! name [extras] (specifier | "@" url) [";" marker]
//! ```
//!
//! The specifier may be wrapped in parentheses, as older metadata does:
//! `selinon (==1.1.0)`.

use super::marker::MarkerTree;
use super::{Requirement, normalize_name};
use crate::error::{Error, Result};
use crate::version::Specifier;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?").expect("valid name regex")
});

static EXTRA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("valid extra regex")
});

fn parse_error(text: &str, reason: &str) -> Error {
    Error::ParseError(format!("{}: {:?}", reason, text))
}

pub(super) fn parse_requirement(text: &str) -> Result<Requirement> {
    let original = text;
    let text = text.trim();
    if text.is_empty() {
        return Err(parse_error(original, "empty requirement"));
    }

    let name = NAME
        .find(text)
        .map(|m| m.as_str())
        .ok_or_else(|| parse_error(original, "expected package name"))?;
    let mut rest = text[name.len()..].trim_start();

    let mut extras = BTreeSet::new();
    if let Some(after) = rest.strip_prefix('[') {
        let end = after
            .find(']')
            .ok_or_else(|| parse_error(original, "unterminated extras"))?;
        for extra in after[..end].split(',').map(str::trim) {
            if extra.is_empty() {
                continue;
            }
            if !EXTRA.is_match(extra) {
                return Err(parse_error(original, "invalid extra name"));
            }
            extras.insert(normalize_name(extra));
        }
        rest = after[end + 1..].trim_start();
    }

    let mut url = None;
    let mut specifier_text = None;

    if let Some(after) = rest.strip_prefix('@') {
        // A URL may itself contain ';', so the marker must follow whitespace
        let after = after.trim_start();
        let (location, tail) = match after.find(char::is_whitespace) {
            Some(idx) => (&after[..idx], after[idx..].trim_start()),
            None => (after, ""),
        };
        if location.is_empty() {
            return Err(parse_error(original, "expected URL after '@'"));
        }
        url = Some(location.to_string());
        rest = tail;
    } else if let Some(after) = rest.strip_prefix('(') {
        let end = after
            .find(')')
            .ok_or_else(|| parse_error(original, "unterminated version specifier"))?;
        specifier_text = normalize_specifier(&after[..end]);
        rest = after[end + 1..].trim_start();
    } else if !rest.is_empty() && !rest.starts_with(';') {
        let end = rest.find(';').unwrap_or(rest.len());
        specifier_text = normalize_specifier(&rest[..end]);
        rest = &rest[end..];
    }

    let marker = match rest.strip_prefix(';') {
        Some(marker_text) => {
            let marker_text = marker_text.trim();
            if marker_text.is_empty() {
                return Err(parse_error(original, "expected marker after ';'"));
            }
            Some(MarkerTree::parse(marker_text).map_err(|e| {
                Error::ParseError(format!("{} in {:?}", e, original))
            })?)
        }
        None if rest.is_empty() => None,
        None => return Err(parse_error(original, "unexpected trailing text")),
    };

    let specifier = match specifier_text {
        Some(ref spec) => Specifier::parse(spec)?,
        None => Specifier::any(),
    };

    Ok(Requirement {
        name: name.to_string(),
        normalized_name: normalize_name(name),
        specifier_text,
        specifier,
        extras,
        marker,
        url,
    })
}

/// Strip whitespace around operators and sort clauses, `None` when empty
///
/// Whitespace inside a version is kept so that the specifier parser
/// rejects it.
fn normalize_specifier(text: &str) -> Option<String> {
    let mut clauses: Vec<String> = text
        .split(',')
        .map(normalize_clause)
        .filter(|c| !c.is_empty())
        .collect();
    if clauses.is_empty() {
        return None;
    }
    clauses.sort();
    Some(clauses.join(","))
}

fn normalize_clause(clause: &str) -> String {
    let clause = clause.trim();
    let split = clause
        .find(|c: char| !c.is_whitespace() && !matches!(c, '<' | '>' | '=' | '!' | '~'))
        .unwrap_or(clause.len());
    let (operator, version) = clause.split_at(split);
    let mut normalized: String = operator.chars().filter(|c| !c.is_whitespace()).collect();
    normalized.push_str(version.trim());
    normalized
}
