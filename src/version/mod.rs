// src/version/mod.rs

//! Version comparison and specifier matching for Python packages
//!
//! Versions are compared segment by segment after splitting on `.` and `-`.
//! Segments that are not plain integers (pre-release tags such as `0rc1`)
//! sort below every number, so a tagged release sorts below the plain
//! release at the same position. This is deliberately coarser than full PEP 440 ordering:
//! `1.0.0rc1` and `1.0.0rc2` compare equal.

mod specifier;

pub use specifier::{Clause, Operator, Specifier, SpecifierTerm};

use std::cmp::Ordering;

/// A single version segment
///
/// Tagged segments sort below every number. Numbers compare by digit count
/// and then lexically, so arbitrarily long date stamps keep their order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Tagged,
    Number(usize, String),
}

impl Segment {
    fn zero() -> Self {
        Segment::Number(0, String::new())
    }
}

fn segment_value(segment: &str) -> Segment {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Segment::Tagged;
    }
    let digits = segment.trim_start_matches('0');
    Segment::Number(digits.len(), digits.to_string())
}

fn segments(version: &str) -> Vec<Segment> {
    version
        .trim()
        .replace('-', ".")
        .split('.')
        .map(segment_value)
        .collect()
}

/// Compare two version strings
///
/// The shorter segment list is right-padded with zeros, so `"1.2"` and
/// `"1.2.0"` compare equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = segments(a);
    let mut right = segments(b);
    let len = left.len().max(right.len());
    left.resize(len, Segment::zero());
    right.resize(len, Segment::zero());
    left.cmp(&right)
}

/// Sort versions in ascending order, keeping the input order of ties
pub fn sort_versions<T, F>(items: &mut [T], version_of: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| compare_versions(version_of(a), version_of(b)));
}

/// Whether a string should be compared as a version rather than as text
pub fn looks_like_version(value: &str) -> bool {
    value
        .trim()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

/// Leading numeric release components of a version
///
/// `"1.4.2"` → `[1, 4, 2]`, `"2.0rc1"` → `[2, 0]`, `"1!3.1"` → `[3, 1]`.
/// Stops at the first component that is not purely numeric, keeping its
/// leading digits.
pub(crate) fn release_components(version: &str) -> Vec<u64> {
    let version = version.rsplit('!').next().unwrap_or(version);
    let mut result = Vec::new();

    for component in version.split('.') {
        let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            break;
        }
        match digits.parse::<u64>() {
            Ok(value) => result.push(value),
            Err(_) => break,
        }
        if digits.len() != component.len() {
            break;
        }
    }

    result
}

/// Render release components with the last one incremented
///
/// `[1, 4]` → `"1.5"`. Returns `None` for an empty list or when the last
/// component cannot be incremented.
pub(crate) fn bump_last(components: &[u64]) -> Option<String> {
    let (last, head) = components.split_last()?;
    let mut parts: Vec<String> = head.iter().map(|c| c.to_string()).collect();
    parts.push(last.checked_add(1)?.to_string());
    Some(parts.join("."))
}
