// src/resolver/frontier.rs

//! Work queue of releases waiting to be probed

use crate::config::TraversalOrder;
use crate::requirement::normalize_name;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// A `(normalized name, version)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: normalize_name(name),
            version: version.to_string(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Pending releases plus every release ever queued
///
/// A key enters the queue at most once; the visited set only grows.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<PackageKey>,
    visited: HashSet<PackageKey>,
    order: TraversalOrder,
}

impl Frontier {
    pub fn new(order: TraversalOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn is_visited(&self, key: &PackageKey) -> bool {
        self.visited.contains(key)
    }

    /// Queue `key` unless it was queued before, returns whether it was added
    pub fn push(&mut self, key: PackageKey) -> bool {
        if !self.visited.insert(key.clone()) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    pub fn pop(&mut self) -> Option<PackageKey> {
        match self.order {
            TraversalOrder::Lifo => self.queue.pop_back(),
            TraversalOrder::Fifo => self.queue.pop_front(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
