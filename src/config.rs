// src/config.rs

//! Solver configuration
//!
//! A [`SolverConfig`] is built once per invocation, from a TOML file, from
//! command-line flags, or both, and passed explicitly to every component.
//! [`SolverConfig::validate`] performs all pre-flight checks so that
//! configuration mistakes surface before any package is installed.
//!
//! ```toml
//! index_urls = ["https://pypi.org/simple"]
//! python_version = 3
//! exclude_packages = ["setuptools"]
//! selection = "highest"
//!
//! [subgraph_check]
//! url = "https://gate.example.com/check"
//! solver_name = "solver-fedora-38-py311"
//! max_attempts = 10
//! ```

use crate::environment::DEFAULT_COMMAND_TIMEOUT;
use crate::error::{Error, Result};
use crate::index::VersionSelection;
use crate::requirement::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";

/// Default number of subgraph gate attempts
pub const DEFAULT_GATE_ATTEMPTS: u32 = 3;

/// Default delay between subgraph gate attempts in milliseconds
pub const DEFAULT_GATE_RETRY_DELAY_MS: u64 = 1000;

/// Major version of the target interpreter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PythonMajor {
    Two,
    #[default]
    Three,
}

impl PythonMajor {
    /// Interpreter executable name, e.g. `python3`
    pub fn interpreter(&self) -> &'static str {
        match self {
            Self::Two => "python2",
            Self::Three => "python3",
        }
    }
}

impl TryFrom<u8> for PythonMajor {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown Python version {}, expected 2 or 3",
                other
            ))),
        }
    }
}

impl From<PythonMajor> for u8 {
    fn from(value: PythonMajor) -> Self {
        match value {
            PythonMajor::Two => 2,
            PythonMajor::Three => 3,
        }
    }
}

impl fmt::Display for PythonMajor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Order in which the frontier is drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOrder {
    /// Most recently discovered first
    #[default]
    Lifo,
    /// Breadth first
    Fifo,
}

/// What to do when a gate is configured but transitive resolution is off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GateWithoutTransitive {
    /// Refuse the configuration
    #[default]
    Reject,
    /// Run without consulting the gate
    DisableGate,
}

/// Subgraph gate endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub url: String,
    /// Identity of this solver, sent with every query
    #[serde(default)]
    pub solver_name: Option<String>,
    #[serde(default = "default_gate_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_gate_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_gate_attempts() -> u32 {
    DEFAULT_GATE_ATTEMPTS
}

fn default_gate_retry_delay_ms() -> u64 {
    DEFAULT_GATE_RETRY_DELAY_MS
}

impl GateConfig {
    pub fn new(url: impl Into<String>, solver_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            solver_name: Some(solver_name.into()),
            max_attempts: DEFAULT_GATE_ATTEMPTS,
            retry_delay_ms: DEFAULT_GATE_RETRY_DELAY_MS,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Everything one resolution run needs to know
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Indexes consulted in order
    pub index_urls: Vec<String>,
    pub python_version: PythonMajor,
    /// Root packages to skip, matched on normalized names
    pub exclude_packages: BTreeSet<String>,
    /// Follow declared dependencies of resolved packages
    pub transitive: bool,
    pub selection: VersionSelection,
    pub traversal: TraversalOrder,
    pub subgraph_check: Option<GateConfig>,
    pub gate_without_transitive: GateWithoutTransitive,
    /// Deadline for every install, introspection and uninstall command
    pub command_timeout_secs: u64,
    /// Existing virtual environment to use instead of an ephemeral one
    pub virtualenv: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            index_urls: vec![DEFAULT_INDEX_URL.to_string()],
            python_version: PythonMajor::default(),
            exclude_packages: BTreeSet::new(),
            transitive: true,
            selection: VersionSelection::default(),
            traversal: TraversalOrder::default(),
            subgraph_check: None,
            gate_without_transitive: GateWithoutTransitive::default(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            virtualenv: None,
        }
    }
}

impl SolverConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Whether a root package is excluded from resolution
    pub fn is_excluded(&self, package_name: &str) -> bool {
        let name = normalize_name(package_name);
        self.exclude_packages
            .iter()
            .any(|excluded| normalize_name(excluded) == name)
    }

    /// Gate settings in effect after applying [`GateWithoutTransitive`]
    pub fn effective_gate(&self) -> Option<&GateConfig> {
        match (&self.subgraph_check, self.transitive) {
            (Some(gate), true) => Some(gate),
            (Some(_), false) if self.gate_without_transitive == GateWithoutTransitive::DisableGate => {
                None
            }
            (Some(gate), false) => Some(gate),
            (None, _) => None,
        }
    }

    /// Check the configuration before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.index_urls.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one index URL is required".to_string(),
            ));
        }
        for index_url in &self.index_urls {
            url::Url::parse(index_url).map_err(|e| {
                Error::InvalidConfiguration(format!("invalid index URL {}: {}", index_url, e))
            })?;
        }

        if self.command_timeout_secs == 0 {
            return Err(Error::InvalidConfiguration(
                "command timeout must be positive".to_string(),
            ));
        }

        let Some(gate) = &self.subgraph_check else {
            return Ok(());
        };

        if !self.transitive {
            match self.gate_without_transitive {
                GateWithoutTransitive::Reject => {
                    return Err(Error::InvalidConfiguration(
                        "subgraph check requires transitive resolution".to_string(),
                    ));
                }
                GateWithoutTransitive::DisableGate => {
                    warn!("Transitive resolution is off, subgraph check at {} is disabled", gate.url);
                    return Ok(());
                }
            }
        }

        url::Url::parse(&gate.url).map_err(|e| {
            Error::InvalidConfiguration(format!("invalid subgraph check URL {}: {}", gate.url, e))
        })?;
        if gate.solver_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            return Err(Error::InvalidConfiguration(
                "solver name is required when the subgraph check is enabled".to_string(),
            ));
        }
        if gate.max_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "subgraph check needs at least one attempt".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.index_urls, vec![DEFAULT_INDEX_URL.to_string()]);
        assert_eq!(config.python_version, PythonMajor::Three);
        assert!(config.transitive);
        assert_eq!(config.selection, VersionSelection::All);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_python_major() {
        assert_eq!(PythonMajor::try_from(2).unwrap(), PythonMajor::Two);
        assert_eq!(PythonMajor::Three.interpreter(), "python3");
        assert!(matches!(
            PythonMajor::try_from(4),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_toml() {
        let config = SolverConfig::from_toml(
            r#"
            index_urls = ["https://pypi.org/simple", "https://example.com/simple"]
            python_version = 2
            exclude_packages = ["Setuptools"]
            selection = "highest"
            traversal = "fifo"

            [subgraph_check]
            url = "https://gate.example.com/check"
            solver_name = "solver-rhel-8-py36"
            max_attempts = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.index_urls.len(), 2);
        assert_eq!(config.python_version, PythonMajor::Two);
        assert!(config.is_excluded("setuptools"));
        assert_eq!(config.selection, VersionSelection::Highest);
        assert_eq!(config.traversal, TraversalOrder::Fifo);
        let gate = config.subgraph_check.as_ref().unwrap();
        assert_eq!(gate.max_attempts, 10);
        assert_eq!(gate.retry_delay_ms, DEFAULT_GATE_RETRY_DELAY_MS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_python_version_in_toml() {
        let result = SolverConfig::from_toml("python_version = 4");
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_empty_index_list_rejected() {
        let config = SolverConfig {
            index_urls: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_gate_requires_solver_name() {
        let mut gate = GateConfig::new("https://gate.example.com", "solver");
        gate.solver_name = None;
        let config = SolverConfig {
            subgraph_check: Some(gate),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_gate_without_transitive() {
        let mut config = SolverConfig {
            transitive: false,
            subgraph_check: Some(GateConfig::new("https://gate.example.com", "solver")),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.gate_without_transitive = GateWithoutTransitive::DisableGate;
        assert!(config.validate().is_ok());
        assert!(config.effective_gate().is_none());

        config.transitive = true;
        assert!(config.effective_gate().is_some());
    }

    #[test]
    fn test_exclusion_is_normalized() {
        let config = SolverConfig {
            exclude_packages: ["Typing_Extensions".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(config.is_excluded("typing-extensions"));
        assert!(config.is_excluded("typing.extensions"));
        assert!(!config.is_excluded("typing"));
    }
}
