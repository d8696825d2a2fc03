// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use pysolver::installer::InstallToken;
use pysolver::{CommandError, Error, Installer, PackageMetadata, Result, StaticIndex, SubgraphGate};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

pub const PYPI: &str = "https://pypi.org/simple";
pub const MIRROR: &str = "https://mirror.example.com/simple";

/// Scripted outcome of probing one release
#[derive(Clone)]
pub enum Probe {
    /// Installs and reports these `Requires-Dist` entries
    Requires(Vec<String>),
    /// Installs but reports a different version
    Reports { version: String, requires: Vec<String> },
    /// pip fails
    InstallFails,
    /// Installs but carries no metadata
    NotSitePackage,
    /// The interpreter is gone
    EnvironmentGone,
}

/// Installer answering from a script instead of running pip
#[derive(Default)]
pub struct FakeInstaller {
    probes: HashMap<String, Probe>,
    /// `install`/`release` events in order
    pub journal: RefCell<Vec<String>>,
}

impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, requires: &[&str]) -> Self {
        self.probes.insert(
            key.to_string(),
            Probe::Requires(requires.iter().map(|r| r.to_string()).collect()),
        );
        self
    }

    pub fn with_probe(mut self, key: &str, probe: Probe) -> Self {
        self.probes.insert(key.to_string(), probe);
        self
    }

    /// Releases installed, in probe order
    pub fn installed(&self) -> Vec<String> {
        self.journal
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix("install ").map(str::to_string))
            .collect()
    }

    pub fn released(&self) -> Vec<String> {
        self.journal
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix("release ").map(str::to_string))
            .collect()
    }
}

impl Installer for FakeInstaller {
    fn install(&self, package_name: &str, version: &str, index_url: &str) -> Result<InstallToken> {
        let key = format!("{}=={}", package_name, version);
        match self.probes.get(&key) {
            Some(Probe::InstallFails) => {
                return Err(Error::CommandFailed(CommandError {
                    command: format!("python3 -m pip install {}", key),
                    stdout: String::new(),
                    stderr: format!("ERROR: No matching distribution found for {}", key),
                    return_code: Some(1),
                    timeout: false,
                }));
            }
            Some(Probe::EnvironmentGone) => {
                return Err(Error::EnvironmentError("python3 not found".to_string()));
            }
            _ => {}
        }

        self.journal.borrow_mut().push(format!("install {}", key));
        Ok(InstallToken {
            package_name: package_name.to_string(),
            version: version.to_string(),
            index_url: index_url.to_string(),
            previous_version: None,
        })
    }

    fn introspect(&self, token: &InstallToken) -> Result<PackageMetadata> {
        let key = format!("{}=={}", token.package_name, token.version);
        let (version, requires) = match self.probes.get(&key) {
            Some(Probe::Requires(requires)) => (token.version.clone(), requires.clone()),
            Some(Probe::Reports { version, requires }) => (version.clone(), requires.clone()),
            Some(Probe::NotSitePackage) => {
                return Err(Error::NotSitePackage {
                    package: token.package_name.clone(),
                    reason: "distribution carries no metadata".to_string(),
                });
            }
            _ => (token.version.clone(), Vec::new()),
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("Name".to_string(), token.package_name.clone().into());
        metadata.insert("Version".to_string(), version.clone().into());
        Ok(PackageMetadata {
            name: Some(token.package_name.clone()),
            version: Some(version),
            requires,
            metadata,
            ..Default::default()
        })
    }

    fn release(&self, token: &InstallToken) {
        self.journal
            .borrow_mut()
            .push(format!("release {}=={}", token.package_name, token.version));
    }
}

/// Gate that skips a fixed set of releases and records every query
#[derive(Default)]
pub struct RecordingGate {
    skip: HashSet<String>,
    fail: bool,
    pub queries: RefCell<Vec<String>>,
}

impl RecordingGate {
    pub fn skipping(keys: &[&str]) -> Self {
        Self {
            skip: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl SubgraphGate for RecordingGate {
    fn should_resolve(&self, package_name: &str, version: &str, index_url: &str) -> Result<bool> {
        let key = format!("{}=={}", package_name, version);
        self.queries.borrow_mut().push(format!("{} {}", key, index_url));
        if self.fail {
            return Err(Error::SubgraphGateExhausted {
                url: "https://gate.example.com/check".to_string(),
                package_name: package_name.to_string(),
                package_version: version.to_string(),
                attempts: 3,
                last_error: "unexpected status 500 Internal Server Error".to_string(),
            });
        }
        Ok(!self.skip.contains(&key))
    }
}

/// Index with a small web-framework dependency graph
///
/// ```text
/// flask 1.0 -> werkzeug>=0.14, jinja2>=2.10, itsdangerous
/// jinja2 2.10, 2.11 -> markupsafe>=0.23
/// ```
pub fn flask_index(url: &str) -> StaticIndex {
    StaticIndex::new(url)
        .with_releases("flask", &["0.12", "1.0"])
        .with_releases("Werkzeug", &["0.13", "0.14", "0.15"])
        .with_releases("Jinja2", &["2.9", "2.10", "2.11"])
        .with_releases("itsdangerous", &["1.1.0"])
        .with_releases("MarkupSafe", &["1.1.1"])
        .with_hash("flask", "1.0", "Flask-1.0-py2.py3-none-any.whl", "aa11")
}

pub fn flask_installer() -> FakeInstaller {
    FakeInstaller::new()
        .with(
            "flask==1.0",
            &["Werkzeug (>=0.14)", "Jinja2 (>=2.10)", "itsdangerous"],
        )
        .with("jinja2==2.10", &["MarkupSafe (>=0.23)"])
        .with("jinja2==2.11", &["MarkupSafe>=0.23"])
}

pub fn requirements(items: &[&str]) -> Vec<String> {
    items.iter().map(|r| r.to_string()).collect()
}
