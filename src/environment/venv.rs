// src/environment/venv.rs

//! Interpreter environments used for install probes
//!
//! Ephemeral environments live in a temporary directory that is removed
//! when the [`VirtualEnv`] is dropped. An existing environment can be used
//! instead; it is never deleted.

use super::command::{CommandOutput, run_command};
use crate::config::PythonMajor;
use crate::error::{Error, Result};
use crate::requirement::MarkerEnvironment;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const MARKER_SCRIPT: &str = include_str!("markers.py");

/// A package present in the environment before resolution starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentPackage {
    pub package_name: String,
    pub package_version: String,
}

#[derive(Debug, Deserialize)]
struct PipListEntry {
    name: String,
    version: String,
}

/// A Python virtual environment
pub struct VirtualEnv {
    root: PathBuf,
    python: PathBuf,
    timeout: Duration,
    _dir: Option<TempDir>,
}

fn python_in(root: &Path) -> PathBuf {
    if cfg!(windows) {
        root.join("Scripts").join("python.exe")
    } else {
        root.join("bin").join("python")
    }
}

impl VirtualEnv {
    /// Create a fresh environment for the given interpreter
    ///
    /// Prefers the `virtualenv` tool when it is on `PATH` and falls back to
    /// the interpreter's own `venv` module.
    pub fn create(major: PythonMajor, timeout: Duration) -> Result<Self> {
        let interpreter = which::which(major.interpreter()).map_err(|e| {
            Error::EnvironmentError(format!("{} not found: {}", major.interpreter(), e))
        })?;

        let dir = tempfile::Builder::new()
            .prefix("pysolver-venv-")
            .tempdir()
            .map_err(|e| Error::EnvironmentError(format!("Failed to create temp dir: {}", e)))?;
        let root = dir.path().to_path_buf();

        info!(
            "Creating virtual environment in {} using {}",
            root.display(),
            interpreter.display()
        );
        let created = match which::which("virtualenv") {
            Ok(virtualenv) => run_command(
                virtualenv,
                &[OsStr::new("-p"), interpreter.as_os_str(), root.as_os_str()],
                timeout,
            ),
            Err(_) => run_command(
                &interpreter,
                &[OsStr::new("-m"), OsStr::new("venv"), root.as_os_str()],
                timeout,
            ),
        };
        created.map_err(|e| {
            Error::EnvironmentError(format!("Failed to create virtual environment: {}", e))
        })?;

        Ok(Self {
            python: python_in(&root),
            root,
            timeout,
            _dir: Some(dir),
        })
    }

    /// Use an environment that already exists at `root`
    pub fn existing(root: &Path, timeout: Duration) -> Result<Self> {
        let python = python_in(root);
        if !python.exists() {
            return Err(Error::EnvironmentError(format!(
                "{} is not a virtual environment: {} is missing",
                root.display(),
                python.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            python,
            timeout,
            _dir: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Interpreter inside the environment
    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the environment's interpreter with `args`
    pub fn run_python<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<CommandOutput> {
        run_command(&self.python, args, self.timeout)
    }

    /// Packages installed before any probe runs
    pub fn installed_packages(&self) -> Result<Vec<EnvironmentPackage>> {
        let output = self.run_python(&["-m", "pip", "list", "--format=json"])?;
        let entries: Vec<PipListEntry> = serde_json::from_str(output.stdout.trim())?;
        debug!("Environment holds {} packages", entries.len());
        Ok(entries
            .into_iter()
            .map(|e| EnvironmentPackage {
                package_name: e.name,
                package_version: e.version,
            })
            .collect())
    }

    /// Marker variables as reported by the interpreter
    pub fn marker_environment(&self) -> Result<MarkerEnvironment> {
        let output = self.run_python(&["-c", MARKER_SCRIPT])?;
        Ok(serde_json::from_str(output.stdout.trim())?)
    }
}
