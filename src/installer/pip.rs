// src/installer/pip.rs

//! Installer backed by `pip` inside a virtual environment

use super::{InstallToken, Installer, PackageMetadata};
use crate::environment::{CommandOutput, VirtualEnv, run_command};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const INTROSPECT_SCRIPT: &str = include_str!("introspect.py");

/// Exit status of the introspection script when no distribution matches
const NO_DISTRIBUTION_EXIT: i32 = 2;

/// Installs one release at a time with `python -m pip`
pub struct PipInstaller {
    python: PathBuf,
    timeout: Duration,
}

impl PipInstaller {
    pub fn new(python: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }

    pub fn for_env(venv: &VirtualEnv) -> Self {
        Self::new(venv.python(), venv.timeout())
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    fn pip(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut full = vec!["-m", "pip"];
        full.extend_from_slice(args);
        run_command(&self.python, &full, self.timeout)
    }

    /// Version currently installed, if any
    fn installed_version(&self, package_name: &str) -> Result<Option<String>> {
        match self.pip(&["show", package_name]) {
            Ok(output) => Ok(parse_show_version(&output.stdout)),
            Err(Error::CommandFailed(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn restore(&self, package_name: &str, version: &str, previous_version: Option<&str>) {
        debug!("Removing installed package {}", package_name);
        if let Err(e) = self.pip(&["uninstall", "--yes", package_name]) {
            warn!(
                "Failed to remove {} {}, later probes may be affected: {}",
                package_name, version, e
            );
        }

        let Some(previous) = previous_version else {
            return;
        };
        debug!("Restoring {} {}", package_name, previous);
        let requirement = format!("{}=={}", package_name, previous);
        if let Err(e) = self.pip(&[
            "install",
            "--force-reinstall",
            "--no-cache-dir",
            "--no-deps",
            &requirement,
        ]) {
            warn!(
                "Failed to restore {} {} after probing {}: {}",
                package_name, previous, version, e
            );
        }
    }
}

/// Host (and port) pip must trust for `index_url`
fn trusted_host(index_url: &str) -> Option<String> {
    let url = url::Url::parse(index_url).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn parse_show_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Installer for PipInstaller {
    fn install(&self, package_name: &str, version: &str, index_url: &str) -> Result<InstallToken> {
        let previous_version = self.installed_version(package_name)?;
        let requirement = format!("{}=={}", package_name, version);

        let mut args = vec![
            "install",
            "--force-reinstall",
            "--no-cache-dir",
            "--no-deps",
            requirement.as_str(),
            "--index-url",
            index_url,
        ];
        let host = trusted_host(index_url);
        if let Some(ref host) = host {
            args.push("--trusted-host");
            args.push(host);
        }

        debug!("Installing {} {} from {}", package_name, version, index_url);
        match self.pip(&args) {
            Ok(output) => {
                debug!(
                    "Log during installation:\nstdout: {}\nstderr: {}",
                    output.stdout, output.stderr
                );
                Ok(InstallToken {
                    package_name: package_name.to_string(),
                    version: version.to_string(),
                    index_url: index_url.to_string(),
                    previous_version,
                })
            }
            Err(e) => {
                self.restore(package_name, version, previous_version.as_deref());
                Err(e)
            }
        }
    }

    fn introspect(&self, token: &InstallToken) -> Result<PackageMetadata> {
        let output = match run_command(
            &self.python,
            &["-c", INTROSPECT_SCRIPT, token.package_name.as_str()],
            self.timeout,
        ) {
            Ok(output) => output,
            Err(Error::CommandFailed(e)) if e.return_code == Some(NO_DISTRIBUTION_EXIT) => {
                return Err(Error::NotSitePackage {
                    package: token.package_name.clone(),
                    reason: e.stderr.trim().to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let metadata: PackageMetadata =
            serde_json::from_str(output.stdout.trim()).map_err(|e| Error::NotSitePackage {
                package: token.package_name.clone(),
                reason: format!("unreadable metadata: {}", e),
            })?;

        if metadata.name.as_deref().is_none_or(str::is_empty) || metadata.metadata.is_empty() {
            return Err(Error::NotSitePackage {
                package: token.package_name.clone(),
                reason: "distribution carries no metadata".to_string(),
            });
        }
        Ok(metadata)
    }

    fn release(&self, token: &InstallToken) {
        self.restore(
            &token.package_name,
            &token.version,
            token.previous_version.as_deref(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_host() {
        assert_eq!(
            trusted_host("https://pypi.org/simple").as_deref(),
            Some("pypi.org")
        );
        assert_eq!(
            trusted_host("http://localhost:8080/simple/").as_deref(),
            Some("localhost:8080")
        );
        assert_eq!(trusted_host("not a url"), None);
    }

    #[test]
    fn test_parse_show_version() {
        let stdout = "Name: six\nVersion: 1.12.0\nSummary: Python 2 and 3 compatibility utilities\n";
        assert_eq!(parse_show_version(stdout).as_deref(), Some("1.12.0"));
        assert_eq!(parse_show_version("Name: six\n"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_interpreter_is_fatal() {
        let installer = PipInstaller::new("/nonexistent/bin/python", Duration::from_secs(1));
        let err = installer
            .install("six", "1.12.0", "https://pypi.org/simple")
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
