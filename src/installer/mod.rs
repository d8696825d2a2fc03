// src/installer/mod.rs

//! Package installation probes
//!
//! Resolution learns a package's dependencies by installing exactly that
//! release into a scratch interpreter environment and reading the metadata
//! the installed distribution reports. An [`Installer`] performs the three
//! steps; [`InstallGuard`] ties them together so the environment is
//! restored on every exit path.

mod pip;

pub use pip::PipInstaller;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Handle for one installed release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallToken {
    pub package_name: String,
    pub version: String,
    pub index_url: String,
    /// Version that was installed before the probe, restored on release
    pub previous_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub value: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledFile {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub hash: Option<Value>,
}

/// Metadata of an installed distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// Distribution name as recorded in its metadata
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Raw `Requires-Dist` entries
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default)]
    pub files: Vec<InstalledFile>,
    /// Core metadata fields, multi-value fields as arrays
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

pub trait Installer {
    /// Install one release from `index_url`
    ///
    /// On failure the environment has already been restored.
    fn install(&self, package_name: &str, version: &str, index_url: &str) -> Result<InstallToken>;

    /// Read the metadata of the installed release
    fn introspect(&self, token: &InstallToken) -> Result<PackageMetadata>;

    /// Remove the release and restore what was there before
    ///
    /// Failures are logged; they never abort resolution.
    fn release(&self, token: &InstallToken);
}

impl<T: Installer + ?Sized> Installer for &T {
    fn install(&self, package_name: &str, version: &str, index_url: &str) -> Result<InstallToken> {
        (**self).install(package_name, version, index_url)
    }

    fn introspect(&self, token: &InstallToken) -> Result<PackageMetadata> {
        (**self).introspect(token)
    }

    fn release(&self, token: &InstallToken) {
        (**self).release(token)
    }
}

/// Installed release that is released when dropped
pub struct InstallGuard<'a, I: Installer + ?Sized> {
    installer: &'a I,
    token: InstallToken,
}

impl<'a, I: Installer + ?Sized> InstallGuard<'a, I> {
    pub fn acquire(
        installer: &'a I,
        package_name: &str,
        version: &str,
        index_url: &str,
    ) -> Result<Self> {
        let token = installer.install(package_name, version, index_url)?;
        Ok(Self { installer, token })
    }

    pub fn token(&self) -> &InstallToken {
        &self.token
    }

    pub fn introspect(&self) -> Result<PackageMetadata> {
        self.installer.introspect(&self.token)
    }
}

impl<I: Installer + ?Sized> Drop for InstallGuard<'_, I> {
    fn drop(&mut self) {
        debug!(
            "Releasing {} {}",
            self.token.package_name, self.token.version
        );
        self.installer.release(&self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Journal {
        events: RefCell<Vec<String>>,
        fail_introspect: bool,
    }

    impl Installer for Journal {
        fn install(&self, name: &str, version: &str, index_url: &str) -> Result<InstallToken> {
            self.events.borrow_mut().push(format!("install {name} {version}"));
            Ok(InstallToken {
                package_name: name.to_string(),
                version: version.to_string(),
                index_url: index_url.to_string(),
                previous_version: None,
            })
        }

        fn introspect(&self, token: &InstallToken) -> Result<PackageMetadata> {
            self.events
                .borrow_mut()
                .push(format!("introspect {}", token.package_name));
            if self.fail_introspect {
                return Err(Error::NotSitePackage {
                    package: token.package_name.clone(),
                    reason: "no metadata".to_string(),
                });
            }
            Ok(PackageMetadata::default())
        }

        fn release(&self, token: &InstallToken) {
            self.events
                .borrow_mut()
                .push(format!("release {}", token.package_name));
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let journal = Journal::default();
        {
            let guard = InstallGuard::acquire(&journal, "six", "1.12.0", "https://pypi.org/simple")
                .unwrap();
            guard.introspect().unwrap();
        }
        assert_eq!(
            *journal.events.borrow(),
            vec!["install six 1.12.0", "introspect six", "release six"]
        );
    }

    #[test]
    fn test_guard_releases_after_failed_introspection() {
        let journal = Journal {
            fail_introspect: true,
            ..Default::default()
        };
        let result = InstallGuard::acquire(&journal, "six", "1.12.0", "https://pypi.org/simple")
            .and_then(|guard| guard.introspect());
        assert!(result.is_err());
        assert_eq!(journal.events.borrow().last().unwrap(), "release six");
    }

    #[test]
    fn test_metadata_deserializes_with_missing_fields() {
        let metadata: PackageMetadata = serde_json::from_str(
            r#"{"name": "selinon", "version": "1.1.0", "metadata": {"Name": "selinon"}}"#,
        )
        .unwrap();
        assert_eq!(metadata.version.as_deref(), Some("1.1.0"));
        assert!(metadata.requires.is_empty());
        assert_eq!(metadata.metadata["Name"], "selinon");
    }
}
