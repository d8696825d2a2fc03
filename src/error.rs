// src/error.rs

//! Error types shared across the solver
//!
//! Per-package failures are recoverable and end up as entries in the
//! resolution report. Only the variants reported by [`Error::is_fatal`]
//! are allowed to abort a run.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure classification as it appears in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed requirement text
    ParseError,
    /// The specifier matched nothing in an index
    NoMatchingRelease,
    /// An install, introspection or uninstall command failed
    CommandError,
    /// Introspection succeeded but produced no usable metadata
    NotSitePackage,
    /// The subgraph gate never produced a recognized answer
    SubgraphGateExhausted,
    /// A single-name solve yielded more than one package name
    AmbiguousResolution,
    /// Unknown Python version, missing solver name, and similar
    InvalidConfiguration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::NoMatchingRelease => "no_matching_release",
            Self::CommandError => "command_error",
            Self::NotSitePackage => "not_site_package",
            Self::SubgraphGateExhausted => "subgraph_gate_exhausted",
            Self::AmbiguousResolution => "ambiguous_resolution",
            Self::InvalidConfiguration => "invalid_configuration",
        }
    }

    /// Whether an error of this kind aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SubgraphGateExhausted | Self::AmbiguousResolution | Self::InvalidConfiguration
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed subprocess with everything it printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandError {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit status, `None` when the process was killed or timed out
    pub return_code: Option<i32>,
    pub timeout: bool,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timeout {
            return write!(f, "command '{}' timed out", self.command);
        }
        match self.return_code {
            Some(code) => write!(f, "command '{}' exited with {}", self.command, code)?,
            None => write!(f, "command '{}' was terminated", self.command)?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {}", stderr)?;
        }
        Ok(())
    }
}

impl std::error::Error for CommandError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to parse requirement: {0}")]
    ParseError(String),

    #[error("Marker error: {0}")]
    MarkerError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("{0}")]
    CommandFailed(#[from] CommandError),

    #[error("Package {package} has no usable metadata: {reason}")]
    NotSitePackage { package: String, reason: String },

    #[error("Environment error: {0}")]
    EnvironmentError(String),

    #[error(
        "Subgraph check at {url} failed for {package_name} {package_version} after {attempts} attempts: {last_error}"
    )]
    SubgraphGateExhausted {
        url: String,
        package_name: String,
        package_version: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Resolution of {requested} yielded multiple packages: {}", names.join(", "))]
    AmbiguousResolution {
        requested: String,
        names: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Report classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ParseError(_) | Error::MarkerError(_) => ErrorKind::ParseError,
            Error::NotFoundError(_) | Error::IndexError(_) => ErrorKind::NoMatchingRelease,
            Error::NotSitePackage { .. } => ErrorKind::NotSitePackage,
            Error::SubgraphGateExhausted { .. } => ErrorKind::SubgraphGateExhausted,
            Error::AmbiguousResolution { .. } => ErrorKind::AmbiguousResolution,
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Error::CommandFailed(_)
            | Error::EnvironmentError(_)
            | Error::IoError(_)
            | Error::SerializationError(_) => ErrorKind::CommandError,
        }
    }

    /// Whether this error must unwind the whole run
    ///
    /// Environment errors are fatal even though they classify as command
    /// errors: once the interpreter environment is gone every following
    /// probe would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::EnvironmentError(_)) || self.kind().is_fatal()
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(ErrorKind::SubgraphGateExhausted.is_fatal());
        assert!(ErrorKind::AmbiguousResolution.is_fatal());
        assert!(ErrorKind::InvalidConfiguration.is_fatal());
        assert!(!ErrorKind::CommandError.is_fatal());
        assert!(!ErrorKind::ParseError.is_fatal());
    }

    #[test]
    fn test_environment_error_is_fatal() {
        let err = Error::EnvironmentError("python3 not found".to_string());
        assert_eq!(err.kind(), ErrorKind::CommandError);
        assert!(err.is_fatal());
        assert!(!Error::IndexError("timeout".to_string()).is_fatal());
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError {
            command: "python3 -m pip install foo==1.0".to_string(),
            stdout: String::new(),
            stderr: "No matching distribution\n".to_string(),
            return_code: Some(1),
            timeout: false,
        };
        assert_eq!(
            err.to_string(),
            "command 'python3 -m pip install foo==1.0' exited with 1: No matching distribution"
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotSitePackage).unwrap();
        assert_eq!(json, "\"not_site_package\"");
    }
}
