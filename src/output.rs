// src/output.rs

//! Result envelope and writers
//!
//! Every document the binary emits is wrapped as `{result, metadata}` where
//! `metadata` records which tool produced it, when, where, and with which
//! arguments. Destination `-` is stdout, an `http(s)://` URL receives the
//! document as a POST body, anything else is a file path.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const ANALYZER_NAME: &str = "pysolver";
pub const ANALYZER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timeout for submitting a document to a remote endpoint
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub analyzer: String,
    pub analyzer_version: String,
    pub datetime: DateTime<Utc>,
    pub hostname: String,
    /// Invocation arguments as given
    pub arguments: Value,
}

impl Metadata {
    pub fn new(arguments: Value) -> Self {
        Self {
            analyzer: ANALYZER_NAME.to_string(),
            analyzer_version: ANALYZER_VERSION.to_string(),
            datetime: Utc::now(),
            hostname: hostname(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T: Serialize> {
    pub result: T,
    pub metadata: Metadata,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(result: T, arguments: Value) -> Self {
        Self {
            result,
            metadata: Metadata::new(arguments),
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Where a document goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(String),
    Remote(String),
}

impl Destination {
    pub fn parse(target: &str) -> Self {
        if target == "-" {
            Self::Stdout
        } else if target.starts_with("http://") || target.starts_with("https://") {
            Self::Remote(target.to_string())
        } else {
            Self::File(target.to_string())
        }
    }
}

/// Serialize `envelope` and deliver it to `target`
pub fn write_envelope<T: Serialize>(envelope: &Envelope<T>, target: &str, pretty: bool) -> Result<()> {
    let text = envelope.to_json(pretty)?;

    match Destination::parse(target) {
        Destination::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
            stdout.flush()?;
        }
        Destination::File(path) => {
            debug!("Writing output to {}", path);
            std::fs::write(Path::new(&path), format!("{}\n", text))?;
        }
        Destination::Remote(url) => submit(&url, text)?,
    }
    Ok(())
}

fn submit(url: &str, body: String) -> Result<()> {
    info!("Submitting results to {}", url);
    let client = Client::builder()
        .timeout(SUBMIT_TIMEOUT)
        .build()
        .map_err(|e| Error::IoError(format!("Failed to create HTTP client: {}", e)))?;

    let response = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .map_err(|e| Error::IoError(format!("Failed to submit results to {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::IoError(format!(
            "Submitting results to {} failed with HTTP {}",
            url, status
        )));
    }
    debug!("Results submitted, remote answered {}", status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse("-"), Destination::Stdout);
        assert_eq!(
            Destination::parse("https://example.com/results"),
            Destination::Remote("https://example.com/results".to_string())
        );
        assert_eq!(
            Destination::parse("out.json"),
            Destination::File("out.json".to_string())
        );
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = Envelope::new(json!({"tree": []}), json!({"requirements": ["six"]}));
        let value: Value = serde_json::from_str(&envelope.to_json(false).unwrap()).unwrap();
        assert_eq!(value["result"]["tree"], json!([]));
        assert_eq!(value["metadata"]["analyzer"], ANALYZER_NAME);
        assert_eq!(value["metadata"]["arguments"]["requirements"][0], "six");
        let datetime = value["metadata"]["datetime"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(datetime).is_ok());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let envelope = Envelope::new(json!({"errors": []}), Value::Null);
        write_envelope(&envelope, path.to_str().unwrap(), true).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"result\""));
        let value: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["result"]["errors"], json!([]));
    }

    #[test]
    fn test_submit_to_remote() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/results")
                .header("content-type", "application/json")
                .body_contains("\"analyzer\":\"pysolver\"");
            then.status(202);
        });

        let envelope = Envelope::new(json!({}), Value::Null);
        write_envelope(&envelope, &server.url("/results"), false).unwrap();
        mock.assert();
    }

    #[test]
    fn test_submit_failure_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/results");
            then.status(500);
        });

        let envelope = Envelope::new(json!({}), Value::Null);
        let err = write_envelope(&envelope, &server.url("/results"), false).unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
