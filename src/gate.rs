// src/gate.rs

//! Subgraph gate
//!
//! Before a transitive dependency is queued the resolver may ask an external
//! service whether that release still needs resolving. The service answers
//! over plain HTTP:
//!
//! ```text
//! GET {url}?package_name=..&package_version=..&index_url=..&solver_name=..
//!   200  resolve it
//!   208  already covered elsewhere, skip it
//! ```
//!
//! Anything else is retried with a fixed delay. Running out of attempts is
//! fatal for the whole run.

use crate::config::GateConfig;
use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Timeout for a single gate request
const GATE_TIMEOUT: Duration = Duration::from_secs(30);

pub trait SubgraphGate {
    /// Whether the subgraph rooted at this release should be resolved
    fn should_resolve(&self, package_name: &str, version: &str, index_url: &str) -> Result<bool>;
}

impl<T: SubgraphGate + ?Sized> SubgraphGate for Box<T> {
    fn should_resolve(&self, package_name: &str, version: &str, index_url: &str) -> Result<bool> {
        (**self).should_resolve(package_name, version, index_url)
    }
}

/// HTTP implementation of the gate protocol
pub struct HttpSubgraphGate {
    client: Client,
    url: Url,
    solver_name: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpSubgraphGate {
    pub fn new(config: &GateConfig) -> Result<Self> {
        let url = Url::parse(&config.url).map_err(|e| {
            Error::InvalidConfiguration(format!("invalid subgraph check URL {}: {}", config.url, e))
        })?;
        let solver_name = config
            .solver_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidConfiguration(
                    "solver name is required when the subgraph check is enabled".to_string(),
                )
            })?;
        let client = Client::builder()
            .timeout(GATE_TIMEOUT)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            solver_name,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    fn query_url(&self, package_name: &str, version: &str, index_url: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("package_name", package_name)
            .append_pair("package_version", version)
            .append_pair("index_url", index_url)
            .append_pair("solver_name", &self.solver_name);
        url
    }
}

impl SubgraphGate for HttpSubgraphGate {
    fn should_resolve(&self, package_name: &str, version: &str, index_url: &str) -> Result<bool> {
        let url = self.query_url(package_name, version, index_url);
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.client.get(url.clone()).send() {
                Ok(response) if response.status() == StatusCode::OK => {
                    debug!("Subgraph of {} {} should be resolved", package_name, version);
                    return Ok(true);
                }
                Ok(response) if response.status() == StatusCode::ALREADY_REPORTED => {
                    debug!(
                        "Subgraph of {} {} was already resolved, skipping",
                        package_name, version
                    );
                    return Ok(false);
                }
                Ok(response) => last_error = format!("unexpected status {}", response.status()),
                Err(e) => last_error = e.to_string(),
            }

            warn!(
                "Subgraph check attempt {}/{} for {} {} failed: {}",
                attempt, self.max_attempts, package_name, version, last_error
            );
            if attempt < self.max_attempts {
                std::thread::sleep(self.retry_delay);
            }
        }

        Err(Error::SubgraphGateExhausted {
            url: self.url.to_string(),
            package_name: package_name.to_string(),
            package_version: version.to_string(),
            attempts: self.max_attempts,
            last_error,
        })
    }
}
