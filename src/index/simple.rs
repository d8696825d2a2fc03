// src/index/simple.rs

//! Simple repository API client
//!
//! Fetches `{index}/{normalized-name}/` and understands both the JSON form
//! (PEP 691) and the classic HTML anchor listing (PEP 503). Versions are
//! taken from the `versions` key when the index provides it, otherwise they
//! are derived from artifact file names. Parsed pages are cached for the
//! lifetime of the client, so hash lookups after a release listing do not
//! hit the network again.

use super::{ArtifactHash, Release, ReleaseFetcher, ReleaseSet};
use crate::error::{Error, Result};
use crate::requirement::normalize_name;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a page fetch
const MAX_RETRIES: u32 = 3;

/// Base retry delay, multiplied by the attempt number
const RETRY_DELAY: Duration = Duration::from_millis(1000);

const ACCEPT: &str = "application/vnd.pypi.simple.v1+json, text/html;q=0.1";

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#)
        .expect("valid anchor regex")
});

static SHA256_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#sha256=([0-9A-Fa-f]{64})").expect("valid fragment regex"));

const SDIST_EXTENSIONS: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".zip"];

#[derive(Debug, Deserialize)]
struct JsonPage {
    #[serde(default)]
    files: Vec<JsonFile>,
    #[serde(default)]
    versions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct JsonFile {
    filename: String,
    #[serde(default)]
    hashes: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct IndexFile {
    filename: String,
    version: Option<String>,
    sha256: Option<String>,
}

#[derive(Debug, Default)]
struct IndexPage {
    files: Vec<IndexFile>,
    versions: Vec<String>,
}

/// HTTP client for one simple repository
pub struct SimpleIndex {
    url: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
    cache: Mutex<HashMap<String, Arc<IndexPage>>>,
}

impl SimpleIndex {
    /// Create a client for the index at `url`
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("pysolver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::IndexError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Override the base delay between retried fetches
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn page(&self, package_name: &str) -> Result<Arc<IndexPage>> {
        let name = normalize_name(package_name);
        if let Some(page) = self
            .cache
            .lock()
            .map_err(|_| Error::IndexError("index cache poisoned".to_string()))?
            .get(&name)
        {
            return Ok(Arc::clone(page));
        }

        let page = Arc::new(self.fetch_page(&name)?);
        self.cache
            .lock()
            .map_err(|_| Error::IndexError("index cache poisoned".to_string()))?
            .insert(name, Arc::clone(&page));
        Ok(page)
    }

    fn fetch_page(&self, name: &str) -> Result<IndexPage> {
        let page_url = format!("{}/{}/", self.url, name);
        debug!("Fetching index page {}", page_url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.client.get(&page_url).header("Accept", ACCEPT).send() {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    return Err(Error::NotFoundError(format!(
                        "{} is not provided by {}",
                        name, self.url
                    )));
                }
                Ok(response) if response.status().is_success() => {
                    let is_json = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|v| v.contains("json"));
                    let body = response.text().map_err(|e| {
                        Error::IndexError(format!("Failed to read {}: {}", page_url, e))
                    })?;
                    let page = if is_json {
                        parse_json_page(name, &body)?
                    } else {
                        parse_html_page(name, &body)
                    };
                    info!(
                        "Found {} versions of {} on {}",
                        page.versions.len(),
                        name,
                        self.url
                    );
                    return Ok(page);
                }
                Ok(response) if response.status().is_server_error() => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => {
                    return Err(Error::IndexError(format!(
                        "HTTP {} from {}",
                        response.status(),
                        page_url
                    )));
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.max_retries {
                return Err(Error::IndexError(format!(
                    "Failed to fetch {} after {} attempts: {}",
                    page_url, attempt, failure
                )));
            }
            warn!(
                "Index fetch attempt {} for {} failed: {}, retrying...",
                attempt, page_url, failure
            );
            std::thread::sleep(self.retry_delay * attempt);
        }
    }
}

impl ReleaseFetcher for SimpleIndex {
    fn index_url(&self) -> &str {
        &self.url
    }

    fn fetch_releases(&self, package_name: &str) -> Result<ReleaseSet> {
        let page = self.page(package_name)?;
        Ok(ReleaseSet {
            package_name: normalize_name(package_name),
            releases: page
                .versions
                .iter()
                .map(|version| Release {
                    version: version.clone(),
                    index_url: self.url.clone(),
                })
                .collect(),
        })
    }

    fn package_hashes(&self, package_name: &str, version: &str) -> Result<Vec<ArtifactHash>> {
        let page = self.page(package_name)?;
        let hashes: Vec<ArtifactHash> = page
            .files
            .iter()
            .filter(|f| f.version.as_deref() == Some(version))
            .filter_map(|f| {
                f.sha256.as_ref().map(|sha256| ArtifactHash {
                    name: f.filename.clone(),
                    sha256: sha256.to_lowercase(),
                })
            })
            .collect();

        if hashes.is_empty() && !page.versions.iter().any(|v| v == version) {
            return Err(Error::NotFoundError(format!(
                "{} {} is not provided by {}",
                package_name, version, self.url
            )));
        }
        Ok(hashes)
    }
}

fn parse_json_page(name: &str, body: &str) -> Result<IndexPage> {
    let page: JsonPage = serde_json::from_str(body)
        .map_err(|e| Error::IndexError(format!("Malformed index page for {}: {}", name, e)))?;

    let files: Vec<IndexFile> = page
        .files
        .into_iter()
        .map(|f| IndexFile {
            version: version_from_filename(name, &f.filename),
            sha256: f.hashes.get("sha256").cloned(),
            filename: f.filename,
        })
        .collect();

    let versions = match page.versions {
        Some(versions) => versions,
        None => versions_of(&files),
    };
    Ok(IndexPage { files, versions })
}

fn parse_html_page(name: &str, body: &str) -> IndexPage {
    let files: Vec<IndexFile> = ANCHOR
        .captures_iter(body)
        .filter_map(|caps| {
            let href = caps.get(1)?.as_str().replace("&amp;", "&");
            let text = caps.get(2)?.as_str().trim();
            let filename = if text.is_empty() {
                href.split('#')
                    .next()
                    .and_then(|path| path.rsplit('/').next())
                    .unwrap_or_default()
                    .to_string()
            } else {
                text.to_string()
            };
            let sha256 = SHA256_FRAGMENT
                .captures(&href)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            Some(IndexFile {
                version: version_from_filename(name, &filename),
                filename,
                sha256,
            })
        })
        .collect();

    let versions = versions_of(&files);
    IndexPage { files, versions }
}

/// Distinct versions in listing order
fn versions_of(files: &[IndexFile]) -> Vec<String> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter_map(|f| f.version.clone())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Extract the version from a wheel, egg or sdist file name
fn version_from_filename(name: &str, filename: &str) -> Option<String> {
    if filename.ends_with(".whl") || filename.ends_with(".egg") {
        return filename.split('-').nth(1).map(str::to_string);
    }

    let stem = SDIST_EXTENSIONS
        .iter()
        .find_map(|ext| filename.strip_suffix(ext))?;

    // The project part may itself contain dashes, so match it against the
    // normalized name instead of splitting at the first one.
    stem.match_indices('-')
        .map(|(idx, _)| idx)
        .find(|&idx| normalize_name(&stem[..idx]) == name)
        .map(|idx| stem[idx + 1..].to_string())
        .filter(|v| !v.is_empty())
}
