//! Candidate discovery against the poac registry and GitHub.

use poac_package::manifest::Manifest;
use poac_package::{Constraint, Source};
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::thread;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_REGISTRY: &str = "https://poac.pm/api";
const DEFAULT_GITHUB_API: &str = "https://api.github.com";
const DEFAULT_GITHUB_RAW: &str = "https://raw.githubusercontent.com";

pub const REGISTRY_ENV: &str = "POAC_REGISTRY_URL";
pub const TIMEOUT_ENV: &str = "POAC_TIMEOUT_SECS";

/// Transient failures are retried this many times before surfacing.
const RETRY_LIMIT: u32 = 3;

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("no such package: {name}")]
    NoSuchPackage { name: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Base URL of the package registry API.
pub fn registry_base() -> String {
    env::var(REGISTRY_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY.to_string())
}

/// Archive download URL for a registry package.
pub fn archive_url(name: &str, version: &Version) -> String {
    format!("{}/packages/{}/{}/download", registry_base(), name, version)
}

/// Clone URL for a github package (`owner/repo`).
pub fn github_clone_url(name: &str) -> String {
    format!("https://github.com/{name}.git")
}

/// Per-request deadline, default 30 s.
pub fn request_timeout() -> Duration {
    let secs = env::var(TIMEOUT_ENV)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

/// The resolver's view of a package source: which versions exist, and what a
/// given version depends on.
pub trait CandidateProvider {
    fn list_versions(&self, source: Source, name: &str) -> Result<Vec<Version>, ProviderError>;

    fn dependencies_of(
        &self,
        source: Source,
        name: &str,
        version: &Version,
    ) -> Result<Vec<Constraint>, ProviderError>;
}

/// HTTP-backed provider. One blocking client is shared across all requests.
pub struct HttpProvider {
    client: reqwest::blocking::Client,
    registry: String,
    github_api: String,
    github_raw: String,
}

#[derive(Deserialize)]
struct Tag {
    name: String,
}

impl HttpProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(request_timeout())
            .build()
            .map_err(|source| ProviderError::Transport {
                url: String::new(),
                source,
            })?;
        Ok(Self {
            client,
            registry: registry_base(),
            github_api: DEFAULT_GITHUB_API.to_string(),
            github_raw: DEFAULT_GITHUB_RAW.to_string(),
        })
    }

    /// GET with retries on connect errors, timeouts, and 5xx responses.
    /// Returns `Status { status: 404 }` for missing resources; the caller
    /// decides whether absence is fatal.
    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.is_server_error() && attempt < RETRY_LIMIT {
                        thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
                        continue;
                    }
                    return Err(ProviderError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Err(source) => {
                    if (source.is_connect() || source.is_timeout()) && attempt < RETRY_LIMIT {
                        thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
                        continue;
                    }
                    return Err(ProviderError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        self.get(url)?.json().map_err(|e| ProviderError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn is_not_found(error: &ProviderError) -> bool {
        matches!(error, ProviderError::Status { status: 404, .. })
    }

    fn constraints_from_table(
        url: &str,
        table: &BTreeMap<String, String>,
    ) -> Result<Vec<Constraint>, ProviderError> {
        table
            .iter()
            .map(|(name, interval)| {
                Constraint::parse_entry(name, interval).map_err(|e| ProviderError::Decode {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Whether `(name, version)` is already published on the registry.
    pub fn package_exists(&self, name: &str, version: &Version) -> Result<bool, ProviderError> {
        let url = format!("{}/packages/{}/{}/exists", self.registry, name, version);
        match self.get_json::<bool>(&url) {
            Ok(exists) => Ok(exists),
            Err(e) if Self::is_not_found(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Repository description from the GitHub API, `None` when unset.
    pub fn repo_description(&self, full_name: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/repos/{}", self.github_api, full_name);
        let value: serde_json::Value = self.get_json(&url)?;
        Ok(nonnull_string(&value["description"]))
    }

    /// License name of a repository at `version`, `None` when undetected.
    pub fn repo_license(
        &self,
        full_name: &str,
        version: &Version,
    ) -> Result<Option<String>, ProviderError> {
        let url = format!(
            "{}/repos/{}/license?ref={}",
            self.github_api, full_name, version
        );
        match self.get_json::<serde_json::Value>(&url) {
            Ok(value) => Ok(nonnull_string(&value["license"]["name"])),
            Err(e) if Self::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Tag name of the latest GitHub release, `None` when the repository has
    /// no releases. A tag that is not a SemVer version is an error.
    pub fn latest_release(&self, full_name: &str) -> Result<Option<Version>, ProviderError> {
        let url = format!("{}/repos/{}/releases/latest", self.github_api, full_name);
        let value = match self.get_json::<serde_json::Value>(&url) {
            Ok(value) => value,
            Err(e) if Self::is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        match value["tag_name"].as_str() {
            Some(tag) => Version::parse(tag)
                .map(Some)
                .map_err(|e| ProviderError::Decode {
                    url,
                    reason: format!("tag '{tag}' is not a SemVer version: {e}"),
                }),
            None => Ok(None),
        }
    }
}

impl CandidateProvider for HttpProvider {
    fn list_versions(&self, source: Source, name: &str) -> Result<Vec<Version>, ProviderError> {
        match source {
            Source::Registry => {
                let url = format!("{}/packages/{}/versions", self.registry, name);
                let raw: Vec<String> = match self.get_json(&url) {
                    Ok(raw) => raw,
                    Err(e) if Self::is_not_found(&e) => {
                        return Err(ProviderError::NoSuchPackage {
                            name: name.to_string(),
                        })
                    }
                    Err(e) => return Err(e),
                };
                raw.iter()
                    .map(|s| {
                        Version::parse(s).map_err(|e| ProviderError::Decode {
                            url: url.clone(),
                            reason: format!("version '{s}': {e}"),
                        })
                    })
                    .collect()
            }
            Source::GitHub => {
                let url = format!("{}/repos/{}/tags", self.github_api, name);
                let tags: Vec<Tag> = match self.get_json(&url) {
                    Ok(tags) => tags,
                    Err(e) if Self::is_not_found(&e) => {
                        return Err(ProviderError::NoSuchPackage {
                            name: name.to_string(),
                        })
                    }
                    Err(e) => return Err(e),
                };
                // Tags that are not SemVer versions are not candidates.
                Ok(tags
                    .iter()
                    .filter_map(|tag| Version::parse(&tag.name).ok())
                    .collect())
            }
        }
    }

    fn dependencies_of(
        &self,
        source: Source,
        name: &str,
        version: &Version,
    ) -> Result<Vec<Constraint>, ProviderError> {
        match source {
            Source::Registry => {
                let url = format!("{}/packages/{}/{}/deps", self.registry, name, version);
                match self.get_json::<BTreeMap<String, String>>(&url) {
                    Ok(table) => Self::constraints_from_table(&url, &table),
                    Err(e) if Self::is_not_found(&e) => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            }
            Source::GitHub => {
                let url = format!("{}/{}/{}/poac.toml", self.github_raw, name, version);
                let response = match self.get(&url) {
                    Ok(response) => response,
                    Err(e) if Self::is_not_found(&e) => return Ok(Vec::new()),
                    Err(e) => return Err(e),
                };
                let content = response.text().map_err(|e| ProviderError::Decode {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
                let manifest =
                    Manifest::from_str(&content).map_err(|e| ProviderError::Decode {
                        url: url.clone(),
                        reason: e.to_string(),
                    })?;
                Self::constraints_from_table(&url, &manifest.dependencies)
            }
        }
    }
}

fn nonnull_string(value: &serde_json::Value) -> Option<String> {
    match value.as_str() {
        Some("null") | None => None,
        Some(s) => Some(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_url_shape() {
        let url = archive_url("boost/optional", &Version::new(1, 66, 0));
        assert!(url.ends_with("/packages/boost/optional/1.66.0/download"));
    }

    #[test]
    fn test_github_clone_url() {
        assert_eq!(
            github_clone_url("foo/bar"),
            "https://github.com/foo/bar.git"
        );
    }

    #[test]
    fn test_nonnull_string() {
        assert_eq!(nonnull_string(&serde_json::json!("MIT")), Some("MIT".into()));
        assert_eq!(nonnull_string(&serde_json::json!("null")), None);
        assert_eq!(nonnull_string(&serde_json::Value::Null), None);
    }
}
