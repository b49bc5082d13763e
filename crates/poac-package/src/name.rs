//! Package naming rules and source registries.
//!
//! A qualified name is `[<source>/]<path>` where the source prefix is one of
//! `poac` or `github`. Names without a prefix belong to the poac registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Naming errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("unknown source '{0}' (expected 'poac' or 'github')")]
    UnknownSource(String),

    #[error("invalid package name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Origin system a package is retrieved from.
///
/// `Registry` sorts before `GitHub` so that the registry wins ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "poac")]
    Registry,
    #[serde(rename = "github")]
    GitHub,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Registry => "poac",
            Source::GitHub => "github",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names Windows refuses as path components.
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Split a qualified name into its source and bare name.
///
/// A source prefix may only be written explicitly on names with three or more
/// `/`-segments; a two-segment name like `boost/optional` is an owner/repo
/// name on the poac registry.
pub fn split(qualified: &str) -> Result<(Source, String), NameError> {
    let segments: Vec<&str> = qualified.split('/').collect();
    match segments.first() {
        Some(&"poac") if segments.len() >= 3 => Ok((Source::Registry, segments[1..].join("/"))),
        Some(&"github") if segments.len() >= 3 => Ok((Source::GitHub, segments[1..].join("/"))),
        _ if segments.len() >= 3 => Err(NameError::UnknownSource(segments[0].to_string())),
        _ => Ok((Source::Registry, qualified.to_string())),
    }
}

/// Validate a bare (source-stripped) package name.
pub fn validate(source: Source, name: &str) -> Result<(), NameError> {
    let invalid = |reason: &str| NameError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.starts_with(['/', '-', '_']) || name.ends_with(['/', '-', '_']) {
        return Err(invalid("leading or trailing separator"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '/')))
    {
        return Err(invalid(&format!("character '{c}' is not allowed")));
    }
    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if RESERVED_NAMES.contains(&segment) {
            return Err(invalid(&format!("'{segment}' is reserved by the filesystem")));
        }
    }
    if source == Source::GitHub && name.matches('/').count() != 1 {
        return Err(invalid("github packages must be named owner/repo"));
    }
    Ok(())
}

/// Directory name of a package under the global cache.
pub fn to_cache_name(source: Source, name: &str, version: &semver::Version) -> String {
    format!("{}-{}-{}", source, name.replace('/', "-"), version)
}

/// Directory name of a package under the project's deps directory.
pub fn to_current_name(source: Source, name: &str, version: &semver::Version) -> String {
    format!("{}-{}-{}", source, name.replace('/', "-"), version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_split_unprefixed() {
        assert_eq!(
            split("boost/optional").unwrap(),
            (Source::Registry, "boost/optional".to_string())
        );
        assert_eq!(split("fmt").unwrap(), (Source::Registry, "fmt".to_string()));
    }

    #[test]
    fn test_split_explicit_sources() {
        assert_eq!(
            split("poac/boost/optional").unwrap(),
            (Source::Registry, "boost/optional".to_string())
        );
        assert_eq!(
            split("github/foo/bar").unwrap(),
            (Source::GitHub, "foo/bar".to_string())
        );
    }

    #[test]
    fn test_split_two_segment_source_lookalikes() {
        // A two-segment name is always an owner/repo name on the registry,
        // even when the owner is named after a source.
        assert_eq!(
            split("github/optional").unwrap(),
            (Source::Registry, "github/optional".to_string())
        );
        assert_eq!(
            split("poac/optional").unwrap(),
            (Source::Registry, "poac/optional".to_string())
        );
    }

    #[test]
    fn test_split_unknown_source() {
        assert_eq!(
            split("bitbucket/foo/bar").unwrap_err(),
            NameError::UnknownSource("bitbucket".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(validate(Source::Registry, "").is_err());
        assert!(validate(Source::Registry, "/boost").is_err());
        assert!(validate(Source::Registry, "boost-").is_err());
        assert!(validate(Source::Registry, "Boost").is_err());
        assert!(validate(Source::Registry, "boost optional").is_err());
        assert!(validate(Source::Registry, "boost//optional").is_err());
        assert!(validate(Source::Registry, "nul").is_err());
        assert!(validate(Source::Registry, "boost/con").is_err());
    }

    #[test]
    fn test_validate_github_owner_repo() {
        assert!(validate(Source::GitHub, "foo/bar").is_ok());
        assert!(validate(Source::GitHub, "foo").is_err());
        assert!(validate(Source::GitHub, "foo/bar/baz").is_err());
    }

    #[test]
    fn test_cache_and_current_names() {
        let v = Version::new(1, 66, 0);
        assert_eq!(
            to_cache_name(Source::Registry, "boost/optional", &v),
            "poac-boost-optional-1.66.0"
        );
        assert_eq!(
            to_current_name(Source::GitHub, "foo/bar", &Version::new(0, 1, 1)),
            "github-foo-bar-0.1.1"
        );
        // A registry package owned by `github` stays under the poac- prefix.
        assert_eq!(
            to_cache_name(Source::Registry, "github/optional", &v),
            "poac-github-optional-1.66.0"
        );
    }
}
