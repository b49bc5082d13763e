//! Fetching for poac: materializing resolved packages into the global cache
//! and mirroring them into the project's deps directory.

pub mod cache;
pub mod fetch;

use std::path::PathBuf;
use thiserror::Error;

pub use cache::{cache_dir, deps_dir, InFlight};
pub use fetch::{FetchOptions, FetchSummary, Fetcher};

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not locate the home directory")]
    HomeNotFound,

    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("corrupt archive {path}: {source}")]
    ArchiveCorrupt {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("fetch of {0} failed in another worker")]
    FailedElsewhere(String),

    #[error("git clone of {name} {version} failed")]
    GitCloneFailed {
        name: String,
        version: semver::Version,
    },

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
