//! Cache directory layout and helpers.
//!
//! The global cache holds one extracted copy of every package ever fetched,
//! shared across projects. Each install mirrors the packages it needs into
//! the project-local `deps/` directory.

use crate::FetchError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use walkdir::WalkDir;

pub const CACHE_DIR_ENV: &str = "POAC_CACHE_DIR";
pub const DEPS_DIR: &str = "deps";

/// The global cache root: `$POAC_CACHE_DIR`, defaulting to `~/.poac/cache`.
pub fn cache_dir() -> Result<PathBuf, FetchError> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(FetchError::HomeNotFound)?;
    Ok(home.join(".poac").join("cache"))
}

/// The project-local dependency directory.
pub fn deps_dir(project: &Path) -> PathBuf {
    project.join(DEPS_DIR)
}

/// Recursively copy a directory tree.
pub fn copy_recursively(from: &Path, to: &Path) -> Result<(), FetchError> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| FetchError::Filesystem {
            path: from.to_path_buf(),
            source: e.into(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .expect("walkdir yields children of its root");
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| FetchError::Filesystem {
                path: target.clone(),
                source: e,
            })?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| FetchError::Filesystem {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            fs::copy(entry.path(), &target).map_err(|e| FetchError::Filesystem {
                path: target.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Set of cache names currently being fetched. A worker that finds its key
/// already claimed waits for the owner to finish instead of re-fetching.
#[derive(Default)]
pub struct InFlight {
    keys: Mutex<HashSet<String>>,
    done: Condvar,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for fetching. Returns true when the caller owns the fetch;
    /// false after another worker completed it.
    pub fn claim(&self, key: &str) -> bool {
        let mut keys = self.keys.lock().unwrap();
        if keys.insert(key.to_string()) {
            return true;
        }
        while keys.contains(key) {
            keys = self.done.wait(keys).unwrap();
        }
        false
    }

    /// Release a claimed key, waking any waiters.
    pub fn release(&self, key: &str) {
        let mut keys = self.keys.lock().unwrap();
        keys.remove(key);
        self.done.notify_all();
    }
}
