//! Reproducibility lockfile (poac.lock).
//!
//! The lockfile records the activated dependency tree under the manifest
//! timestamp it was resolved against. A lock whose timestamp no longer
//! matches the manifest is stale and is ignored.

use crate::dependency::{Activated, Resolved};
use crate::name::Source;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const LOCKFILE_FILE: &str = "poac.lock";
const LOCKFILE_HEADER: &str = "# Please do not edit this file.";

/// Lockfile errors. A corrupt lock is reported so the caller can warn and
/// proceed as if no lock existed.
#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("failed to read poac.lock: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse poac.lock: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct LockDocument {
    timestamp: String,
    #[serde(default)]
    dependencies: BTreeMap<String, LockDep>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LockDep {
    version: Version,
    source: Source,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    dependencies: BTreeMap<String, LockDep>,
}

pub struct Lockfile;

impl Lockfile {
    /// Load the lock from `base`. Returns `Some` only when the file exists
    /// and its timestamp equals `expected_timestamp`; a stale or absent lock
    /// is `None`. A corrupt lock is an error so the caller can warn.
    pub fn load(base: &Path, expected_timestamp: &str) -> Result<Option<Resolved>, LockfileError> {
        let path = base.join(LOCKFILE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let document: LockDocument = serde_yaml::from_str(&content)?;
        if document.timestamp != expected_timestamp {
            return Ok(None);
        }

        let mut activated = Activated::default();
        for (name, dep) in &document.dependencies {
            let index = restore_node(&mut activated, name, dep);
            activated.roots.push(index);
        }
        let backtracked = activated.derive_backtracked();
        Ok(Some(Resolved {
            activated,
            backtracked,
        }))
    }

    /// Write the lock for `activated` under `timestamp`. Output is stable:
    /// child mappings are ordered by name ascending.
    pub fn write(
        base: &Path,
        timestamp: &str,
        activated: &Activated,
    ) -> Result<(), LockfileError> {
        let document = LockDocument {
            timestamp: timestamp.to_string(),
            dependencies: collect_deps(activated, &activated.roots),
        };
        let yaml = serde_yaml::to_string(&document)?;
        fs::write(
            base.join(LOCKFILE_FILE),
            format!("{LOCKFILE_HEADER}\n{yaml}"),
        )?;
        Ok(())
    }
}

fn restore_node(activated: &mut Activated, name: &str, dep: &LockDep) -> usize {
    let index = activated.push(name.to_string(), dep.version.clone(), dep.source);
    for (child_name, child) in &dep.dependencies {
        let child_index = restore_node(activated, child_name, child);
        activated.nodes[index].deps.push(child_index);
    }
    index
}

fn collect_deps(activated: &Activated, indices: &[usize]) -> BTreeMap<String, LockDep> {
    let mut map = BTreeMap::new();
    for &index in indices {
        let node = &activated.nodes[index];
        map.insert(
            node.name.clone(),
            LockDep {
                version: node.version.clone(),
                source: node.source,
                dependencies: collect_deps(activated, &node.deps),
            },
        );
    }
    map
}
