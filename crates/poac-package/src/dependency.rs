//! Dependency constraints and the resolved dependency graph.

use crate::interval::{Interval, IntervalError};
use crate::name::{self, NameError, Source};
use semver::Version;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Interval(#[from] IntervalError),
}

/// A single dependency requirement: a package drawn from one source,
/// constrained to an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub name: String,
    pub source: Source,
    pub interval: Interval,
}

impl Constraint {
    /// Build a constraint from a manifest entry (`qualified name = interval`).
    pub fn parse_entry(qualified: &str, interval: &str) -> Result<Self, DependencyError> {
        let (source, bare) = name::split(qualified)?;
        name::validate(source, &bare)?;
        Ok(Constraint {
            name: bare,
            source,
            interval: Interval::parse(interval)?,
        })
    }

    /// The name this constraint is written under in a manifest.
    pub fn qualified_name(&self) -> String {
        match self.source {
            Source::Registry => self.name.clone(),
            Source::GitHub => format!("github/{}", self.name),
        }
    }
}

/// One (parent, child) edge in the activated dependency tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedNode {
    pub name: String,
    pub version: Version,
    pub source: Source,
    /// Indices of child nodes in the owning arena.
    pub deps: Vec<usize>,
}

/// The full dependency tree, stored as a flat arena. `roots` index the
/// project's direct dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activated {
    pub nodes: Vec<ActivatedNode>,
    pub roots: Vec<usize>,
}

impl Activated {
    pub fn push(&mut self, name: String, version: Version, source: Source) -> usize {
        let index = self.nodes.len();
        self.nodes.push(ActivatedNode {
            name,
            version,
            source,
            deps: Vec::new(),
        });
        index
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Derive the flat name -> (version, source) view of this tree.
    pub fn derive_backtracked(&self) -> Backtracked {
        self.nodes
            .iter()
            .map(|node| {
                (
                    node.name.clone(),
                    Pinned {
                        version: node.version.clone(),
                        source: node.source,
                    },
                )
            })
            .collect()
    }
}

/// A concrete choice for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pinned {
    pub version: Version,
    pub source: Source,
}

/// The flat, deduplicated assignment the fetcher consumes. Each name maps to
/// exactly one version and source.
pub type Backtracked = BTreeMap<String, Pinned>;

/// Output of dependency resolution: the activated tree plus the winning flat
/// assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub activated: Activated,
    pub backtracked: Backtracked,
}
