//! Backtracking constraint solver over the candidate graph.

use crate::provider::{CandidateProvider, ProviderError};
use poac_package::{Activated, Backtracked, Constraint, Interval, Pinned, Resolved, Source};
use semver::Version;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no versions found for package '{name}'")]
    NoCandidates { name: String },

    #[error("no version of '{name}' satisfies '{interval}'")]
    IntervalUnsatisfiable { name: String, interval: Interval },

    #[error("version conflict for '{name}': {existing} is selected, but '{incoming}' is also required")]
    Conflict {
        name: String,
        existing: Version,
        incoming: Interval,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("resolver: {0}")]
    Internal(String),
}

impl ResolveError {
    /// Whether a deeper choice can be revisited to get past this error.
    fn is_backtrackable(&self) -> bool {
        matches!(
            self,
            ResolveError::NoCandidates { .. }
                | ResolveError::IntervalUnsatisfiable { .. }
                | ResolveError::Conflict { .. }
        )
    }
}

/// Backtracking dependency resolver. Candidate lists and per-version
/// dependency sets are cached so backtracking never repeats a query.
pub struct Resolver<'a, P: CandidateProvider> {
    provider: &'a P,
    candidates: BTreeMap<(Source, String), Vec<Version>>,
    dependencies: BTreeMap<(Source, String, Version), Vec<Constraint>>,
}

impl<'a, P: CandidateProvider> Resolver<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            candidates: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Resolve the root constraints into a consistent assignment, producing
    /// both the activated tree and the flat backtracked map.
    pub fn resolve(&mut self, roots: &[Constraint]) -> Result<Resolved, ResolveError> {
        let mut expanded = Vec::with_capacity(roots.len());
        for constraint in roots {
            expanded.push(self.expand_latest(constraint)?);
        }

        let queue: VecDeque<Constraint> = expanded.iter().cloned().collect();
        let backtracked = self.solve(queue, Backtracked::new())?;
        let activated = self.activate(&expanded, &backtracked)?;
        Ok(Resolved {
            activated,
            backtracked,
        })
    }

    /// Replace a `latest` interval with the provider's newest candidate
    /// before solving starts.
    fn expand_latest(&mut self, constraint: &Constraint) -> Result<Constraint, ResolveError> {
        if constraint.interval != Interval::Latest {
            return Ok(constraint.clone());
        }
        let newest = self
            .candidates(constraint.source, &constraint.name)?
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NoCandidates {
                name: constraint.name.clone(),
            })?;
        Ok(Constraint {
            name: constraint.name.clone(),
            source: constraint.source,
            interval: Interval::Exact(newest),
        })
    }

    /// Work the constraint queue. Each unassigned package opens a decision:
    /// candidates are tried newest-first, and a dead end resumes at the most
    /// recent decision with the next-newest candidate.
    fn solve(
        &mut self,
        mut queue: VecDeque<Constraint>,
        assignment: Backtracked,
    ) -> Result<Backtracked, ResolveError> {
        loop {
            let Some(constraint) = queue.pop_front() else {
                return Ok(assignment);
            };

            // An assigned name keeps the source it was first reached with;
            // root declaration order decides which request that is, and a
            // later request (from either source) only has to accept the
            // pinned version. A version it cannot accept is a conflict.
            if let Some(pinned) = assignment.get(&constraint.name) {
                if constraint.interval.contains(&pinned.version) {
                    continue;
                }
                return Err(ResolveError::Conflict {
                    name: constraint.name,
                    existing: pinned.version.clone(),
                    incoming: constraint.interval,
                });
            }

            let all = self.candidates(constraint.source, &constraint.name)?;
            if all.is_empty() {
                return Err(ResolveError::NoCandidates {
                    name: constraint.name,
                });
            }
            let matching: Vec<Version> = all
                .into_iter()
                .filter(|v| constraint.interval.contains(v))
                .collect();
            if matching.is_empty() {
                return Err(ResolveError::IntervalUnsatisfiable {
                    name: constraint.name,
                    interval: constraint.interval,
                });
            }

            let mut last_error = None;
            for candidate in matching {
                let deps =
                    self.dependencies(constraint.source, &constraint.name, &candidate)?;

                let mut next_queue = queue.clone();
                next_queue.extend(deps);
                let mut next_assignment = assignment.clone();
                next_assignment.insert(
                    constraint.name.clone(),
                    Pinned {
                        version: candidate,
                        source: constraint.source,
                    },
                );

                match self.solve(next_queue, next_assignment) {
                    Ok(done) => return Ok(done),
                    Err(e) if e.is_backtrackable() => last_error = Some(e),
                    Err(e) => return Err(e),
                }
            }
            return Err(last_error.unwrap_or(ResolveError::IntervalUnsatisfiable {
                name: constraint.name,
                interval: constraint.interval,
            }));
        }
    }

    /// Rebuild the activated tree from the winning assignment: one node per
    /// (parent, child) edge, roots first. A package already on its own
    /// ancestor path is recorded without re-expansion.
    fn activate(
        &mut self,
        roots: &[Constraint],
        assignment: &Backtracked,
    ) -> Result<Activated, ResolveError> {
        let mut activated = Activated::default();
        let mut path = Vec::new();
        for constraint in roots {
            let index = self.activate_node(&mut activated, &constraint.name, assignment, &mut path)?;
            activated.roots.push(index);
        }
        Ok(activated)
    }

    fn activate_node(
        &mut self,
        activated: &mut Activated,
        name: &str,
        assignment: &Backtracked,
        path: &mut Vec<String>,
    ) -> Result<usize, ResolveError> {
        let pinned = assignment.get(name).ok_or_else(|| {
            ResolveError::Internal(format!("'{name}' is activated but not backtracked"))
        })?;
        let index = activated.push(name.to_string(), pinned.version.clone(), pinned.source);
        if path.iter().any(|p| p == name) {
            return Ok(index);
        }

        path.push(name.to_string());
        let deps = self.dependencies(pinned.source, name, &pinned.version)?;
        for dep in deps {
            let child = self.activate_node(activated, &dep.name, assignment, path)?;
            activated.nodes[index].deps.push(child);
        }
        path.pop();
        Ok(index)
    }

    /// Candidate versions, newest first by SemVer precedence.
    fn candidates(&mut self, source: Source, name: &str) -> Result<Vec<Version>, ResolveError> {
        let key = (source, name.to_string());
        if let Some(cached) = self.candidates.get(&key) {
            return Ok(cached.clone());
        }
        let mut versions = self.provider.list_versions(source, name)?;
        versions.sort_by(|a, b| b.cmp_precedence(a));
        versions.dedup();
        self.candidates.insert(key, versions.clone());
        Ok(versions)
    }

    fn dependencies(
        &mut self,
        source: Source,
        name: &str,
        version: &Version,
    ) -> Result<Vec<Constraint>, ResolveError> {
        let key = (source, name.to_string(), version.clone());
        if let Some(cached) = self.dependencies.get(&key) {
            return Ok(cached.clone());
        }
        let deps = self.provider.dependencies_of(source, name, version)?;
        self.dependencies.insert(key, deps.clone());
        Ok(deps)
    }
}
