//! Package model for poac: manifest (poac.toml) parsing, lockfile (poac.lock)
//! reading/writing, package naming rules, and version interval expressions.

pub mod dependency;
pub mod interval;
pub mod lockfile;
pub mod manifest;
pub mod name;

pub use dependency::{
    Activated, ActivatedNode, Backtracked, Constraint, DependencyError, Pinned, Resolved,
};
pub use interval::{Bound, Interval, IntervalError, Op};
pub use lockfile::{Lockfile, LockfileError};
pub use manifest::{Build, BuildSystem, Manifest, ManifestError, Package};
pub use name::{NameError, Source};
