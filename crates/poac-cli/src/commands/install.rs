//! Install dependencies command (poac install)

use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use poac_fetch::{cache, FetchOptions, Fetcher};
use poac_package::{Constraint, Interval, Lockfile, Manifest, Resolved};
use poac_resolver::{HttpProvider, Resolver};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the install command
#[derive(Debug, Clone)]
pub struct InstallArgs {
    /// Extra packages from the command line (empty = manifest only)
    pub packages: Vec<String>,
    /// Errors only
    pub quiet: bool,
    /// Per-package fetch detail
    pub verbose: bool,
    /// Project directory (defaults to current)
    pub project_dir: PathBuf,
}

impl Default for InstallArgs {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            quiet: false,
            verbose: false,
            project_dir: PathBuf::from("."),
        }
    }
}

/// A root dependency paired with the manifest key it is written under.
struct RootDep {
    key: String,
    constraint: Constraint,
}

/// Run the install command
pub fn run(args: InstallArgs) -> Result<()> {
    let project_dir = &args.project_dir;
    let quiet = args.quiet;
    let verbose = args.verbose && !args.quiet;

    let cache_dir = cache::cache_dir()?;
    fs::create_dir_all(&cache_dir).context("failed to create the cache directory")?;

    let mut manifest = Manifest::load(project_dir)?
        .context("poac.toml does not exist; run `poac init` or `poac new $PROJNAME`")?;
    let mut timestamp = Manifest::timestamp(project_dir)?;

    // The lockfile is only consulted when no packages were passed on the
    // command line.
    let mut resolved = Resolved::default();
    let mut load_lock = false;
    if args.packages.is_empty() {
        match Lockfile::load(project_dir, &timestamp) {
            Ok(Some(locked)) => {
                resolved = locked;
                load_lock = true;
            }
            Ok(None) => {}
            Err(e) => eprintln!(
                "{} ignoring corrupt poac.lock: {e}",
                "warning:".yellow().bold()
            ),
        }
    }

    // Root constraints: command-line packages plus the manifest table.
    let mut roots: Vec<RootDep> = Vec::new();
    for arg in &args.packages {
        let constraint = parse_arg_package(arg)?;
        roots.push(RootDep {
            key: constraint.qualified_name(),
            constraint,
        });
    }
    if !load_lock {
        for (key, interval) in &manifest.dependencies {
            let constraint = Constraint::parse_entry(key, interval)
                .with_context(|| format!("invalid dependency '{key}'"))?;
            roots.push(RootDep {
                key: key.clone(),
                constraint,
            });
        }
        if roots.is_empty() {
            bail!(
                "no dependencies are declared in poac.toml\n\
                 Please refer to https://doc.poac.pm"
            );
        }
    }

    if !load_lock {
        let spinner = if !quiet {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            pb.enable_steady_tick(Duration::from_millis(80));
            pb.set_message("Resolving dependencies...");
            Some(pb)
        } else {
            None
        };

        let provider = HttpProvider::new()?;
        let mut resolver = Resolver::new(&provider);
        let constraints: Vec<Constraint> =
            roots.iter().map(|r| r.constraint.clone()).collect();
        let result = resolver.resolve(&constraints);

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        resolved = result.context("failed to resolve dependencies")?;
    }

    if !quiet {
        println!("{} Fetching...", "status:".green().bold());
    }
    let fetcher = Fetcher::new(cache_dir, cache::deps_dir(project_dir))?;
    let summary = fetcher.fetch_all(&resolved.backtracked, &FetchOptions { quiet, verbose })?;
    if !summary.is_ok() {
        for (package, error) in &summary.failed {
            eprintln!("{} {package}: {error}", "error:".red().bold());
        }
        bail!("failed to fetch {} package(s)", summary.failed.len());
    }

    // Rewrite poac.toml when a `latest` dependency was pinned or packages
    // were added from the command line.
    let mut fix_manifest = false;
    for root in &roots {
        if root.constraint.interval == Interval::Latest {
            let pinned = resolved
                .backtracked
                .get(&root.constraint.name)
                .with_context(|| {
                    format!(
                        "install: resolved package '{}' is missing from the backtracked map",
                        root.constraint.name
                    )
                })?;
            manifest
                .dependencies
                .insert(root.key.clone(), Interval::pin(&pinned.version).to_string());
            fix_manifest = true;
        }
    }
    if !args.packages.is_empty() {
        fix_manifest = true;
        for root in roots.iter().take(args.packages.len()) {
            if root.constraint.interval != Interval::Latest {
                manifest
                    .dependencies
                    .insert(root.key.clone(), root.constraint.interval.to_string());
            }
        }
    }
    if fix_manifest {
        manifest.store(project_dir)?;
        timestamp = Manifest::timestamp(project_dir)?;
    }

    if !load_lock {
        Lockfile::write(project_dir, &timestamp, &resolved.activated)?;
    }

    if !quiet {
        println!("{} Done.", "✓".green());
    }
    Ok(())
}

/// Parse a command-line package: `name` installs the newest version,
/// `name=INTERVAL` installs within the interval.
fn parse_arg_package(arg: &str) -> Result<Constraint> {
    let constraint = match arg.split_once('=') {
        Some((name, interval)) => Constraint::parse_entry(name, interval),
        None => Constraint::parse_entry(arg, "latest"),
    };
    constraint.with_context(|| format!("invalid package argument '{arg}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poac_package::Source;
    use semver::Version;

    #[test]
    fn test_parse_arg_bare_name_is_latest() {
        let c = parse_arg_package("boost/optional").unwrap();
        assert_eq!(c.name, "boost/optional");
        assert_eq!(c.source, Source::Registry);
        assert_eq!(c.interval, Interval::Latest);
    }

    #[test]
    fn test_parse_arg_with_interval() {
        let c = parse_arg_package("boost/optional==1.66.0").unwrap();
        assert_eq!(c.interval, Interval::Exact(Version::new(1, 66, 0)));

        let c = parse_arg_package("github/foo/bar=>=0.1.0 and <0.2.0").unwrap();
        assert_eq!(c.source, Source::GitHub);
        assert_eq!(c.name, "foo/bar");
        assert_eq!(c.interval.to_string(), ">=0.1.0 and <0.2.0");
    }

    #[test]
    fn test_parse_arg_rejects_invalid() {
        assert!(parse_arg_package("Boost").is_err());
        assert!(parse_arg_package("boost/optional=banana").is_err());
        assert!(parse_arg_package("bitbucket/foo/bar").is_err());
    }
}
