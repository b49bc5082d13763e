//! Publish package command (poac publish)
//!
//! Verifies the package metadata against git and the registry. The final
//! registration request is not wired up yet; verification runs end to end.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use poac_package::Manifest;
use poac_resolver::HttpProvider;
use semver::Version;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Arguments for the publish command
#[derive(Debug, Clone)]
pub struct PublishArgs {
    /// Verbose output
    pub verbose: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Project directory (defaults to current)
    pub project_dir: PathBuf,
}

impl Default for PublishArgs {
    fn default() -> Self {
        Self {
            verbose: false,
            yes: false,
            project_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageType {
    HeaderOnlyLib,
    BuildReqLib,
    Application,
}

impl PackageType {
    fn as_str(&self) -> &'static str {
        match self {
            PackageType::HeaderOnlyLib => "header-only library",
            PackageType::BuildReqLib => "build-required library",
            PackageType::Application => "application",
        }
    }
}

#[derive(Debug)]
struct PackageInfo {
    name: String,
    version: Version,
    description: Option<String>,
    cpp_version: u16,
    license: Option<String>,
    package_type: PackageType,
}

/// Run the publish command
pub fn run(args: PublishArgs) -> Result<()> {
    if args.verbose {
        println!("Reading manifest from {}", args.project_dir.display());
    }
    let manifest = Manifest::load(&args.project_dir)?
        .context("poac.toml does not exist; run `poac init` or `poac new $PROJNAME`")?;

    println!("Verifying your package ...\n");
    let provider = HttpProvider::new()?;
    let info = gather_package_info(&args.project_dir, &manifest, &provider)?;
    summarize(&info);

    if info.package_type == PackageType::Application {
        bail!("applications cannot be published currently");
    }
    if provider.package_exists(&info.name, &info.version)? {
        bail!("{}: {} already exists", info.name, info.version);
    }
    if !args.yes && !yes_or_no("Are you sure publish this package?")? {
        bail!("canceled by user");
    }

    // Registration with the registry is not implemented yet; the package is
    // verified and ready.
    println!("{} Done.", "✓".green());
    Ok(())
}

fn gather_package_info(
    project_dir: &Path,
    manifest: &Manifest,
    provider: &HttpProvider,
) -> Result<PackageInfo> {
    let full_name = remote_full_name(project_dir)?;
    let version = provider.latest_release(&full_name)?.context(
        "could not find the latest release\n\
         Please execute the following commands:\n  git tag 0.1.0\n  git push origin 0.1.0",
    )?;
    let description = provider.repo_description(&full_name)?;
    let license = provider.repo_license(&full_name, &version)?;

    Ok(PackageInfo {
        name: full_name,
        version,
        description,
        cpp_version: manifest.package.cpp,
        license,
        package_type: classify(manifest),
    })
}

fn classify(manifest: &Manifest) -> PackageType {
    match &manifest.build {
        Some(build) if !build.bin.is_empty() => PackageType::Application,
        Some(_) => PackageType::BuildReqLib,
        None => PackageType::HeaderOnlyLib,
    }
}

fn summarize(info: &PackageInfo) {
    println!("{}", "Summary:".bold());
    println!("{} {}", "  Name:".bold(), info.name);
    println!("{} {}", "  Version:".bold(), info.version);
    println!(
        "{} {}",
        "  Description:".bold(),
        clip_string(info.description.as_deref().unwrap_or("null"), 50)
    );
    println!(
        "{} {}",
        "  C++ Version (minimum required version):".bold(),
        info.cpp_version
    );
    println!(
        "{} {}",
        "  License:".bold(),
        info.license.as_deref().unwrap_or("null")
    );
    println!(
        "{} {}\n",
        "  Package Type:".bold(),
        info.package_type.as_str()
    );
}

/// The `owner/repo` this project pushes to.
fn remote_full_name(project_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(project_dir)
        .output()
        .context("failed to run git")?;
    if !output.status.success() {
        bail!(
            "could not find the origin url\n\
             Please execute the following command:\n\
             \x20 git remote add origin https://github.com/:owner/:repo.git"
        );
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    extract_full_name(&url)
}

fn extract_full_name(repository: &str) -> Result<String> {
    extract_str(repository, "https://github.com/", ".git")
        .or_else(|| extract_str(repository, "git@github.com:", ".git"))
        .context("invalid repository name")
}

fn extract_str(target: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = target.find(prefix)? + prefix.len();
    let end = target[start..]
        .find(suffix)
        .map(|i| start + i)
        .unwrap_or(target.len());
    Some(target[start..end].to_string())
}

fn clip_string(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let clipped: String = s.chars().take(limit).collect();
        format!("{clipped}...")
    }
}

fn yes_or_no(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/n] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
