//! Parallel package fetching.
//!
//! Each backtracked entry is materialized independently: skip when already
//! under `deps/`, copy from the global cache when cached, otherwise download
//! (registry) or shallow-clone (github) into the cache first. Archives are
//! extracted into a temporary sibling directory and renamed on success, so a
//! partially extracted tree is never visible at the cache path.

use crate::cache::{self, InFlight};
use crate::FetchError;
use colored::Colorize;
use poac_package::{name, Backtracked, Pinned, Source};
use poac_resolver::provider;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

const RETRY_LIMIT: u32 = 3;
const MAX_WORKERS: usize = 8;

/// Fetch options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub quiet: bool,
    pub verbose: bool,
}

/// What happened to each package.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub fetched: usize,
    pub copied: usize,
    pub already_installed: usize,
    pub failed: Vec<(String, FetchError)>,
}

impl FetchSummary {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    AlreadyInstalled,
    CopiedFromCache,
    Fetched,
}

/// Materializes backtracked packages into the cache and `deps/`.
pub struct Fetcher {
    client: reqwest::blocking::Client,
    cache_dir: PathBuf,
    deps_dir: PathBuf,
    in_flight: InFlight,
}

impl Fetcher {
    pub fn new(cache_dir: PathBuf, deps_dir: PathBuf) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(provider::request_timeout())
            .build()
            .map_err(|source| FetchError::Download {
                url: String::new(),
                source,
            })?;
        Ok(Self {
            client,
            cache_dir,
            deps_dir,
            in_flight: InFlight::new(),
        })
    }

    /// Fetch every entry of `backtracked`, in parallel. A failed package does
    /// not abort the others; failures are collected in the summary.
    pub fn fetch_all(
        &self,
        backtracked: &Backtracked,
        options: &FetchOptions,
    ) -> Result<FetchSummary, FetchError> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::create_dir_all(&self.deps_dir)?;

        let queue: Mutex<VecDeque<(&String, &Pinned)>> = Mutex::new(backtracked.iter().collect());
        let summary = Mutex::new(FetchSummary::default());

        let workers = worker_count(backtracked.len());
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let task = queue.lock().unwrap().pop_front();
                    let Some((package, pinned)) = task else {
                        break;
                    };
                    self.run_task(package, pinned, options, &summary);
                });
            }
        });

        let summary = summary.into_inner().unwrap();
        if !options.quiet
            && !backtracked.is_empty()
            && summary.already_installed == backtracked.len()
        {
            println!("{} Already installed", "warning:".yellow().bold());
        }
        Ok(summary)
    }

    fn run_task(
        &self,
        package: &str,
        pinned: &Pinned,
        options: &FetchOptions,
        summary: &Mutex<FetchSummary>,
    ) {
        if options.verbose {
            let cache_name = name::to_cache_name(pinned.source, package, &pinned.version);
            let cached = self.cache_dir.join(&cache_name).exists();
            println!(
                "{package} {} (source: {}, cache: {cache_name}, cached: {cached})",
                pinned.version, pinned.source
            );
        }
        match self.fetch_one(package, pinned) {
            Ok(Outcome::AlreadyInstalled) => {
                summary.lock().unwrap().already_installed += 1;
            }
            Ok(outcome) => {
                if !options.quiet {
                    echo_status(true, package, pinned);
                }
                let mut summary = summary.lock().unwrap();
                match outcome {
                    Outcome::CopiedFromCache => summary.copied += 1,
                    Outcome::Fetched => summary.fetched += 1,
                    Outcome::AlreadyInstalled => unreachable!(),
                }
            }
            Err(error) => {
                if !options.quiet {
                    echo_status(false, package, pinned);
                }
                summary.lock().unwrap().failed.push((package.to_string(), error));
            }
        }
    }

    fn fetch_one(&self, package: &str, pinned: &Pinned) -> Result<Outcome, FetchError> {
        let cache_name = name::to_cache_name(pinned.source, package, &pinned.version);
        let current_name = name::to_current_name(pinned.source, package, &pinned.version);

        let current_path = self.deps_dir.join(&current_name);
        if current_path.exists() {
            return Ok(Outcome::AlreadyInstalled);
        }

        let cache_path = self.cache_dir.join(&cache_name);
        let owned = self.in_flight.claim(&cache_name);
        let result = if cache_path.exists() {
            Ok(Outcome::CopiedFromCache)
        } else if owned {
            self.materialize(package, pinned, &cache_name)
                .map(|()| Outcome::Fetched)
        } else {
            Err(FetchError::FailedElsewhere(cache_name.clone()))
        };
        if owned {
            self.in_flight.release(&cache_name);
        }
        let outcome = result?;

        cache::copy_recursively(&cache_path, &current_path)?;
        Ok(outcome)
    }

    /// Produce `{cache}/{cache_name}` from the network, via a temporary
    /// sibling directory renamed into place on success.
    fn materialize(
        &self,
        package: &str,
        pinned: &Pinned,
        cache_name: &str,
    ) -> Result<(), FetchError> {
        let tmp = self.cache_dir.join(format!(".{cache_name}.part"));
        if tmp.exists() {
            fs::remove_dir_all(&tmp)?;
        }

        match pinned.source {
            Source::Registry => {
                let url = provider::archive_url(package, &pinned.version);
                let archive = self.cache_dir.join(format!("{cache_name}.tar.gz"));
                self.download(&url, &archive)?;
                extract_stripped(&archive, &tmp)?;
                fs::remove_file(&archive)?;
            }
            Source::GitHub => {
                let status = Command::new("git")
                    .args(["clone", "--depth", "1", "--branch"])
                    .arg(pinned.version.to_string())
                    .arg(provider::github_clone_url(package))
                    .arg(&tmp)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()?;
                if !status.success() {
                    let _ = fs::remove_dir_all(&tmp);
                    return Err(FetchError::GitCloneFailed {
                        name: package.to_string(),
                        version: pinned.version.clone(),
                    });
                }
            }
        }

        fs::rename(&tmp, self.cache_dir.join(cache_name))?;
        Ok(())
    }

    /// Stream a GET into `dest`, retrying transient failures.
    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(mut response) => {
                    let status = response.status();
                    if status.is_success() {
                        let mut file = File::create(dest)?;
                        response
                            .copy_to(&mut file)
                            .map_err(|source| FetchError::Download {
                                url: url.to_string(),
                                source,
                            })?;
                        return Ok(());
                    }
                    if status.is_server_error() && attempt < RETRY_LIMIT {
                        thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
                        continue;
                    }
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Err(source) => {
                    if (source.is_connect() || source.is_timeout()) && attempt < RETRY_LIMIT {
                        thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
                        continue;
                    }
                    return Err(FetchError::Download {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

fn echo_status(ok: bool, package: &str, pinned: &Pinned) {
    let mark = if ok { "✓".green() } else { "✗".red() };
    println!(
        "  {mark} {package} {} (from: {})",
        pinned.version, pinned.source
    );
}

fn worker_count(tasks: usize) -> usize {
    let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    MAX_WORKERS.min(parallelism).min(tasks).max(1)
}

/// Extract a gzipped tar into `dest`, dropping the archive's single
/// top-level directory component.
fn extract_stripped(archive: &Path, dest: &Path) -> Result<(), FetchError> {
    let corrupt = |source: std::io::Error| FetchError::ArchiveCorrupt {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    fs::create_dir_all(dest)?;
    for entry in tar.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(stripped);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(corrupt)?;
    }
    Ok(())
}
