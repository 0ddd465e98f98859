//! Source fetching.
//!
//! Every remote unit in the plan must be unpacked under the fetch root as
//! `<name>-<version>/` before it can build. Fetching goes through the
//! native tool's unpack command; directories that already exist are left
//! alone, so re-fetching an up-to-date tree issues no commands at all.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::debug;

use benv_core::{CommandSpec, Error, Fix, ProcessRunner, Result, Semaphore};
use benv_plan::CabalPlan;
use benv_ui::{Output, Progress};

/// Lifecycle expectation for the fetch directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirPolicy {
    /// The directory must not pre-exist; it is created.
    New,
    /// The directory must already exist.
    Existing,
}

/// Options for fetching sources.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Number of parallel unpack jobs
    pub jobs: Option<usize>,
    /// The native tool executable
    pub cabal: String,
    /// Whether to show verbose output
    pub verbose: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            cabal: "cabal".to_string(),
            verbose: false,
        }
    }
}

/// Result of a fetch operation.
#[derive(Debug, Default)]
pub struct FetchSummary {
    /// Number of packages unpacked
    pub fetched: usize,
    /// Number of packages already present
    pub skipped: usize,
}

/// Check the fetch directory against the requested lifecycle and return its
/// canonical path.
pub fn ensure_fetch_dir(path: &Path, policy: FetchDirPolicy) -> Result<PathBuf> {
    match policy {
        FetchDirPolicy::New => {
            if path.exists() {
                return Err(Error::FetchDirExists {
                    path: path.to_path_buf(),
                    fixes: vec![Fix::new("Pass --update to reuse an existing fetch directory")],
                });
            }
            std::fs::create_dir_all(path)
                .map_err(|e| Error::io_at("failed to create fetch directory", path, e))?;
        }
        FetchDirPolicy::Existing => {
            if !path.is_dir() {
                return Err(Error::FetchDirMissing {
                    path: path.to_path_buf(),
                    fixes: vec![Fix::with_command(
                        "Fetch the plan's sources first",
                        "benv fetch --new",
                    )],
                });
            }
        }
    }
    path.canonicalize()
        .map_err(|e| Error::io_at("failed to canonicalize fetch directory", path, e))
}

/// Unpack every remote unit of the plan under `fetch_dir`.
pub async fn fetch_plan(
    plan: &CabalPlan,
    fetch_dir: &Path,
    options: &FetchOptions,
    output: &Output,
) -> Result<FetchSummary> {
    // One unpack per distinct package version, however many components the
    // plan builds from it.
    let packages: BTreeSet<String> = plan
        .configured()
        .filter(|u| !u.src.is_local())
        .map(|u| u.name_ver())
        .collect();

    let mut summary = FetchSummary::default();
    let mut to_fetch = Vec::new();
    for name_ver in packages {
        if fetch_dir.join(&name_ver).is_dir() {
            debug!("Already fetched: {}", name_ver);
            summary.skipped += 1;
        } else {
            to_fetch.push(name_ver);
        }
    }

    if to_fetch.is_empty() {
        output.info("All sources already fetched");
        return Ok(summary);
    }

    let jobs = options.jobs.unwrap_or_else(num_cpus::get);
    let sem = Semaphore::bounded(jobs);
    let progress = if options.verbose {
        None
    } else {
        Some(Progress::new(to_fetch.len() as u64, "Fetching sources"))
    };

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    for name_ver in &to_fetch {
        let spec = CommandSpec::new(options.cabal.as_str())
            .arg("get")
            .arg(name_ver.as_str())
            .arg(format!("--destdir={}", fetch_dir.display()))
            .with_semaphore(sem.clone());
        tasks.spawn(async move {
            let runner = ProcessRunner::new();
            runner.run(&spec).await
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| Error::Other(e.into()))?;
        match result {
            Ok(()) => {
                summary.fetched += 1;
                if let Some(ref bar) = progress {
                    bar.inc(1);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => {
            if let Some(bar) = progress {
                bar.finish_clear();
            }
            output.error("failed to fetch sources");
            Err(e)
        }
        None => {
            if let Some(bar) = progress {
                bar.finish(format!(
                    "Fetched {} packages ({} already present)",
                    summary.fetched, summary.skipped
                ));
            }
            Ok(summary)
        }
    }
}
