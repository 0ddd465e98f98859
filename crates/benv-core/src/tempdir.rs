//! Scoped temporary directories.

use std::future::Future;
use std::path::PathBuf;
use tracing::info;

use crate::error::{Error, Result};

/// What to do with a temporary directory when its scope ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempDirPolicy {
    /// Remove the directory on every exit path.
    Delete,
    /// Leave the directory in place under the system temp root.
    Keep,
}

/// Create a fresh directory and run `body` with its path.
///
/// Under [`TempDirPolicy::Delete`] the directory is removed when `body`
/// returns, errors, or is cancelled. Under [`TempDirPolicy::Keep`] the
/// directory survives and its location is logged.
pub async fn with_temp_dir<F, Fut, T>(policy: TempDirPolicy, prefix: &str, body: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| Error::Io {
            message: "failed to create temporary directory".to_string(),
            path: None,
            source: e,
        })?;

    match policy {
        TempDirPolicy::Delete => {
            // `dir` is dropped (and removed) whenever this future completes
            // or is dropped mid-await.
            let path = dir.path().to_path_buf();
            body(path).await
        }
        TempDirPolicy::Keep => {
            let path = dir.keep();
            info!("Temporary directory retained at {}", path.display());
            body(path).await
        }
    }
}
