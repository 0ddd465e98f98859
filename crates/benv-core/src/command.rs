//! Command execution utilities.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

use crate::env::EnvVars;
use crate::error::{Error, Fix, Result};
use crate::sem::Semaphore;

/// `PATH` entry separator for the target OS.
#[cfg(windows)]
pub const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
pub const PATH_SEPARATOR: &str = ":";

/// A fully-described external command invocation.
///
/// Carries everything needed to reproduce the invocation: program,
/// arguments, working directory, `PATH` prepends, environment overlays, and
/// the semaphore the run is throttled by.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to execute
    pub prog: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Working directory for the child
    pub cwd: Option<PathBuf>,
    /// Directories prepended to the child's `PATH`
    pub extra_path: Vec<PathBuf>,
    /// Environment variables overlaid onto the inherited environment
    pub extra_env: Vec<(String, String)>,
    /// Concurrency token the run executes under
    pub sem: Semaphore,
}

impl CommandSpec {
    /// Create a command with no arguments.
    pub fn new(prog: impl Into<String>) -> Self {
        Self {
            prog: prog.into(),
            args: Vec::new(),
            cwd: None,
            extra_path: Vec::new(),
            extra_env: Vec::new(),
            sem: Semaphore::none(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Prepend a directory to the child's `PATH`.
    pub fn prepend_path(mut self, dir: impl AsRef<Path>) -> Self {
        self.extra_path.push(dir.as_ref().to_path_buf());
        self
    }

    /// Overlay an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }

    /// Run under the given semaphore.
    pub fn with_semaphore(mut self, sem: Semaphore) -> Self {
        self.sem = sem;
        self
    }

    /// The `PATH` value the child should see, or `None` when nothing is
    /// prepended.
    pub fn effective_path(&self) -> Option<String> {
        if self.extra_path.is_empty() {
            return None;
        }
        let mut entries: Vec<String> = self
            .extra_path
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if let Ok(current) = std::env::var(EnvVars::PATH) {
            entries.push(current);
        }
        Some(entries.join(PATH_SEPARATOR))
    }

    /// Render the invocation for logging and diagnostics.
    pub fn display(&self) -> String {
        let mut out = self.prog.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                out.push('\'');
                out.push_str(arg);
                out.push('\'');
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

/// Spawns external commands with inherited standard streams.
///
/// Unlike an output-capturing runner, children write straight to the
/// parent's stdout/stderr: build tools produce long, interleaved output that
/// should stream rather than buffer.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner.
    pub fn new() -> Self {
        Self
    }

    /// Run a command to completion, failing on nonzero exit.
    ///
    /// The child inherits the parent environment; `extra_env` entries are
    /// overlaid and `extra_path` is prepended to `PATH`. When both are empty
    /// the environment is passed through untouched.
    pub async fn run(&self, spec: &CommandSpec) -> Result<()> {
        spec.sem.with_token(self.spawn_and_wait(spec)).await
    }

    async fn spawn_and_wait(&self, spec: &CommandSpec) -> Result<()> {
        debug!("Running: {}", spec.display());

        let mut cmd = tokio::process::Command::new(&spec.prog);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }

        if let Some(path) = spec.effective_path() {
            cmd.env(EnvVars::PATH, path);
        }
        for (key, value) in &spec.extra_env {
            cmd.env(key, value);
        }

        let status = cmd.status().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::CommandFailed {
                    program: spec.prog.clone(),
                    args: spec.args.clone(),
                    exit_code: None,
                    fixes: vec![Fix::new(format!(
                        "Ensure `{}` is installed and on PATH",
                        spec.prog
                    ))],
                }
            } else {
                Error::Io {
                    message: format!("failed to execute {}", spec.prog),
                    path: spec.cwd.clone(),
                    source: e,
                }
            }
        })?;

        if !status.success() {
            return Err(Error::CommandFailed {
                program: spec.prog.clone(),
                args: spec.args.clone(),
                exit_code: status.code(),
                fixes: vec![],
            });
        }

        debug!("Finished: {}", spec.prog);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let spec = CommandSpec::new("sh").arg("-c").arg("echo hi");
        assert_eq!(spec.display(), "sh -c 'echo hi'");
    }

    #[test]
    fn test_effective_path_none_when_empty() {
        let spec = CommandSpec::new("true");
        assert!(spec.effective_path().is_none());
    }

    #[test]
    fn test_effective_path_prepends_in_order() {
        let spec = CommandSpec::new("true")
            .prepend_path("/opt/a/bin")
            .prepend_path("/opt/b/bin");
        let path = spec.effective_path().unwrap();
        assert!(path.starts_with(&format!(
            "/opt/a/bin{}/opt/b/bin",
            PATH_SEPARATOR
        )));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 0");
        runner.run(&spec).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").arg("-c").arg("exit 3");
        let err = runner.run(&spec).await.unwrap_err();
        match err {
            Error::CommandFailed {
                program, exit_code, ..
            } => {
                assert_eq!(program, "sh");
                assert_eq!(exit_code, Some(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_missing_program() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("benv-test-no-such-program");
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { exit_code: None, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_env_overlay() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("test \"$BENV_TEST_VAR\" = hello")
            .env("BENV_TEST_VAR", "hello");
        runner.run(&spec).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("touch marker")
            .current_dir(tmp.path());
        runner.run(&spec).await.unwrap();
        assert!(tmp.path().join("marker").exists());
    }
}
