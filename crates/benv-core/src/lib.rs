//! Core types and process plumbing for benv.
//!
//! This crate provides shared error handling, external command execution,
//! bounded-concurrency tokens, scoped temporary directories and destination
//! path arithmetic used across all benv crates.

pub mod command;
pub mod env;
pub mod error;
pub mod paths;
pub mod sem;
pub mod tempdir;

pub use command::{CommandSpec, ProcessRunner, PATH_SEPARATOR};
pub use env::EnvVars;
pub use error::{Error, ErrorCode, Fix, Result};
pub use paths::{join_textual, DestDir};
pub use sem::Semaphore;
pub use tempdir::{with_temp_dir, TempDirPolicy};

/// Exit codes for the benv CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    GeneralError = 1,
    /// Usage error (bad arguments)
    UsageError = 2,
    /// Plan error (cycle, dangling dependency, unparsable plan)
    PlanError = 3,
    /// Fetch directory or unpack error
    FetchError = 4,
    /// External command failure during a build
    BuildError = 5,
}

impl ExitCode {
    /// Map an error to the exit code the process should terminate with.
    pub fn from_error(error: &Error) -> Self {
        match error.code() {
            ErrorCode::CommandFailed => ExitCode::BuildError,
            ErrorCode::PlanCyclic | ErrorCode::DanglingDep | ErrorCode::ParseError => {
                ExitCode::PlanError
            }
            ErrorCode::FetchDirError => ExitCode::FetchError,
            ErrorCode::IoError => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
