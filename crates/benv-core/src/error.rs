//! Error types for benv.

use std::path::PathBuf;

/// Result type alias using benv Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes for categorizing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// External command exited nonzero
    CommandFailed,
    /// Build plan contains a dependency cycle
    PlanCyclic,
    /// Build plan references a unit it does not contain
    DanglingDep,
    /// Fetch directory lifecycle violation
    FetchDirError,
    /// Malformed plan, seed or freeze input
    ParseError,
    /// I/O error
    IoError,
}

/// A fix suggestion for an error.
#[derive(Debug, Clone)]
pub struct Fix {
    /// Description of what this fix does
    pub description: String,
    /// Command to run, if applicable
    pub command: Option<String>,
}

impl Fix {
    /// Create a fix with just a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: None,
        }
    }

    /// Create a fix with a command.
    pub fn with_command(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: Some(command.into()),
        }
    }
}

/// Structured error type for benv.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("command failed{}: {}", render_exit(*exit_code), render_argv(program, args))]
    CommandFailed {
        program: String,
        args: Vec<String>,
        exit_code: Option<i32>,
        fixes: Vec<Fix>,
    },

    #[error("dependency cycle in build plan: {}", units.join(" -> "))]
    PlanCyclic { units: Vec<String> },

    #[error("unit {unit} depends on {dep}, which is not in the plan")]
    DanglingDep { unit: String, dep: String },

    #[error("fetch directory already exists: {}", path.display())]
    FetchDirExists { path: PathBuf, fixes: Vec<Fix> },

    #[error("fetch directory does not exist: {}", path.display())]
    FetchDirMissing { path: PathBuf, fixes: Vec<Fix> },

    #[error("parse error: {message}")]
    Parse {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn render_exit(code: Option<i32>) -> String {
    match code {
        Some(c) => format!(" with exit code {}", c),
        None => " (killed by signal)".to_string(),
    }
}

/// Render an argv so the failing command can be re-run by copy-paste.
fn render_argv(program: &str, args: &[String]) -> String {
    let mut out = String::from(program);
    for arg in args {
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

impl Error {
    /// Get the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::CommandFailed { .. } => ErrorCode::CommandFailed,
            Error::PlanCyclic { .. } => ErrorCode::PlanCyclic,
            Error::DanglingDep { .. } => ErrorCode::DanglingDep,
            Error::FetchDirExists { .. } | Error::FetchDirMissing { .. } => ErrorCode::FetchDirError,
            Error::Parse { .. } => ErrorCode::ParseError,
            Error::Io { .. } | Error::Other(_) => ErrorCode::IoError,
        }
    }

    /// Get suggested fixes for this error.
    pub fn fixes(&self) -> &[Fix] {
        match self {
            Error::CommandFailed { fixes, .. } => fixes,
            Error::FetchDirExists { fixes, .. } => fixes,
            Error::FetchDirMissing { fixes, .. } => fixes,
            _ => &[],
        }
    }

    /// Create an I/O error with a message and path.
    pub fn io_at(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            message: message.into(),
            path: Some(path.into()),
            source,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            path: None,
        }
    }

    /// Create a parse error with the offending file.
    pub fn parse_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::Parse {
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display_joins_argv() {
        let err = Error::CommandFailed {
            program: "ghc".to_string(),
            args: vec!["--make".to_string(), "Setup.hs".to_string()],
            exit_code: Some(1),
            fixes: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("ghc --make Setup.hs"));
    }

    #[test]
    fn test_command_failed_display_quotes_spaces() {
        let err = Error::CommandFailed {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo hi".to_string()],
            exit_code: Some(2),
            fixes: vec![],
        };
        assert!(err.to_string().contains("sh -c 'echo hi'"));
    }

    #[test]
    fn test_cycle_display() {
        let err = Error::PlanCyclic {
            units: vec!["a-1".to_string(), "b-1".to_string(), "a-1".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle in build plan: a-1 -> b-1 -> a-1"
        );
    }

    #[test]
    fn test_error_codes() {
        let err = Error::DanglingDep {
            unit: "a".to_string(),
            dep: "b".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::DanglingDep);

        let err = Error::FetchDirExists {
            path: PathBuf::from("/tmp/x"),
            fixes: vec![],
        };
        assert_eq!(err.code(), ErrorCode::FetchDirError);
    }
}
