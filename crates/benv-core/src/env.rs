//! Environment variable constants for benv.

/// Environment variable names recognized by benv.
pub struct EnvVars;

impl EnvVars {
    /// Enable verbose output.
    pub const BENV_VERBOSE: &'static str = "BENV_VERBOSE";

    /// Suppress output.
    pub const BENV_QUIET: &'static str = "BENV_QUIET";

    /// Disable colored output.
    pub const BENV_NO_COLOR: &'static str = "BENV_NO_COLOR";

    /// Enable JSON log output.
    pub const BENV_LOG_JSON: &'static str = "BENV_LOG_JSON";

    /// Default number of parallel jobs.
    pub const BENV_JOBS: &'static str = "BENV_JOBS";

    /// Standard NO_COLOR environment variable.
    pub const NO_COLOR: &'static str = "NO_COLOR";

    /// Standard CLICOLOR environment variable.
    pub const CLICOLOR: &'static str = "CLICOLOR";

    /// Search path for executables.
    pub const PATH: &'static str = "PATH";
}

/// Check if colors should be disabled based on environment.
pub fn no_color() -> bool {
    std::env::var(EnvVars::NO_COLOR).is_ok()
        || std::env::var(EnvVars::BENV_NO_COLOR).is_ok()
        || std::env::var(EnvVars::CLICOLOR)
            .map(|v| v == "0")
            .unwrap_or(false)
}
