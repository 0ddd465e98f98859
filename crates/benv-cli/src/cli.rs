//! CLI argument parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use benv_core::EnvVars;

use crate::styles::STYLES;

/// benv - build cabal plans into a relocatable installation tree
#[derive(Parser, Debug)]
#[command(name = "benv")]
#[command(author, version, about = "Build cabal plans into a relocatable installation tree")]
#[command(long_about = None)]
#[command(propagate_version = true)]
#[command(styles = STYLES)]
#[command(after_help = "Use `benv help <command>` for more information about a command.")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose output (use twice for debug output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = EnvVars::BENV_VERBOSE)]
    pub verbose: u8,

    /// Suppress all output
    #[arg(short, long, global = true, env = EnvVars::BENV_QUIET)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = EnvVars::BENV_NO_COLOR)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve seeds into a build plan and write the plan blob
    Plan {
        #[command(flatten)]
        plan: PlanArgs,

        /// Write the computed plan to this path
        #[arg(long, value_name = "FILE")]
        output_plan: PathBuf,
    },

    /// Materialize the plan's sources under the fetch directory
    Fetch {
        #[command(flatten)]
        plan: PlanArgs,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Resolve, fetch and build a plan into the destination
    Build {
        #[command(flatten)]
        plan: PlanArgs,

        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        build: BuildArgs,
    },
}

/// How the plan is obtained.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Seed package requirements (NAME [+FLAG|-FLAG]... [CONSTRAINT...])
    #[arg(value_name = "SEED")]
    pub seeds: Vec<String>,

    /// Read seed requirements from a file
    #[arg(long, value_name = "FILE")]
    pub seed_file: Option<PathBuf>,

    /// Pin versions from a freeze file
    #[arg(long, value_name = "FILE")]
    pub freeze_file: Option<PathBuf>,

    /// Reuse a previously captured plan instead of resolving
    #[arg(long, value_name = "FILE", conflicts_with_all = ["seeds", "seed_file", "freeze_file"])]
    pub plan: Option<PathBuf>,

    /// Keep the temporary resolution project for inspection
    #[arg(long)]
    pub keep_tmp: bool,

    /// The cabal executable to drive
    #[arg(long, value_name = "PATH", default_value = "cabal")]
    pub with_cabal: String,
}

/// Fetch directory handling.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Directory sources are unpacked into
    #[arg(long, value_name = "DIR")]
    pub fetch_dir: PathBuf,

    /// The fetch directory must not pre-exist
    #[arg(long, conflicts_with = "update")]
    pub new: bool,

    /// The fetch directory must already exist
    #[arg(long)]
    pub update: bool,

    /// Number of parallel unpack jobs
    #[arg(short, long, value_name = "N", env = EnvVars::BENV_JOBS)]
    pub jobs: Option<usize>,
}

/// Build execution options.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Install prefix baked into the artifacts
    #[arg(long, value_name = "DIR")]
    pub prefix: PathBuf,

    /// Staging directory files are physically written under
    #[arg(long, value_name = "DIR", default_value = "/")]
    pub dest_dir: PathBuf,

    /// Build independent units in parallel, optionally capped at N jobs
    #[arg(long = "async", value_name = "N", num_args = 0..=1, default_missing_value = "0")]
    pub async_jobs: Option<usize>,

    /// Emit a build script to this path instead of executing
    #[arg(long, value_name = "FILE", conflicts_with = "async_jobs")]
    pub script: Option<PathBuf>,

    /// Sources are already fetched; skip the fetch phase
    #[arg(long, conflicts_with_all = ["new", "update"])]
    pub prefetched: bool,

    /// Extra argument for Setup configure (may be repeated)
    #[arg(long = "configure-arg", value_name = "ARG")]
    pub configure_args: Vec<String>,

    /// Extra argument for the registration tool (may be repeated)
    #[arg(long = "ghc-pkg-arg", value_name = "ARG")]
    pub pkg_tool_args: Vec<String>,

    /// Also write the resolved plan to this path
    #[arg(long, value_name = "FILE")]
    pub output_plan: Option<PathBuf>,

    /// The compiler used for Setup drivers
    #[arg(long, value_name = "PATH", default_value = "ghc")]
    pub with_compiler: String,

    /// The registration tool
    #[arg(long, value_name = "PATH", default_value = "ghc-pkg")]
    pub with_pkg_tool: String,
}
