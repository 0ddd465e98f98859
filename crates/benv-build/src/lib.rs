//! Plan execution engine for benv.
//!
//! This crate turns a resolved build plan into a populated installation
//! tree. It handles:
//! - Computing plans through the native tool's dry-run mode
//! - Fetching remote sources into the fetch root
//! - Assembling per-unit setup and build command sequences
//! - Maintaining the temp and final package databases
//! - Executing the plan sequentially, in bounded parallel, or as an
//!   emitted shell script

pub mod compile;
pub mod executor;
pub mod fetch;
pub mod package_db;
pub mod plan_compute;
pub mod script;

pub use compile::{
    ensure_setup_source, find_setup_source, setup_source_guard, uniform_unit_args, Toolchain,
    UnitArgs, UnitArgsFn, UnitCompiler, DEFAULT_SETUP_SOURCE,
};
pub use executor::{build_plan, BuildOptions, BuildStrategy};
pub use fetch::{ensure_fetch_dir, fetch_plan, FetchDirPolicy, FetchOptions, FetchSummary};
pub use package_db::{prepare, registration_file, stage_commands, PkgDbDirs, PKG_DB_DIR};
pub use plan_compute::{compute_plan, PlanRequest};
pub use script::{sh_quote, ScriptBuffer};
