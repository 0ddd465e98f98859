//! Command implementations.

use benv_core::{Error, ExitCode, Result, TempDirPolicy};
use benv_plan::{parse_freeze_file, parse_seed_file, read_plan, CabalPlan, PkgSpecs, Seeds};
use benv_build::{compute_plan, FetchDirPolicy, PlanRequest};
use benv_ui::{Output, Verbosity};

use crate::cli::{Cli, Commands, FetchArgs, PlanArgs};

mod build;
mod fetch;
mod plan;

/// Dispatch the parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let verbosity = if cli.global.quiet {
        Verbosity::Silent
    } else {
        match cli.global.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };
    let output = Output::with_verbosity(verbosity);

    if cli.global.no_color || benv_core::env::no_color() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let result = match cli.command {
        Commands::Plan { plan, output_plan } => plan::run(&plan, &output_plan, &output).await,
        Commands::Fetch { plan, fetch } => fetch::run(&plan, &fetch, &output).await,
        Commands::Build { plan, fetch, build } => {
            build::run(&plan, &fetch, &build, &output).await
        }
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            output.print_error(&e);
            Ok(ExitCode::from_error(&e).into())
        }
    }
}

/// Obtain the plan: either read a captured blob, or resolve the seeds
/// through the native tool.
pub(crate) async fn resolve_plan(args: &PlanArgs, output: &Output) -> Result<CabalPlan> {
    if let Some(ref path) = args.plan {
        return read_plan(path);
    }

    let mut seeds = match args.seed_file {
        Some(ref path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::io_at("failed to read seed file", path, e))?;
            parse_seed_file(&contents)?
        }
        None => Seeds::default(),
    };
    for requirement in &args.seeds {
        benv_plan::parse_seed_requirement(requirement, &mut seeds.units)?;
    }
    if seeds.is_empty() {
        return Err(Error::parse(
            "no seed packages given (pass packages or --seed-file, or reuse a plan with --plan)",
        ));
    }

    let pins = match args.freeze_file {
        Some(ref path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::io_at("failed to read freeze file", path, e))?;
            parse_freeze_file(&contents)?
        }
        None => PkgSpecs::new(),
    };

    let request = PlanRequest {
        seeds,
        pins,
        temp_policy: if args.keep_tmp {
            TempDirPolicy::Keep
        } else {
            TempDirPolicy::Delete
        },
        cabal: args.with_cabal.clone(),
        verbose: output.is_verbose(),
    };
    compute_plan(&request, output).await
}

/// The fetch-dir lifecycle implied by `--new` / `--update`. When neither is
/// given, an existing directory is reused and a missing one is created.
pub(crate) fn fetch_dir_policy(args: &FetchArgs) -> FetchDirPolicy {
    if args.new {
        FetchDirPolicy::New
    } else if args.update || args.fetch_dir.is_dir() {
        FetchDirPolicy::Existing
    } else {
        FetchDirPolicy::New
    }
}
