//! Build command implementation.

use std::time::Instant;

use benv_build::{
    build_plan, ensure_fetch_dir, fetch_plan, uniform_unit_args, BuildOptions, BuildStrategy,
    FetchDirPolicy, FetchOptions, Toolchain, UnitArgs,
};
use benv_core::{DestDir, Result};
use benv_plan::write_plan;
use benv_ui::Output;

use crate::cli::{BuildArgs, FetchArgs, PlanArgs};

/// Resolve, fetch and execute a plan end-to-end.
pub async fn run(
    plan_args: &PlanArgs,
    fetch_args: &FetchArgs,
    build_args: &BuildArgs,
    output: &Output,
) -> Result<()> {
    let start = Instant::now();

    let plan = super::resolve_plan(plan_args, output).await?;
    if let Some(ref path) = build_args.output_plan {
        write_plan(&plan, path)?;
        output.verbose(&format!("Captured plan at {}", path.display()));
    }

    // With --prefetched the sources must already be in place; otherwise the
    // fetch phase materializes them first.
    let fetch_dir = if build_args.prefetched {
        ensure_fetch_dir(&fetch_args.fetch_dir, FetchDirPolicy::Existing)?
    } else {
        let dir = ensure_fetch_dir(&fetch_args.fetch_dir, super::fetch_dir_policy(fetch_args))?;
        let options = FetchOptions {
            jobs: fetch_args.jobs,
            cabal: plan_args.with_cabal.clone(),
            verbose: output.is_verbose(),
        };
        fetch_plan(&plan, &dir, &options, output).await?;
        dir
    };

    let dest = DestDir::new(&build_args.dest_dir, &build_args.prefix)?;

    let strategy = if let Some(ref path) = build_args.script {
        BuildStrategy::Script(path.clone())
    } else if let Some(jobs) = build_args.async_jobs {
        BuildStrategy::Async(jobs)
    } else {
        BuildStrategy::TopoSort
    };

    let options = BuildOptions {
        strategy: strategy.clone(),
        toolchain: Toolchain {
            compiler: build_args.with_compiler.clone(),
            cabal: plan_args.with_cabal.clone(),
            pkg_tool: build_args.with_pkg_tool.clone(),
        },
        unit_args: uniform_unit_args(UnitArgs {
            configure: build_args.configure_args.clone(),
            build: Vec::new(),
            register: build_args.pkg_tool_args.clone(),
        }),
    };

    build_plan(&plan, &fetch_dir, &dest, &options, output).await?;

    match strategy {
        BuildStrategy::Script(_) => {}
        _ => output.success_summary("Build complete", start.elapsed()),
    }
    Ok(())
}
