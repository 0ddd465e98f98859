//! Fetch command implementation.

use benv_build::{ensure_fetch_dir, fetch_plan, FetchOptions};
use benv_core::Result;
use benv_ui::Output;

use crate::cli::{FetchArgs, PlanArgs};

/// Materialize the plan's remote sources under the fetch directory.
pub async fn run(plan_args: &PlanArgs, fetch_args: &FetchArgs, output: &Output) -> Result<()> {
    let plan = super::resolve_plan(plan_args, output).await?;
    let fetch_dir = ensure_fetch_dir(&fetch_args.fetch_dir, super::fetch_dir_policy(fetch_args))?;

    let options = FetchOptions {
        jobs: fetch_args.jobs,
        cabal: plan_args.with_cabal.clone(),
        verbose: output.is_verbose(),
    };
    let summary = fetch_plan(&plan, &fetch_dir, &options, output).await?;
    output.status(
        "Fetched",
        &format!("{} packages ({} already present)", summary.fetched, summary.skipped),
    );
    Ok(())
}
