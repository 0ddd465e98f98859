//! Plan computation via the native tool.
//!
//! The resolver is not reimplemented; instead a dummy project describing
//! the seeds is written into a scoped temp directory and the native tool is
//! asked for a dry-run build, whose cached `plan.json` becomes our plan.

use tracing::info;

use benv_core::{with_temp_dir, CommandSpec, ProcessRunner, Result, TempDirPolicy};
use benv_plan::{read_plan, write_dummy_project, CabalPlan, PkgSpecs, Seeds};
use benv_ui::{Output, Spinner};

/// Inputs to plan computation.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Seed packages, flags, constraints and allow-newer directives
    pub seeds: Seeds,
    /// Version pins from a freeze file or explicit mapping
    pub pins: PkgSpecs,
    /// Whether the dummy project directory survives the run
    pub temp_policy: TempDirPolicy,
    /// The native tool executable
    pub cabal: String,
    /// Whether to show verbose output
    pub verbose: bool,
}

/// Ask the native tool to resolve the seeds into a concrete plan.
pub async fn compute_plan(request: &PlanRequest, output: &Output) -> Result<CabalPlan> {
    let request = request.clone();
    let output = output.clone();

    with_temp_dir(request.temp_policy, "benv-plan-", move |dir| async move {
        write_dummy_project(
            &dir,
            &request.seeds.units,
            &request.pins,
            &request.seeds.allow_newer,
        )?;
        info!("Computing plan in {}", dir.display());

        let spinner = if request.verbose {
            None
        } else {
            Some(Spinner::new("Resolving dependencies..."))
        };

        let spec = CommandSpec::new(request.cabal.as_str())
            .arg("build")
            .arg("--dry-run")
            .arg("-v0")
            .current_dir(&dir);
        let result = ProcessRunner::new().run(&spec).await;

        if let Some(spinner) = spinner {
            match &result {
                Ok(()) => spinner.finish_success("Dependencies resolved"),
                Err(_) => spinner.finish_error("Failed to resolve dependencies"),
            }
        }
        result?;

        let plan_path = dir.join("dist-newstyle/cache/plan.json");
        let plan = read_plan(&plan_path)?;
        output.verbose(&format!("Plan contains {} units", plan.units.len()));
        Ok(plan)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use benv_plan::parse_seed_file;
    use benv_ui::Verbosity;

    #[tokio::test]
    async fn test_compute_plan_fails_without_native_tool() {
        let request = PlanRequest {
            seeds: parse_seed_file("lens\n").unwrap(),
            pins: PkgSpecs::new(),
            temp_policy: TempDirPolicy::Delete,
            cabal: "benv-test-no-such-tool".to_string(),
            verbose: true,
        };
        let output = Output::with_verbosity(Verbosity::Silent);
        let err = compute_plan(&request, &output).await.unwrap_err();
        assert!(err.to_string().contains("benv-test-no-such-tool"));
    }
}
