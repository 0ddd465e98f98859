//! Plan command implementation.

use std::path::Path;

use benv_core::Result;
use benv_plan::write_plan;
use benv_ui::Output;

use crate::cli::PlanArgs;

/// Resolve the seeds and write the plan blob.
pub async fn run(args: &PlanArgs, output_plan: &Path, output: &Output) -> Result<()> {
    let plan = super::resolve_plan(args, output).await?;
    write_plan(&plan, output_plan)?;
    output.status(
        "Wrote",
        &format!(
            "{} ({} units)",
            output_plan.display(),
            plan.units.len()
        ),
    );
    Ok(())
}
