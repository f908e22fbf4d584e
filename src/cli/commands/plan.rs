//! Plan command - print the Containerfile a build would use

use crate::cli::args::{PlanArgs, PlanFormat};
use crate::config::Config;
use crate::error::SlipwayResult;
use crate::pipeline::{plan_project, summarize, BuildPlan, Containerfile};
use std::path::Path;

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config, root: &Path) -> SlipwayResult<()> {
    let plan = plan_project(config, root)?;

    match args.format {
        PlanFormat::Containerfile => print!("{}", Containerfile::render(&plan).text()),
        PlanFormat::Json => println!("{}", plan_json(&plan)?),
    }

    Ok(())
}

fn plan_json(plan: &BuildPlan) -> SlipwayResult<String> {
    let value = serde_json::json!({
        "image": plan.image_tag(),
        "base": plan.base.reference,
        "app_dir": plan.image.app_dir,
        "port": plan.runtime.port,
        "command": plan.runtime.argv(),
        "layers": summarize(plan),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}
