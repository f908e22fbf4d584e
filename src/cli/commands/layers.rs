//! Layers command - show the planned layer stack

use crate::cli::args::{LayersArgs, OutputFormat};
use crate::cli::commands::stage_detail;
use crate::config::Config;
use crate::error::SlipwayResult;
use crate::pipeline::{plan_project, summarize, BuildPlan};
use crate::ui::{self, UiContext};
use console::style;
use std::path::Path;

/// Execute the layers command
pub async fn execute(args: LayersArgs, config: &Config, root: &Path) -> SlipwayResult<()> {
    let plan = plan_project(config, root)?;

    match args.format {
        OutputFormat::Table => print_table(&plan),
        OutputFormat::Json => print_json(&plan)?,
        OutputFormat::Plain => print_plain(&plan),
    }

    Ok(())
}

fn print_table(plan: &BuildPlan) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Layers of {}", plan.image_tag()));

    println!(
        "{:<14} {:<14} {}",
        style("STAGE").bold(),
        style("DIGEST").bold(),
        style("CONTENT").bold()
    );
    println!("{}", "-".repeat(72));

    for layer in plan.layers.layers() {
        println!(
            "{:<14} {:<14} {}",
            layer.stage.id(),
            style(layer.short_digest()).dim(),
            stage_detail(plan, layer.stage)
        );
    }

    println!();
    println!("{} layer(s)", plan.layers.layers().len());
}

fn print_json(plan: &BuildPlan) -> SlipwayResult<()> {
    let json = serde_json::to_string_pretty(&summarize(plan))?;
    println!("{}", json);
    Ok(())
}

fn print_plain(plan: &BuildPlan) {
    for layer in plan.layers.layers() {
        println!("{} {}", layer.stage.id(), layer.digest);
    }
}
