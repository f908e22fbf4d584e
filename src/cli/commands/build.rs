//! Build command - plan the five stages and build the image

use crate::cli::args::BuildArgs;
use crate::cli::commands::stage_detail;
use crate::config::{Config, ConfigManager};
use crate::error::SlipwayResult;
use crate::orchestration::create_runtime;
use crate::pipeline::{plan_project, BuildOptions, BuildPlan, Executor};
use crate::ui::{self, BuildProgress, TaskSpinner, UiContext};
use std::path::Path;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config, root: &Path) -> SlipwayResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "slipway build");

    let plan = plan_project(config, root)?;
    show_stages(&ctx, &plan);

    let tag = plan.image_tag();
    if args.dry_run {
        ui::key_value(&ctx, "image", &tag);
        ui::outro_success(&ctx, "Plan is valid (dry run)");
        return Ok(());
    }

    let runtime = create_runtime(config).await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Checking {}...", runtime.runtime_name()));
    if let Err(e) = runtime.ensure_ready().await {
        spinner.stop_error(&format!("{} is not ready", runtime.runtime_name()));
        return Err(e);
    }
    spinner.stop(&format!("{} ready", runtime.runtime_name()));

    ConfigManager::ensure_state_dirs().await?;

    let options = BuildOptions {
        tags: args.tag,
        no_cache: args.no_cache,
        builds_dir: ConfigManager::builds_dir(),
    };
    debug!("Build options: {:?}", options);
    let mut executor = Executor::new(runtime.as_ref(), options);

    let progress = BuildProgress::new(&ctx, &tag);
    let result = executor
        .build(&plan, &|line: String| progress.on_line(line))
        .await;
    progress.finish();
    debug!("Build state: {}", executor.state());
    let report = result?;

    for extra in &report.extra_tags {
        ui::step_ok_detail(&ctx, "Tagged", extra);
    }

    if report.was_cached {
        ui::outro_success(&ctx, &format!("{} is up to date", report.image_tag));
    } else {
        ui::outro_success(&ctx, &format!("Built {}", report.image_tag));
    }

    Ok(())
}

/// One line per planned stage with its short layer digest
fn show_stages(ctx: &UiContext, plan: &BuildPlan) {
    for layer in plan.layers.layers() {
        ui::stage_ok(
            ctx,
            layer.stage,
            layer.short_digest(),
            &stage_detail(plan, layer.stage),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::ProjectArgs;
    use crate::error::SlipwayError;
    use std::fs;
    use tempfile::TempDir;

    fn args(dry_run: bool) -> BuildArgs {
        BuildArgs {
            project: ProjectArgs::default(),
            tag: vec![],
            no_cache: false,
            dry_run,
        }
    }

    #[tokio::test]
    async fn dry_run_needs_no_engine() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "fastapi==0.115.0\n").unwrap();
        fs::write(dir.path().join("main.py"), "app = None\n").unwrap();

        let mut config = Config::default();
        config.engine.binary = Some("/nonexistent/engine".into());

        execute(args(true), &config, dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_plan_fails_before_engine() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "fastapi>=1,<1\n").unwrap();

        let err = execute(args(false), &Config::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SlipwayError::UnsatisfiableConstraint { .. }));
    }
}
