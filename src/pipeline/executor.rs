//! Build execution
//!
//! Turns a `BuildPlan` into an engine build. The image tag is derived from
//! the top layer digest and the build arguments, so an unchanged plan maps
//! to an image the engine may already have, and the build is skipped.

use crate::error::{SlipwayError, SlipwayResult};
use crate::orchestration::{build_error_output, parse_step_line, BuildRequest, ContainerRuntime};
use crate::pipeline::containerfile::Containerfile;
use crate::pipeline::context::BuildContext;
use crate::pipeline::plan::BuildPlan;
use crate::pipeline::report::BuildReport;
use crate::pipeline::stage::{BuildState, Stage};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Options for one build invocation
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Tags applied in addition to the content-addressed tag
    pub tags: Vec<String>,
    /// Rebuild even if the image exists, bypassing the engine cache
    pub no_cache: bool,
    /// Parent directory for build contexts
    pub builds_dir: PathBuf,
}

/// Runs planned builds on a container runtime
pub struct Executor<'a> {
    runtime: &'a dyn ContainerRuntime,
    options: BuildOptions,
    state: BuildState,
}

impl<'a> Executor<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, options: BuildOptions) -> Self {
        Self {
            runtime,
            options,
            state: BuildState::Init,
        }
    }

    /// Where the last build stopped
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Build `plan`, streaming engine output to `on_output`.
    ///
    /// No retries: a failing engine step ends the build with
    /// `BuildFailed`, naming the stage whose instruction failed.
    pub async fn build(
        &mut self,
        plan: &BuildPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SlipwayResult<BuildReport> {
        self.state = BuildState::Init;
        let tag = plan.image_tag();

        if !self.options.no_cache && self.runtime.image_exists(&tag).await? {
            info!("Image {} is up to date", tag);
            self.complete_stages()?;
            self.apply_tags(&tag).await?;
            return Ok(BuildReport::new(
                plan,
                self.runtime.runtime_name(),
                self.options.tags.clone(),
                true,
            ));
        }

        let containerfile = Containerfile::render(plan);
        let context = BuildContext::prepare(&self.options.builds_dir, plan, &containerfile).await?;

        let request = BuildRequest {
            context_dir: context.dir(),
            containerfile: context.containerfile(),
            tag: &tag,
            no_cache: self.options.no_cache,
            extra_args: &plan.image.build_args,
        };
        info!("Building {} with {}", tag, self.runtime.runtime_name());
        let output = self.runtime.build_image(&request, on_output).await?;

        if !output.success() {
            let stage = failed_stage(&containerfile, &output.lines);
            self.state = self.state.fail(stage);
            warn!("Build {}", self.state);
            return Err(SlipwayError::BuildFailed {
                stage,
                code: output.code.unwrap_or(1),
                output: build_error_output(&output.lines),
            });
        }

        self.complete_stages()?;
        self.apply_tags(&tag).await?;
        debug!("Build {}", self.state);

        Ok(BuildReport::new(
            plan,
            self.runtime.runtime_name(),
            self.options.tags.clone(),
            false,
        ))
    }

    /// The engine ran every stage
    fn complete_stages(&mut self) -> SlipwayResult<()> {
        for stage in Stage::ORDER {
            self.state = self.state.transition(stage)?;
        }
        Ok(())
    }

    async fn apply_tags(&self, image: &str) -> SlipwayResult<()> {
        for tag in &self.options.tags {
            debug!("Tagging {} as {}", image, tag);
            self.runtime.tag_image(image, tag).await?;
        }
        Ok(())
    }
}

/// Stage of the last step the engine reported before failing.
///
/// Engines that number every instruction are matched by step number as a
/// fallback; BuildKit skips metadata-only instructions, so its numbers are
/// only trusted when the instruction text matches. A build that failed
/// before any step started is attributed to the base stage.
fn failed_stage(containerfile: &Containerfile, lines: &[String]) -> Stage {
    lines
        .iter()
        .rev()
        .filter_map(|line| parse_step_line(line))
        .find_map(|(n, total, instruction)| {
            containerfile.stage_for_instruction(instruction).or_else(|| {
                (total as usize == containerfile.step_count())
                    .then(|| containerfile.stage_for_step(n as usize))
                    .flatten()
            })
        })
        .unwrap_or(Stage::Base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::orchestration::fake::FakeRuntime;
    use crate::pipeline::plan::plan_project;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("requirements.txt"), "fastapi==0.115.0\n").unwrap();
        fs::write(project.path().join("main.py"), "app = None\n").unwrap();
        project
    }

    fn fixture() -> (TempDir, TempDir, BuildPlan) {
        let project = project();
        let plan = plan_project(&Config::default(), project.path()).unwrap();
        (project, TempDir::new().unwrap(), plan)
    }

    fn options(builds: &TempDir) -> BuildOptions {
        BuildOptions {
            builds_dir: builds.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn ignore(_: String) {}

    #[tokio::test]
    async fn builds_and_tags() {
        let (_project, builds, plan) = fixture();
        let runtime = FakeRuntime::default();
        let mut opts = options(&builds);
        opts.tags = vec!["app:latest".to_string()];

        let mut executor = Executor::new(&runtime, opts);
        let report = executor.build(&plan, &ignore).await.unwrap();

        assert_eq!(executor.state(), BuildState::RuntimeDeclared);
        assert!(!report.was_cached);
        assert_eq!(report.image_tag, plan.image_tag());
        assert_eq!(report.engine, "Fake");
        assert_eq!(
            runtime.calls(),
            vec![
                format!("build {}", plan.image_tag()),
                format!("tag {} app:latest", plan.image_tag()),
            ]
        );
        let containerfiles = runtime.containerfiles.lock().unwrap();
        assert!(containerfiles[0].contains("EXPOSE 8000/tcp"));
        // Context directory is gone once the build returns
        assert_eq!(fs::read_dir(builds.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn existing_image_skips_build() {
        let (_project, builds, plan) = fixture();
        let runtime = FakeRuntime::with_image(&plan.image_tag());

        let mut executor = Executor::new(&runtime, options(&builds));
        let report = executor.build(&plan, &ignore).await.unwrap();

        assert!(report.was_cached);
        assert_eq!(executor.state(), BuildState::RuntimeDeclared);
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn no_cache_rebuilds_existing_image() {
        let (_project, builds, plan) = fixture();
        let runtime = FakeRuntime::default();
        runtime.images.lock().unwrap().insert(plan.image_tag());
        let mut opts = options(&builds);
        opts.no_cache = true;

        let report = Executor::new(&runtime, opts).build(&plan, &ignore).await.unwrap();

        assert!(!report.was_cached);
        assert_eq!(runtime.calls().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_attributed_to_stage() {
        let (_project, builds, plan) = fixture();
        let runtime = FakeRuntime::failing(
            1,
            &[
                "STEP 1/9: FROM python:3.12.7-slim-bookworm",
                "STEP 5/9: COPY manifest/requirements.txt ./requirements.txt",
                "STEP 6/9: RUN pip install --no-cache-dir -r requirements.txt",
                "ERROR: Could not find a version that satisfies the requirement",
            ],
        );

        let mut executor = Executor::new(&runtime, options(&builds));
        let err = executor.build(&plan, &ignore).await.unwrap_err();

        assert_eq!(
            executor.state(),
            BuildState::Failed {
                stage: Stage::Dependencies
            }
        );
        match &err {
            SlipwayError::BuildFailed { stage, code, output } => {
                assert_eq!(*stage, Stage::Dependencies);
                assert_eq!(*code, 1);
                assert!(output.contains("Could not find a version"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 1);
        // Nothing is tagged after a failure
        assert_eq!(runtime.calls().len(), 1);
    }

    #[tokio::test]
    async fn engine_exit_code_is_carried() {
        let (_project, builds, plan) = fixture();
        let runtime = FakeRuntime::failing(
            100,
            &["#6 [2/4] RUN apt-get update && apt-get install -y --no-install-recommends"],
        );

        let err = Executor::new(&runtime, options(&builds))
            .build(&plan, &ignore)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Toolchain));
        assert_eq!(err.exit_code(), 100);
    }

    #[tokio::test]
    async fn build_args_select_a_distinct_image() {
        let project = project();
        let builds = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();

        let mut config = Config::default();
        config.engine.build_args = vec!["--platform=linux/amd64".to_string()];
        let amd64 = plan_project(&config, project.path()).unwrap();
        config.engine.build_args = vec!["--platform=linux/arm64".to_string()];
        let arm64 = plan_project(&config, project.path()).unwrap();

        let first = Executor::new(&runtime, options(&builds))
            .build(&amd64, &ignore)
            .await
            .unwrap();
        let second = Executor::new(&runtime, options(&builds))
            .build(&arm64, &ignore)
            .await
            .unwrap();

        assert!(!first.was_cached);
        assert!(!second.was_cached);
        assert_ne!(first.image_tag, second.image_tag);
        assert_eq!(
            *runtime.build_args.lock().unwrap(),
            vec![
                vec!["--platform=linux/amd64".to_string()],
                vec!["--platform=linux/arm64".to_string()],
            ]
        );

        // Same arguments again: served from the existing image
        let again = Executor::new(&runtime, options(&builds))
            .build(&arm64, &ignore)
            .await
            .unwrap();
        assert!(again.was_cached);
        assert_eq!(runtime.calls().len(), 2);
    }

    #[test]
    fn failure_before_any_step_is_base() {
        let (_project, _builds, plan) = fixture();
        let containerfile = Containerfile::render(&plan);
        let lines = vec!["Error: unable to connect".to_string()];
        assert_eq!(failed_stage(&containerfile, &lines), Stage::Base);
    }

    #[test]
    fn numbered_steps_fall_back_to_position() {
        let (_project, _builds, plan) = fixture();
        let containerfile = Containerfile::render(&plan);
        let lines = vec!["STEP 8/9: EXPOSE".to_string()];
        assert_eq!(failed_stage(&containerfile, &lines), Stage::Runtime);
    }
}
