//! Build planning
//!
//! `PlanBuilder` walks the five stages as a typestate chain: each stage
//! operation exists only on the builder type produced by the stage before
//! it, so a plan cannot be assembled out of order. Every operation also
//! appends its layer to the `LayerStack`, which enforces the same order at
//! runtime.

use crate::config::Config;
use crate::error::{SlipwayError, SlipwayResult};
use crate::manifest::DependencyManifest;
use crate::pipeline::base::BaseImage;
use crate::pipeline::context::{MANIFEST_DIR, SOURCE_DIR};
use crate::pipeline::instruction::Instruction;
use crate::pipeline::layer::{Layer, LayerStack};
use crate::pipeline::runtime::RuntimeDeclaration;
use crate::pipeline::source::SourceSnapshot;
use crate::pipeline::stage::{BuildState, Stage};
use crate::pipeline::toolchain::Toolchain;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Environment baked into the base layer
const BASE_ENV: [(&str, &str); 3] = [
    ("PYTHONDONTWRITEBYTECODE", "1"),
    ("PYTHONUNBUFFERED", "1"),
    ("PIP_DISABLE_PIP_VERSION_CHECK", "1"),
];

/// Image-wide settings that are not a stage of their own
#[derive(Debug, Clone)]
pub struct ImageSettings {
    /// Repository name of the output image
    pub name: String,
    /// Application directory inside the image
    pub app_dir: String,
    /// Extra `<engine> build` arguments; they change the image, so they
    /// are part of its tag
    pub build_args: Vec<String>,
}

/// A fully planned build: every stage validated, every layer hashed
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub image: ImageSettings,
    pub base: BaseImage,
    pub toolchain: Toolchain,
    pub manifest: DependencyManifest,
    pub source: SourceSnapshot,
    pub runtime: RuntimeDeclaration,
    pub layers: LayerStack,
}

impl BuildPlan {
    /// Content-addressed tag, e.g. `campaigns:3f9a0c1d2e4b`
    pub fn image_tag(&self) -> String {
        let digest = self.image_digest();
        format!("{}:{}", self.image.name, &digest[..12.min(digest.len())])
    }

    /// Top layer digest, folded with the build arguments when there are any
    pub fn image_digest(&self) -> String {
        let top = self.layers.top().map(|l| l.digest.as_str()).unwrap_or("");
        if self.image.build_args.is_empty() {
            return top.to_string();
        }

        let mut hasher = Sha256::new();
        hasher.update(top.as_bytes());
        for arg in &self.image.build_args {
            hasher.update([0u8]);
            hasher.update(arg.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Layer for `stage`
    pub fn layer(&self, stage: Stage) -> Option<&Layer> {
        self.layers.get(stage)
    }
}

/// Builder state before any stage ran
pub struct Init;

/// Builder state after `select_base`
pub struct BaseSelected {
    base: BaseImage,
}

/// Builder state after `provision_toolchain`
pub struct ToolchainReady {
    base: BaseImage,
    toolchain: Toolchain,
}

/// Builder state after `install_dependencies`
pub struct DependenciesInstalled {
    base: BaseImage,
    toolchain: Toolchain,
    manifest: DependencyManifest,
}

/// Builder state after `materialize_source`
pub struct SourceMaterialized {
    base: BaseImage,
    toolchain: Toolchain,
    manifest: DependencyManifest,
    source: SourceSnapshot,
}

/// Stage-ordered plan builder
pub struct PlanBuilder<S> {
    image: ImageSettings,
    layers: LayerStack,
    state: S,
}

impl<S> PlanBuilder<S> {
    /// Pipeline state reached so far
    pub fn build_state(&self) -> BuildState {
        self.layers.state()
    }
}

impl PlanBuilder<Init> {
    /// Start a plan for an image
    pub fn new(image: ImageSettings) -> Self {
        Self {
            image,
            layers: LayerStack::new(),
            state: Init,
        }
    }

    /// Stage 1: fix the pinned base image
    pub fn select_base(mut self, reference: &str) -> SlipwayResult<PlanBuilder<BaseSelected>> {
        let base = BaseImage::pinned(reference)?;

        let env = BASE_ENV
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.layers.push(
            Stage::Base,
            vec![
                Instruction::From(base.reference.clone()),
                Instruction::Env(env),
                Instruction::Workdir(self.image.app_dir.clone()),
            ],
            base.digest.clone(),
        )?;

        Ok(PlanBuilder {
            image: self.image,
            layers: self.layers,
            state: BaseSelected { base },
        })
    }
}

impl PlanBuilder<BaseSelected> {
    /// Stage 2: native compilers and headers
    pub fn provision_toolchain(
        mut self,
        packages: &[String],
    ) -> SlipwayResult<PlanBuilder<ToolchainReady>> {
        let toolchain = Toolchain::new(packages)?;
        self.layers.push(Stage::Toolchain, toolchain.instructions(), None)?;

        Ok(PlanBuilder {
            image: self.image,
            layers: self.layers,
            state: ToolchainReady {
                base: self.state.base,
                toolchain,
            },
        })
    }
}

impl PlanBuilder<ToolchainReady> {
    /// Stage 3: install the manifest, copied alone so source edits never
    /// reach this layer
    pub fn install_dependencies(
        mut self,
        manifest: DependencyManifest,
        require_pins: bool,
    ) -> SlipwayResult<PlanBuilder<DependenciesInstalled>> {
        manifest.validate(require_pins)?;

        let file = manifest.file_name();
        self.layers.push(
            Stage::Dependencies,
            vec![
                Instruction::Copy {
                    src: format!("{}/{}", MANIFEST_DIR, file),
                    dest: format!("./{}", file),
                },
                Instruction::Run(format!("pip install --no-cache-dir -r {}", file)),
            ],
            Some(manifest.digest.clone()),
        )?;

        Ok(PlanBuilder {
            image: self.image,
            layers: self.layers,
            state: DependenciesInstalled {
                base: self.state.base,
                toolchain: self.state.toolchain,
                manifest,
            },
        })
    }
}

impl PlanBuilder<DependenciesInstalled> {
    /// Stage 4: copy the application tree
    pub fn materialize_source(
        mut self,
        source: SourceSnapshot,
    ) -> SlipwayResult<PlanBuilder<SourceMaterialized>> {
        self.layers.push(
            Stage::Source,
            vec![Instruction::Copy {
                src: format!("{}/", SOURCE_DIR),
                dest: "./".to_string(),
            }],
            Some(source.digest.clone()),
        )?;

        Ok(PlanBuilder {
            image: self.image,
            layers: self.layers,
            state: SourceMaterialized {
                base: self.state.base,
                toolchain: self.state.toolchain,
                manifest: self.state.manifest,
                source,
            },
        })
    }
}

impl PlanBuilder<SourceMaterialized> {
    /// Stage 5: port and start command; completes the plan
    pub fn declare_runtime(mut self, runtime: RuntimeDeclaration) -> SlipwayResult<BuildPlan> {
        self.layers.push(Stage::Runtime, runtime.instructions(), None)?;

        let SourceMaterialized {
            base,
            toolchain,
            manifest,
            source,
        } = self.state;

        Ok(BuildPlan {
            image: self.image,
            base,
            toolchain,
            manifest,
            source,
            runtime,
            layers: self.layers,
        })
    }
}

/// A planning error and the state the pipeline stopped in
#[derive(Debug)]
pub struct PlanFailure {
    /// Always `BuildState::Failed`
    pub state: BuildState,
    pub error: SlipwayError,
}

impl fmt::Display for PlanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.state, self.error)
    }
}

impl From<PlanFailure> for SlipwayError {
    fn from(failure: PlanFailure) -> Self {
        failure.error
    }
}

/// Plan a project from its configuration.
///
/// Inputs are read stage by stage, so a bad manifest fails before the
/// source tree is ever walked. Any error moves the pipeline to
/// `BuildState::Failed` in the stage that raised it.
pub fn plan_project(config: &Config, project_dir: &Path) -> Result<BuildPlan, PlanFailure> {
    let mut reached = BuildState::Init;
    plan_stages(config, project_dir, &mut reached).map_err(|error| {
        // Errors without a stage of their own belong to the stage being attempted
        let stage = error
            .stage()
            .or(reached.next_stage())
            .unwrap_or(Stage::Base);
        let state = reached.fail(stage);
        warn!("Planning {}", state);
        PlanFailure { state, error }
    })
}

fn plan_stages(
    config: &Config,
    project_dir: &Path,
    reached: &mut BuildState,
) -> SlipwayResult<BuildPlan> {
    let builder = PlanBuilder::new(ImageSettings {
        name: config.image.name.clone(),
        app_dir: config.image.app_dir.clone(),
        build_args: config.engine.build_args.clone(),
    });

    let builder = builder.select_base(&config.base.image)?;
    *reached = builder.build_state();
    info!("Base: {}", config.base.image);

    let builder = builder.provision_toolchain(&config.toolchain.packages)?;
    *reached = builder.build_state();
    info!("Toolchain: {} packages", config.toolchain.packages.len());

    let manifest = DependencyManifest::load(&project_dir.join(&config.dependencies.manifest))?;
    let builder = builder.install_dependencies(manifest, config.dependencies.require_pins)?;
    *reached = builder.build_state();
    info!("Dependencies validated");

    let source_root = project_dir.join(&config.source.path);
    let source = SourceSnapshot::capture(&source_root, &config.source.exclude)?;
    info!("Source: {} files", source.len());
    let builder = builder.materialize_source(source)?;
    *reached = builder.build_state();

    let runtime = RuntimeDeclaration::new(
        config.runtime.port,
        &config.runtime.command,
        &config.runtime.args,
    )?;
    let plan = builder.declare_runtime(runtime)?;
    *reached = plan.layers.state();
    Ok(plan)
}
