//! Container runtime abstraction
//!
//! Provides a trait for the engine operations the build pipeline and the
//! smoke check need, so the pipeline can be driven by Podman, Docker, or a
//! scripted fake in tests.

use crate::error::SlipwayResult;
use async_trait::async_trait;
use std::path::Path;

/// Inputs for one image build
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Context directory
    pub context_dir: &'a Path,
    /// Containerfile to build
    pub containerfile: &'a Path,
    /// Tag for the resulting image
    pub tag: &'a str,
    /// Ignore the engine's layer cache
    pub no_cache: bool,
    /// Extra engine-specific arguments
    pub extra_args: &'a [String],
}

/// What the engine reported for a build
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
    /// Combined stdout/stderr lines
    pub lines: Vec<String>,
}

impl BuildOutput {
    /// Whether the engine exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Configuration for starting a container
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Image to start
    pub image: String,
    /// Container name
    pub name: Option<String>,
    /// Port publications (host, container)
    pub ports: Vec<(u16, u16)>,
}

/// Abstract container engine interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the engine is installed
    async fn is_available(&self) -> SlipwayResult<bool>;

    /// Ensure the engine can serve requests
    async fn ensure_ready(&self) -> SlipwayResult<()>;

    /// Check if an image exists locally
    async fn image_exists(&self, image: &str) -> SlipwayResult<bool>;

    /// Build an image, streaming each output line to `on_output`.
    ///
    /// A failing build is not an `Err`: the exit code and output come back
    /// in `BuildOutput` so the caller can attribute the failure.
    async fn build_image(
        &self,
        request: &BuildRequest<'_>,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SlipwayResult<BuildOutput>;

    /// Add a tag to an existing image
    async fn tag_image(&self, image: &str, tag: &str) -> SlipwayResult<()>;

    /// Start a detached container and return its ID
    async fn run_detached(&self, config: &RunConfig) -> SlipwayResult<String>;

    /// Whether a container is still running
    async fn is_running(&self, container_id: &str) -> SlipwayResult<bool>;

    /// Stop a container gracefully
    async fn stop(&self, container_id: &str) -> SlipwayResult<()>;

    /// Remove a container
    async fn remove(&self, container_id: &str) -> SlipwayResult<()>;

    /// Get container logs
    async fn logs(&self, container_id: &str, lines: u32) -> SlipwayResult<String>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
