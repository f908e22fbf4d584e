//! Runtime factory for creating the configured container runtime
//!
//! Resolves `engine.kind = "auto"` by probing for Podman first, then Docker.

use crate::config::{Config, EngineKind};
use crate::error::{SlipwayError, SlipwayResult};
use crate::orchestration::cli_runtime::CliRuntime;
use crate::orchestration::runtime::ContainerRuntime;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A concrete engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Podman,
    Docker,
}

impl Engine {
    /// Probe order for `auto`
    pub const PREFERENCE: [Engine; 2] = [Engine::Podman, Engine::Docker];

    /// Default binary name
    pub fn binary(&self) -> &'static str {
        match self {
            Engine::Podman => "podman",
            Engine::Docker => "docker",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Podman => "Podman",
            Engine::Docker => "Docker",
        }
    }

    /// Engine named by the configuration, `None` for auto
    pub fn from_kind(kind: EngineKind) -> Option<Self> {
        match kind {
            EngineKind::Auto => None,
            EngineKind::Podman => Some(Engine::Podman),
            EngineKind::Docker => Some(Engine::Docker),
        }
    }
}

async fn responds_to_version(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Create the container runtime selected by `config.engine`
///
/// An explicit engine is returned without probing; readiness is checked
/// later by `ensure_ready`. `auto` picks the first engine that answers
/// `--version`, or fails with `EngineNotFound`.
pub async fn create_runtime(config: &Config) -> SlipwayResult<Box<dyn ContainerRuntime>> {
    let binary = config.engine.binary.clone();

    if let Some(engine) = Engine::from_kind(config.engine.kind) {
        return Ok(Box::new(CliRuntime::new(engine, binary)));
    }

    for engine in Engine::PREFERENCE {
        let probe = binary
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| engine.binary().to_string());
        if responds_to_version(&probe).await {
            debug!("Detected container engine: {}", engine.name());
            return Ok(Box::new(CliRuntime::new(engine, binary)));
        }
    }

    Err(SlipwayError::EngineNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_names() {
        assert_eq!(Engine::Podman.binary(), "podman");
        assert_eq!(Engine::Docker.binary(), "docker");
        assert_eq!(Engine::Docker.name(), "Docker");
    }

    #[test]
    fn kind_mapping() {
        assert_eq!(Engine::from_kind(EngineKind::Auto), None);
        assert_eq!(Engine::from_kind(EngineKind::Podman), Some(Engine::Podman));
        assert_eq!(Engine::from_kind(EngineKind::Docker), Some(Engine::Docker));
    }

    #[test]
    fn podman_is_preferred() {
        assert_eq!(Engine::PREFERENCE[0], Engine::Podman);
    }

    #[tokio::test]
    async fn explicit_engine_skips_probe() {
        let mut config = Config::default();
        config.engine.kind = EngineKind::Docker;
        config.engine.binary = Some("/nonexistent/docker".into());

        let runtime = create_runtime(&config).await.unwrap();
        assert_eq!(runtime.runtime_name(), "Docker");
    }

    #[tokio::test]
    async fn auto_without_engines_fails() {
        let mut config = Config::default();
        config.engine.binary = Some("/nonexistent/engine".into());

        let err = create_runtime(&config).await.err().unwrap();
        assert!(matches!(err, SlipwayError::EngineNotFound));
    }
}
