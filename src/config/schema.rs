//! Configuration schema for Slipway
//!
//! Global settings live at `~/.config/slipway/config.toml`, the image recipe
//! lives in the project's `slipway.toml`. Both files share this schema.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container engine settings
    pub engine: EngineConfig,

    /// Output image settings
    pub image: ImageConfig,

    /// Base environment
    pub base: BaseConfig,

    /// Native toolchain
    pub toolchain: ToolchainConfig,

    /// Dependency manifest
    pub dependencies: DependenciesConfig,

    /// Application source
    pub source: SourceConfig,

    /// Runtime declaration
    pub runtime: RuntimeConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Which container engine CLI drives the build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Podman if installed, otherwise Docker
    #[default]
    Auto,
    Podman,
    Docker,
}

/// Container engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine to use
    pub kind: EngineKind,

    /// Explicit path to the engine binary
    pub binary: Option<PathBuf>,

    /// Extra arguments passed to `<engine> build`
    pub build_args: Vec<String>,
}

/// Output image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Repository name for the built image
    pub name: String,

    /// Working directory for the application inside the image
    pub app_dir: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            name: "slipway-app".to_string(),
            app_dir: "/app".to_string(),
        }
    }
}

/// Base environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    /// Pinned base image reference
    pub image: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            image: "python:3.12.7-slim-bookworm".to_string(),
        }
    }
}

/// Native toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// OS packages needed to compile native extensions
    pub packages: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            packages: vec![
                "build-essential".to_string(),
                "libssl-dev".to_string(),
                "libffi-dev".to_string(),
                "libuv1-dev".to_string(),
            ],
        }
    }
}

/// Dependency manifest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    /// Manifest path, relative to the project directory
    pub manifest: PathBuf,

    /// Reject requirements without an exact `==` pin
    pub require_pins: bool,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("requirements.txt"),
            require_pins: false,
        }
    }
}

/// Application source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source tree, relative to the project directory
    pub path: PathBuf,

    /// Additional exclude globs (gitignore syntax)
    pub exclude: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            exclude: vec!["__pycache__/".to_string(), "*.db".to_string()],
        }
    }
}

/// Runtime declaration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Port the server binds
    pub port: u16,

    /// Server launcher
    pub command: String,

    /// Launcher arguments
    pub args: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            command: "uvicorn".to_string(),
            args: ["main:app", "--host", "0.0.0.0", "--port", "8000"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
