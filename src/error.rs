//! Error types for Slipway
//!
//! All modules use `SlipwayResult<T>` as their return type.

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Slipway operations
pub type SlipwayResult<T> = Result<T, SlipwayError>;

/// Exit code for configuration and validation failures
pub const EXIT_USAGE: u8 = 2;

/// All errors that can occur in Slipway
#[derive(Error, Debug)]
pub enum SlipwayError {
    // Engine errors
    #[error("No container engine found. Install podman or docker")]
    EngineNotFound,

    #[error("Container engine {engine} is not usable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Base selection errors
    #[error("Base image '{image}' is not pinned: {reason}")]
    BaseNotPinned { image: String, reason: String },

    // Toolchain errors
    #[error("Invalid toolchain package '{package}'")]
    InvalidPackage { package: String },

    // Dependency errors
    #[error("Dependency manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("{path}:{line}: {reason}")]
    ManifestSyntax {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Unsatisfiable version constraint for {package}: {constraints}")]
    UnsatisfiableConstraint {
        package: String,
        constraints: String,
    },

    #[error("Dependency {package} is not pinned to an exact version")]
    UnpinnedDependency { package: String },

    // Source errors
    #[error("Source tree not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Failed to read source tree {path}: {reason}")]
    SourceWalk { path: PathBuf, reason: String },

    #[error("Source file {0} changed after it was planned")]
    SourceChanged(PathBuf),

    // Runtime declaration errors
    #[error("Invalid runtime declaration: {0}")]
    RuntimeInvalid(String),

    #[error("Start arguments bind port {args_port} but the image declares {declared}")]
    RuntimeMismatch { declared: u16, args_port: u16 },

    // Pipeline errors
    #[error("Stage {attempted} cannot follow {current}")]
    StageOrder { current: String, attempted: Stage },

    #[error("Image build failed during {stage} (exit code {code}):\n{output}")]
    BuildFailed {
        stage: Stage,
        code: i32,
        output: String,
    },

    #[error("Failed to tag image {image} as {tag}: {reason}")]
    ImageTag {
        image: String,
        tag: String,
        reason: String,
    },

    // Container errors
    #[error("Container failed to start: {0}")]
    ContainerStart(String),

    #[error("Port {port} did not accept connections within {secs}s\n{logs}")]
    SmokeTimeout { port: u16, secs: u64, logs: String },

    #[error("Container exited before port {port} accepted connections\n{logs}")]
    ContainerExited { port: u16, logs: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl SlipwayError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// The pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::BaseNotPinned { .. } => Some(Stage::Base),
            Self::InvalidPackage { .. } => Some(Stage::Toolchain),
            Self::ManifestNotFound(_)
            | Self::ManifestSyntax { .. }
            | Self::UnsatisfiableConstraint { .. }
            | Self::UnpinnedDependency { .. } => Some(Stage::Dependencies),
            Self::SourceNotFound(_) | Self::SourceWalk { .. } | Self::SourceChanged(_) => {
                Some(Stage::Source)
            }
            Self::RuntimeInvalid(_) | Self::RuntimeMismatch { .. } => Some(Stage::Runtime),
            Self::StageOrder { attempted, .. } => Some(*attempted),
            Self::BuildFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Process exit code for this error.
    ///
    /// Engine build failures pass the engine's own exit code through.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::BuildFailed { code, .. } => match u8::try_from(*code) {
                Ok(0) | Err(_) => 1,
                Ok(code) => code,
            },
            Self::ConfigInvalid { .. }
            | Self::BaseNotPinned { .. }
            | Self::InvalidPackage { .. }
            | Self::ManifestNotFound(_)
            | Self::ManifestSyntax { .. }
            | Self::UnsatisfiableConstraint { .. }
            | Self::UnpinnedDependency { .. }
            | Self::SourceNotFound(_)
            | Self::RuntimeInvalid(_)
            | Self::RuntimeMismatch { .. }
            | Self::StageOrder { .. } => EXIT_USAGE,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound => Some("Install podman (recommended) or docker"),
            Self::BaseNotPinned { .. } => {
                Some("Use a full release tag such as python:3.12.7-slim or an @sha256 digest")
            }
            Self::UnpinnedDependency { .. } => {
                Some("Pin with ==, or set dependencies.require_pins = false")
            }
            Self::RuntimeMismatch { .. } => Some("Keep runtime.port and the --port argument equal"),
            Self::ManifestNotFound(_) => Some("Set dependencies.manifest in slipway.toml"),
            Self::ContainerExited { .. } => Some("Check the start command and the logs above"),
            Self::SourceChanged(_) => Some("Run the build again once the tree is stable"),
            _ => None,
        }
    }
}
