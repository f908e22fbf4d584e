//! Pipeline stages and the build state machine
//!
//! Stages run in one fixed order. `BuildState::transition` refuses every
//! step except the next one, so the order cannot drift at runtime either.

use crate::error::{SlipwayError, SlipwayResult};
use serde::Serialize;
use std::fmt;

/// The five build stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pinned runtime base image
    Base,
    /// Native compilers and headers
    Toolchain,
    /// Dependency manifest install
    Dependencies,
    /// Application source copy
    Source,
    /// Port and start command
    Runtime,
}

impl Stage {
    /// All stages in execution order
    pub const ORDER: [Stage; 5] = [
        Stage::Base,
        Stage::Toolchain,
        Stage::Dependencies,
        Stage::Source,
        Stage::Runtime,
    ];

    /// Stable identifier, also fed into layer digests
    pub fn id(&self) -> &'static str {
        match self {
            Stage::Base => "base",
            Stage::Toolchain => "toolchain",
            Stage::Dependencies => "dependencies",
            Stage::Source => "source",
            Stage::Runtime => "runtime",
        }
    }

    /// Position in `ORDER`
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Where a build currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Init,
    BaseSelected,
    ToolchainReady,
    DependenciesInstalled,
    SourceMaterialized,
    /// Terminal success
    RuntimeDeclared,
    /// Terminal failure in the given stage
    Failed { stage: Stage },
}

impl BuildState {
    /// The stage whose completion produced this state
    pub fn completed(&self) -> Option<Stage> {
        match self {
            BuildState::Init | BuildState::Failed { .. } => None,
            BuildState::BaseSelected => Some(Stage::Base),
            BuildState::ToolchainReady => Some(Stage::Toolchain),
            BuildState::DependenciesInstalled => Some(Stage::Dependencies),
            BuildState::SourceMaterialized => Some(Stage::Source),
            BuildState::RuntimeDeclared => Some(Stage::Runtime),
        }
    }

    /// The stage allowed to run next
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            BuildState::Init => Some(Stage::Base),
            BuildState::Failed { .. } | BuildState::RuntimeDeclared => None,
            state => state
                .completed()
                .and_then(|done| Stage::ORDER.get(done.index() + 1).copied()),
        }
    }

    /// Whether the state machine has stopped
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildState::RuntimeDeclared | BuildState::Failed { .. }
        )
    }

    /// Advance by completing `stage`
    pub fn transition(self, stage: Stage) -> SlipwayResult<BuildState> {
        if self.next_stage() != Some(stage) {
            return Err(SlipwayError::StageOrder {
                current: self.to_string(),
                attempted: stage,
            });
        }

        Ok(match stage {
            Stage::Base => BuildState::BaseSelected,
            Stage::Toolchain => BuildState::ToolchainReady,
            Stage::Dependencies => BuildState::DependenciesInstalled,
            Stage::Source => BuildState::SourceMaterialized,
            Stage::Runtime => BuildState::RuntimeDeclared,
        })
    }

    /// Record a failure. Terminal states stay as they are.
    pub fn fail(self, stage: Stage) -> BuildState {
        if self.is_terminal() {
            self
        } else {
            BuildState::Failed { stage }
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Init => write!(f, "init"),
            BuildState::BaseSelected => write!(f, "base selected"),
            BuildState::ToolchainReady => write!(f, "toolchain ready"),
            BuildState::DependenciesInstalled => write!(f, "dependencies installed"),
            BuildState::SourceMaterialized => write!(f, "source materialized"),
            BuildState::RuntimeDeclared => write!(f, "runtime declared"),
            BuildState::Failed { stage } => write!(f, "failed in {}", stage),
        }
    }
}
