//! CLI command implementations

pub mod build;
pub mod completions;
pub mod config;
pub mod init;
pub mod layers;
pub mod plan;
pub mod smoke;

pub use build::execute as build;
pub use completions::execute as completions;
pub use config::execute as config;
pub use init::execute as init;
pub use layers::execute as layers;
pub use plan::execute as plan;
pub use smoke::execute as smoke;

use crate::pipeline::{BuildPlan, Stage};

/// One-line description of what a stage contributes to `plan`
pub(crate) fn stage_detail(plan: &BuildPlan, stage: Stage) -> String {
    match stage {
        Stage::Base => plan.base.reference.clone(),
        Stage::Toolchain => match plan.toolchain.packages().len() {
            0 => "no packages".to_string(),
            n => format!("{} packages", n),
        },
        Stage::Dependencies => format!(
            "{} requirements from {}",
            plan.manifest.entries.len(),
            plan.manifest.file_name()
        ),
        Stage::Source => format!("{} files", plan.source.len()),
        Stage::Runtime => format!(
            "port {}: {}",
            plan.runtime.port,
            plan.runtime.argv().join(" ")
        ),
    }
}
