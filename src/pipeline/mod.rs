//! The five-stage image pipeline
//!
//! Base image, toolchain, dependencies, source and runtime declaration are
//! planned in that order into an append-only stack of content-addressed
//! layers, rendered to a Containerfile, and built by a container engine.

pub mod base;
pub mod containerfile;
pub mod context;
pub mod executor;
pub mod instruction;
pub mod layer;
pub mod plan;
pub mod report;
pub mod runtime;
pub mod source;
pub mod stage;
pub mod toolchain;

pub use containerfile::Containerfile;
pub use executor::{BuildOptions, Executor};
pub use layer::{Layer, LayerStack};
pub use plan::{plan_project, BuildPlan, PlanBuilder, PlanFailure};
pub use report::{summarize, BuildReport, LayerSummary};
pub use stage::{BuildState, Stage};
