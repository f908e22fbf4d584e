//! UI module for consistent CLI output
//!
//! Uses `cliclack` for styled logs and spinners with automatic fallback to
//! plain output in CI/non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use slipway::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! ui::intro(&ctx, "slipway build");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Checking container engine...");
//! // ... do work ...
//! spinner.stop("Podman ready");
//!
//! ui::outro_success(&ctx, "Built slipway-app:3f9a0c1d2e4b");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_success, stage_ok, step_info, step_ok_detail, step_warn_hint,
};
pub use progress::{BuildProgress, TaskSpinner};
