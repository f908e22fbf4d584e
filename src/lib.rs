//! Slipway - reproducible application server images
//!
//! Plans a Python web service image as five ordered stages (base,
//! toolchain, dependencies, source, runtime), each producing one
//! content-addressed layer, and builds it with Podman or Docker.

pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod orchestration;
pub mod pipeline;
pub mod ui;

pub use error::{SlipwayError, SlipwayResult};
