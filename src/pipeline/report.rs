//! Build reports and layer summaries

use crate::pipeline::layer::Layer;
use crate::pipeline::plan::BuildPlan;
use crate::pipeline::stage::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Display form of one layer
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub stage: Stage,
    pub digest: String,
    pub content_digest: Option<String>,
    pub instructions: Vec<String>,
}

impl From<&Layer> for LayerSummary {
    fn from(layer: &Layer) -> Self {
        Self {
            stage: layer.stage,
            digest: layer.digest.clone(),
            content_digest: layer.content_digest.clone(),
            instructions: layer.instructions.iter().map(|i| i.render()).collect(),
        }
    }
}

/// Summaries for every layer of a plan, bottom to top
pub fn summarize(plan: &BuildPlan) -> Vec<LayerSummary> {
    plan.layers.layers().iter().map(LayerSummary::from).collect()
}

/// Outcome of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Content-addressed image tag
    pub image_tag: String,
    /// Additional tags applied after the build
    pub extra_tags: Vec<String>,
    /// Engine that produced the image
    pub engine: String,
    pub layers: Vec<LayerSummary>,
    /// True when the image already existed and no build ran
    pub was_cached: bool,
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn new(plan: &BuildPlan, engine: &str, extra_tags: Vec<String>, was_cached: bool) -> Self {
        Self {
            image_tag: plan.image_tag(),
            extra_tags,
            engine: engine.to_string(),
            layers: summarize(plan),
            was_cached,
            finished_at: Utc::now(),
        }
    }
}
