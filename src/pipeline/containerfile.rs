//! Containerfile rendering
//!
//! Each layer becomes a commented block of instructions. The renderer also
//! remembers which stage every instruction belongs to, so an engine failure
//! reported as `STEP N/M: <instruction>` can be traced back to its stage.

use crate::pipeline::plan::BuildPlan;
use crate::pipeline::stage::Stage;

/// A rendered Containerfile with its instruction-to-stage map
#[derive(Debug, Clone)]
pub struct Containerfile {
    text: String,
    steps: Vec<(String, Stage)>,
}

impl Containerfile {
    /// Render a plan
    pub fn render(plan: &BuildPlan) -> Self {
        let mut lines = Vec::new();
        let mut steps = Vec::new();

        lines.push(format!(
            "# {} (generated by slipway, do not edit)",
            plan.image.name
        ));

        for layer in plan.layers.layers() {
            lines.push(String::new());
            lines.push(format!("# stage: {} ({})", layer.stage, layer.short_digest()));

            if layer.instructions.is_empty() {
                lines.push("# (nothing to do)".to_string());
            }
            for instruction in &layer.instructions {
                let line = instruction.render();
                steps.push((line.clone(), layer.stage));
                lines.push(line);
            }
        }

        lines.push(String::new());

        Self {
            text: lines.join("\n"),
            steps,
        }
    }

    /// Full Containerfile text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of engine steps (instructions)
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Stage of the 1-based step `n`
    pub fn stage_for_step(&self, n: usize) -> Option<Stage> {
        n.checked_sub(1)
            .and_then(|i| self.steps.get(i))
            .map(|(_, stage)| *stage)
    }

    /// Stage whose instruction text matches an engine progress line
    pub fn stage_for_instruction(&self, instruction: &str) -> Option<Stage> {
        let instruction = instruction.trim();
        self.steps
            .iter()
            .find(|(line, _)| line == instruction)
            .or_else(|| {
                // Engines may truncate long RUN lines in their output
                self.steps
                    .iter()
                    .find(|(line, _)| instruction.len() >= 16 && line.starts_with(instruction))
            })
            .map(|(_, stage)| *stage)
    }
}
