//! Content-addressed layers and the append-only layer stack
//!
//! A layer digest chains its parent's digest with the stage id and the
//! layer's own inputs. Changing the inputs of stage N changes the digest of
//! N and of every later layer, and leaves earlier layers untouched.

use crate::error::SlipwayResult;
use crate::pipeline::instruction::Instruction;
use crate::pipeline::stage::{BuildState, Stage};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One immutable build layer
#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    /// Stage that produced this layer
    pub stage: Stage,

    /// Instructions rendered for this layer
    pub instructions: Vec<Instruction>,

    /// Digest of the content copied in by this layer, if any
    pub content_digest: Option<String>,

    /// Chained layer digest (hex)
    pub digest: String,
}

impl Layer {
    /// Short form of the digest for display and tags
    pub fn short_digest(&self) -> &str {
        &self.digest[..12]
    }
}

/// Ordered, append-only stack of layers
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
    state: BuildState,
}

impl LayerStack {
    /// Empty stack in the `Init` state
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            state: BuildState::Init,
        }
    }

    /// Append the layer for `stage`.
    ///
    /// Fails unless `stage` is the one that follows the top of the stack.
    pub fn push(
        &mut self,
        stage: Stage,
        instructions: Vec<Instruction>,
        content_digest: Option<String>,
    ) -> SlipwayResult<&Layer> {
        let next = self.state.transition(stage)?;

        let parent = self.layers.last().map(|l| l.digest.as_str()).unwrap_or("");
        let digest = chain_digest(parent, stage, &instructions, content_digest.as_deref());

        self.layers.push(Layer {
            stage,
            instructions,
            content_digest,
            digest,
        });
        self.state = next;

        Ok(&self.layers[self.layers.len() - 1])
    }

    /// Layers bottom to top
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer produced by `stage`, if it has run
    pub fn get(&self, stage: Stage) -> Option<&Layer> {
        self.layers.iter().find(|l| l.stage == stage)
    }

    /// Top layer
    pub fn top(&self) -> Option<&Layer> {
        self.layers.last()
    }

    /// Current state of the stack
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Whether every stage has produced its layer
    pub fn is_complete(&self) -> bool {
        self.state == BuildState::RuntimeDeclared
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

fn chain_digest(
    parent: &str,
    stage: Stage,
    instructions: &[Instruction],
    content_digest: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update([0u8]);
    hasher.update(stage.id().as_bytes());
    hasher.update([0u8]);
    for instruction in instructions {
        hasher.update(instruction.render().as_bytes());
        hasher.update(b"\n");
    }
    if let Some(content) = content_digest {
        hasher.update(content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cmd: &str) -> Vec<Instruction> {
        vec![Instruction::Run(cmd.to_string())]
    }

    fn full_stack(deps_content: &str, source_content: &str) -> LayerStack {
        let mut stack = LayerStack::new();
        stack
            .push(Stage::Base, vec![Instruction::From("python:3.12.7-slim".into())], None)
            .unwrap();
        stack.push(Stage::Toolchain, run("apt-get install gcc"), None).unwrap();
        stack
            .push(Stage::Dependencies, run("pip install"), Some(deps_content.into()))
            .unwrap();
        stack
            .push(Stage::Source, run("copy"), Some(source_content.into()))
            .unwrap();
        stack
            .push(Stage::Runtime, vec![Instruction::Expose(8000)], None)
            .unwrap();
        stack
    }

    fn digest(stack: &LayerStack, stage: Stage) -> String {
        stack.get(stage).unwrap().digest.clone()
    }

    #[test]
    fn identical_inputs_identical_digests() {
        let a = full_stack("deps", "src");
        let b = full_stack("deps", "src");
        for stage in Stage::ORDER {
            assert_eq!(digest(&a, stage), digest(&b, stage));
        }
        assert!(a.is_complete());
    }

    #[test]
    fn source_change_keeps_dependency_layer() {
        let a = full_stack("deps", "src-v1");
        let b = full_stack("deps", "src-v2");
        assert_eq!(digest(&a, Stage::Dependencies), digest(&b, Stage::Dependencies));
        assert_ne!(digest(&a, Stage::Source), digest(&b, Stage::Source));
        assert_ne!(digest(&a, Stage::Runtime), digest(&b, Stage::Runtime));
    }

    #[test]
    fn manifest_change_invalidates_from_install_onward() {
        let a = full_stack("deps-v1", "src");
        let b = full_stack("deps-v2", "src");
        assert_eq!(digest(&a, Stage::Base), digest(&b, Stage::Base));
        assert_eq!(digest(&a, Stage::Toolchain), digest(&b, Stage::Toolchain));
        assert_ne!(digest(&a, Stage::Dependencies), digest(&b, Stage::Dependencies));
        assert_ne!(digest(&a, Stage::Source), digest(&b, Stage::Source));
        assert_ne!(digest(&a, Stage::Runtime), digest(&b, Stage::Runtime));
    }

    #[test]
    fn push_out_of_order_fails_and_leaves_stack_unchanged() {
        let mut stack = LayerStack::new();
        stack
            .push(Stage::Base, vec![Instruction::From("python:3.12.7".into())], None)
            .unwrap();
        assert!(stack.push(Stage::Source, run("copy"), None).is_err());
        assert_eq!(stack.layers().len(), 1);
        assert_eq!(stack.state(), BuildState::BaseSelected);
        assert_eq!(stack.top().unwrap().short_digest().len(), 12);
    }
}
