//! Synthesizer for stacks nested inside another stack.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::assembly::CloudAssemblyBuilder;
use crate::asset::{DockerImageAssetLocation, DockerImageAssetSource, FileAssetLocation, FileAssetSource};
use crate::error::SynthError;
use crate::synthesizer::{StackSynthesizer, Synthesizer};
use crate::tree::{ConstructTree, NodeId};

/// Hands every asset to the synthesizer of the enclosing stack.
///
/// A nested stack is never deployed on its own, so it writes no artifact.
/// Its template reaches the assembly as a file asset of the parent.
#[derive(Debug)]
pub struct NestedSynthesizer {
  parent: Rc<RefCell<Synthesizer>>,
  stack: Option<NodeId>,
}

impl NestedSynthesizer {
  pub fn new(parent: Rc<RefCell<Synthesizer>>) -> Self {
    Self { parent, stack: None }
  }
}

impl StackSynthesizer for NestedSynthesizer {
  fn bind(&mut self, _tree: &ConstructTree, stack: NodeId) -> Result<(), SynthError> {
    self.stack = Some(stack);
    Ok(())
  }

  fn add_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError> {
    debug!(stack = ?self.stack, hash = %source.source_hash, "forwarding file asset to parent");
    let mut parent = self.parent.try_borrow_mut().map_err(|_| SynthError::Reentrant)?;
    parent.add_file_asset(tree, source)
  }

  fn add_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    debug!(stack = ?self.stack, hash = %source.source_hash, "forwarding image asset to parent");
    let mut parent = self.parent.try_borrow_mut().map_err(|_| SynthError::Reentrant)?;
    parent.add_docker_image_asset(tree, source)
  }

  fn write_stack_artifacts(
    &mut self,
    _tree: &ConstructTree,
    _assembly: &mut CloudAssemblyBuilder,
  ) -> Result<(), SynthError> {
    Ok(())
  }
}
