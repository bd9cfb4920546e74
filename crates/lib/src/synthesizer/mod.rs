//! Stack synthesizers.
//!
//! A synthesizer decides where a stack's assets are published and how the
//! stack artifact is written to the cloud assembly. Three variants exist:
//!
//! - [`DefaultSynthesizer`] - bootstrap resources with well-known names, an
//!   asset manifest per stack and a template published as an asset
//! - [`LegacySynthesizer`] - template parameters per asset, no manifest
//! - [`NestedSynthesizer`] - forwards everything to the enclosing stack's
//!   synthesizer
//!
//! Each stack owns its synthesizer through an `Rc<RefCell<Synthesizer>>`; a
//! nested stack's synthesizer holds another handle to its parent's cell.
//! Registration goes through [`add_file_asset`] and [`add_docker_image_asset`],
//! which take the cell's borrow for the duration of the call. Entering the
//! same synthesizer again while that borrow is held is reported as
//! [`SynthError::Reentrant`].

mod default;
mod legacy;
mod nested;

use std::rc::Rc;

pub use default::{DefaultSynthesizer, DefaultSynthesizerProps};
pub use legacy::LegacySynthesizer;
pub use nested::NestedSynthesizer;

use crate::assembly::CloudAssemblyBuilder;
use crate::asset::{DockerImageAssetLocation, DockerImageAssetSource, FileAssetLocation, FileAssetSource};
use crate::error::SynthError;
use crate::expr::Expr;
use crate::tree::{ConstructTree, NodeId};

/// Operations every synthesizer variant provides.
pub trait StackSynthesizer {
  /// Attach the synthesizer to `stack`. Called exactly once, before anything else.
  fn bind(&mut self, tree: &ConstructTree, stack: NodeId) -> Result<(), SynthError>;

  fn add_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError>;

  fn add_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError>;

  /// Emit the stack's artifacts once its template has been written.
  fn write_stack_artifacts(
    &mut self,
    tree: &ConstructTree,
    assembly: &mut CloudAssemblyBuilder,
  ) -> Result<(), SynthError>;
}

/// The synthesizer variants a stack can be created with.
#[derive(Debug)]
pub enum Synthesizer {
  Default(DefaultSynthesizer),
  Legacy(LegacySynthesizer),
  Nested(NestedSynthesizer),
}

impl Synthesizer {
  pub fn kind(&self) -> &'static str {
    match self {
      Synthesizer::Default(_) => "default",
      Synthesizer::Legacy(_) => "legacy",
      Synthesizer::Nested(_) => "nested",
    }
  }

  fn inner(&mut self) -> &mut dyn StackSynthesizer {
    match self {
      Synthesizer::Default(s) => s,
      Synthesizer::Legacy(s) => s,
      Synthesizer::Nested(s) => s,
    }
  }
}

impl StackSynthesizer for Synthesizer {
  fn bind(&mut self, tree: &ConstructTree, stack: NodeId) -> Result<(), SynthError> {
    self.inner().bind(tree, stack)
  }

  fn add_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError> {
    self.inner().add_file_asset(tree, source)
  }

  fn add_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    self.inner().add_docker_image_asset(tree, source)
  }

  fn write_stack_artifacts(
    &mut self,
    tree: &ConstructTree,
    assembly: &mut CloudAssemblyBuilder,
  ) -> Result<(), SynthError> {
    self.inner().write_stack_artifacts(tree, assembly)
  }
}

/// Performs the actual asset registration of a synthesizer.
///
/// Handed to an [`AssetHook`] as the "next" step of the chain.
pub trait AssetRegistrar {
  fn register_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError>;

  fn register_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError>;
}

/// Intercepts asset registration on a stack using the legacy synthesizer.
///
/// The default methods call straight through to `next`. An implementation
/// may inspect or rewrite the source, post-process the returned location, or
/// skip `next` entirely.
pub trait AssetHook {
  fn add_file_asset(
    &self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
    next: &mut dyn AssetRegistrar,
  ) -> Result<FileAssetLocation, SynthError> {
    next.register_file_asset(tree, source)
  }

  fn add_docker_image_asset(
    &self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
    next: &mut dyn AssetRegistrar,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    next.register_docker_image_asset(tree, source)
  }
}

/// Register a file asset with the synthesizer of `stack`.
pub fn add_file_asset(
  tree: &mut ConstructTree,
  stack: NodeId,
  source: &FileAssetSource,
) -> Result<FileAssetLocation, SynthError> {
  let synthesizer = Rc::clone(&tree.stack(stack)?.synthesizer);
  let mut synthesizer = synthesizer.try_borrow_mut().map_err(|_| SynthError::Reentrant)?;
  synthesizer.add_file_asset(tree, source)
}

/// Register a container image asset with the synthesizer of `stack`.
pub fn add_docker_image_asset(
  tree: &mut ConstructTree,
  stack: NodeId,
  source: &DockerImageAssetSource,
) -> Result<DockerImageAssetLocation, SynthError> {
  let synthesizer = Rc::clone(&tree.stack(stack)?.synthesizer);
  let mut synthesizer = synthesizer.try_borrow_mut().map_err(|_| SynthError::Reentrant)?;
  synthesizer.add_docker_image_asset(tree, source)
}

/// Build one string expression out of `parts`.
///
/// When every part has a substitution form the result is a single
/// [`Expr::Sub`] (or a literal when nothing is left to substitute); otherwise
/// the parts are joined.
pub(crate) fn interpolate(parts: Vec<Expr>) -> Expr {
  let fragments: Option<Vec<String>> = parts.iter().map(Expr::to_sub_fragment).collect();
  match fragments {
    Some(_) if parts.iter().all(Expr::is_resolved) => {
      Expr::Literal(parts.iter().filter_map(Expr::as_literal).collect())
    }
    Some(fragments) => Expr::Sub(fragments.concat()),
    None => Expr::concat(parts),
  }
}
