//! Test helpers shared by the library's unit tests.

use crate::asset::{FileAssetPackaging, FileAssetSource};
use crate::synthesizer::{DefaultSynthesizer, LegacySynthesizer, Synthesizer};
use crate::tree::{ConstructTree, NodeId, StackProps};

pub fn legacy() -> Synthesizer {
  Synthesizer::Legacy(LegacySynthesizer::new())
}

pub fn default() -> Synthesizer {
  Synthesizer::Default(DefaultSynthesizer::new(Default::default()))
}

/// Add an environment-agnostic stack under the root.
pub fn add_stack(tree: &mut ConstructTree, id: &str, synthesizer: Synthesizer) -> NodeId {
  let root = tree.root();
  tree.add_stack(root, id, StackProps::default(), synthesizer).unwrap()
}

pub fn file_source(hash: &str, packaging: FileAssetPackaging) -> FileAssetSource {
  FileAssetSource {
    source_hash: hash.to_string(),
    file_name: format!("asset.{hash}"),
    packaging,
  }
}
