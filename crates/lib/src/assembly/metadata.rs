//! Collects construct metadata for a stack artifact.

use std::collections::BTreeMap;

use crate::tree::{ConstructTree, MetadataEntry, NodeId};

/// Gather metadata from every construct owned by `stack`, keyed by absolute path.
///
/// Traversal stops at nodes whose nearest enclosing stack is a different
/// stack, so the subtree of a nested stack never contributes entries here.
pub fn collect_stack_metadata(tree: &ConstructTree, stack: NodeId) -> BTreeMap<String, Vec<MetadataEntry>> {
  let mut output = BTreeMap::new();
  visit(tree, stack, stack, &mut output);
  output
}

fn visit(tree: &ConstructTree, stack: NodeId, node: NodeId, output: &mut BTreeMap<String, Vec<MetadataEntry>>) {
  if tree.nearest_stack(node) != Some(stack) {
    return;
  }

  let metadata = tree.metadata(node);
  if !metadata.is_empty() {
    // entries hold plain JSON data already, nothing left to resolve
    output.insert(tree.absolute_path(node), metadata.to_vec());
  }

  for child in tree.children(node) {
    visit(tree, stack, *child, output);
  }
}
