//! The construct tree.
//!
//! Constructs live in an arena owned by [`ConstructTree`]. Children are owned
//! by the tree and listed by their parent; the parent link on each node is a
//! plain [`NodeId`], so walking upwards never needs shared ownership.
//!
//! The tree provides the traversal the synthesizers rely on: scope lookup,
//! nearest enclosing stack, per-node metadata and context lookup.

mod types;

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

pub use types::*;

use crate::consts::{PATH_SEP, UNIQUE_ID_HASH_LEN};
use crate::error::SynthError;
use crate::expr::Expr;
use crate::synthesizer::{NestedSynthesizer, StackSynthesizer, Synthesizer};
use crate::util::hash::short_digest;

#[derive(Debug)]
pub struct ConstructTree {
  nodes: Vec<Node>,
}

impl Default for ConstructTree {
  fn default() -> Self {
    Self::new()
  }
}

impl ConstructTree {
  /// Create a tree holding only the application root.
  pub fn new() -> Self {
    Self {
      nodes: vec![Node {
        id: String::new(),
        parent: None,
        children: Vec::new(),
        metadata: Vec::new(),
        context: Default::default(),
        kind: NodeKind::Root,
      }],
    }
  }

  pub fn root(&self) -> NodeId {
    NodeId(0)
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id.0]
  }

  fn node_mut(&mut self, id: NodeId) -> &mut Node {
    &mut self.nodes[id.0]
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).parent
  }

  pub fn children(&self, id: NodeId) -> &[NodeId] {
    &self.node(id).children
  }

  pub fn try_find_child(&self, parent: NodeId, id: &str) -> Option<NodeId> {
    self.children(parent).iter().copied().find(|c| self.node(*c).id == id)
  }

  fn push(&mut self, parent: NodeId, id: &str, kind: NodeKind) -> Result<NodeId, SynthError> {
    if self.try_find_child(parent, id).is_some() {
      return Err(SynthError::DuplicateId {
        parent: self.path(parent),
        id: id.to_string(),
      });
    }

    let node_id = NodeId(self.nodes.len());
    self.nodes.push(Node {
      id: id.to_string(),
      parent: Some(parent),
      children: Vec::new(),
      metadata: Vec::new(),
      context: Default::default(),
      kind,
    });
    self.node_mut(parent).children.push(node_id);
    Ok(node_id)
  }

  /// Add a plain construct under `parent`.
  pub fn add_construct(&mut self, parent: NodeId, id: &str) -> Result<NodeId, SynthError> {
    self.push(parent, id, NodeKind::Construct)
  }

  /// Add a template parameter; its logical id is derived from its path.
  pub fn add_parameter(
    &mut self,
    parent: NodeId,
    id: &str,
    param_type: &str,
    description: Option<String>,
  ) -> Result<NodeId, SynthError> {
    let node = self.push(parent, id, NodeKind::Construct)?;
    let logical_id = self.logical_id(node);
    self.node_mut(node).kind = NodeKind::Parameter(Parameter {
      logical_id,
      param_type: param_type.to_string(),
      description,
    });
    Ok(node)
  }

  pub fn parameter(&self, id: NodeId) -> Option<&Parameter> {
    match &self.node(id).kind {
      NodeKind::Parameter(p) => Some(p),
      _ => None,
    }
  }

  /// Add a top-level (non-nested) stack and bind `synthesizer` to it.
  pub fn add_stack(
    &mut self,
    parent: NodeId,
    id: &str,
    props: StackProps,
    synthesizer: Synthesizer,
  ) -> Result<NodeId, SynthError> {
    let node = self.push(parent, id, NodeKind::Construct)?;
    let artifact_id = self.unique_id(node);
    let synthesizer = Rc::new(RefCell::new(synthesizer));

    let stack = Stack {
      stack_name: props.stack_name.unwrap_or_else(|| artifact_id.clone()),
      template_file: format!("{artifact_id}.template.json"),
      artifact_id,
      environment: Environment::new(props.account, props.region),
      url_suffix: Expr::url_suffix(),
      tags: props.tags,
      dependencies: Vec::new(),
      nested_parent: None,
      template: Default::default(),
      asset_hook: None,
      synthesizer: Rc::clone(&synthesizer),
    };
    self.node_mut(node).kind = NodeKind::Stack(Box::new(stack));

    debug!(stack = %self.path(node), "binding synthesizer");
    synthesizer.borrow_mut().bind(self, node)?;
    Ok(node)
  }

  /// Add a stack nested inside the stack enclosing `scope`.
  ///
  /// The nested stack inherits its parent's environment and gets a
  /// [`NestedSynthesizer`] that forwards asset registration to the parent's
  /// synthesizer.
  pub fn add_nested_stack(&mut self, scope: NodeId, id: &str, props: StackProps) -> Result<NodeId, SynthError> {
    let parent_stack = self
      .nearest_stack(scope)
      .ok_or_else(|| SynthError::NotAStack(self.path(scope)))?;
    let (environment, parent_synthesizer) = {
      let parent = self.stack(parent_stack)?;
      (parent.environment.clone(), Rc::clone(&parent.synthesizer))
    };

    let node = self.push(scope, id, NodeKind::Construct)?;
    let artifact_id = self.unique_id(node);
    let synthesizer = Rc::new(RefCell::new(Synthesizer::Nested(NestedSynthesizer::new(
      parent_synthesizer,
    ))));

    let stack = Stack {
      stack_name: props.stack_name.unwrap_or_else(|| artifact_id.clone()),
      template_file: format!("{artifact_id}.nested.template.json"),
      artifact_id,
      environment,
      url_suffix: Expr::url_suffix(),
      tags: props.tags,
      dependencies: Vec::new(),
      nested_parent: Some(parent_stack),
      template: Default::default(),
      asset_hook: None,
      synthesizer: Rc::clone(&synthesizer),
    };
    self.node_mut(node).kind = NodeKind::Stack(Box::new(stack));

    synthesizer.borrow_mut().bind(self, node)?;
    Ok(node)
  }

  pub fn is_stack(&self, id: NodeId) -> bool {
    matches!(self.node(id).kind, NodeKind::Stack(_))
  }

  pub fn stack(&self, id: NodeId) -> Result<&Stack, SynthError> {
    match &self.node(id).kind {
      NodeKind::Stack(stack) => Ok(stack),
      _ => Err(SynthError::NotAStack(self.path(id))),
    }
  }

  pub fn stack_mut(&mut self, id: NodeId) -> Result<&mut Stack, SynthError> {
    let path = self.path(id);
    match &mut self.node_mut(id).kind {
      NodeKind::Stack(stack) => Ok(stack),
      _ => Err(SynthError::NotAStack(path)),
    }
  }

  /// The node itself if it is a stack, else its closest stack ancestor.
  pub fn nearest_stack(&self, id: NodeId) -> Option<NodeId> {
    let mut current = Some(id);
    while let Some(node) = current {
      if self.is_stack(node) {
        return Some(node);
      }
      current = self.parent(node);
    }
    None
  }

  /// Record that `stack` must be deployed after `target`.
  pub fn add_dependency(&mut self, stack: NodeId, target: NodeId) -> Result<(), SynthError> {
    self.stack(target)?;
    let deps = &mut self.stack_mut(stack)?.dependencies;
    if !deps.contains(&target) {
      deps.push(target);
    }
    Ok(())
  }

  /// All stacks, parents before the stacks nested inside them.
  pub fn stacks(&self) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(self.root(), &mut |id| out.push(id), &mut |_| {});
    out.retain(|id| self.is_stack(*id));
    out
  }

  /// All stacks, nested stacks before the stack that contains them.
  pub fn stacks_post_order(&self) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(self.root(), &mut |_| {}, &mut |id| out.push(id));
    out.retain(|id| self.is_stack(*id));
    out
  }

  fn walk(&self, id: NodeId, pre: &mut dyn FnMut(NodeId), post: &mut dyn FnMut(NodeId)) {
    pre(id);
    for child in self.children(id) {
      self.walk(*child, pre, post);
    }
    post(id);
  }

  /// Nodes owned by `stack`: its subtree, excluding nested stack subtrees.
  pub fn owned_nodes(&self, stack: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut pending = vec![stack];
    while let Some(id) = pending.pop() {
      if self.nearest_stack(id) != Some(stack) {
        continue;
      }
      out.push(id);
      pending.extend(self.children(id).iter().rev());
    }
    out
  }

  pub fn add_metadata(&mut self, id: NodeId, entry: MetadataEntry) {
    self.node_mut(id).metadata.push(entry);
  }

  pub fn metadata(&self, id: NodeId) -> &[MetadataEntry] {
    &self.node(id).metadata
  }

  pub fn set_context(&mut self, id: NodeId, key: impl Into<String>, value: Value) {
    self.node_mut(id).context.insert(key.into(), value);
  }

  /// Look up a context value on the node or its closest ancestor that has it.
  pub fn try_get_context(&self, id: NodeId, key: &str) -> Option<&Value> {
    let mut current = Some(id);
    while let Some(node) = current {
      if let Some(value) = self.node(node).context.get(key) {
        return Some(value);
      }
      current = self.parent(node);
    }
    None
  }

  /// Ids from the root (exclusive) down to `id`.
  pub fn path_components(&self, id: NodeId) -> Vec<&str> {
    let mut components = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
      let n = self.node(node);
      if n.parent.is_some() {
        components.push(n.id.as_str());
      }
      current = n.parent;
    }
    components.reverse();
    components
  }

  /// Path relative to the root, e.g. `Stack/Bucket/Resource`.
  pub fn path(&self, id: NodeId) -> String {
    self.path_components(id).join(PATH_SEP)
  }

  /// Absolute path, e.g. `/Stack/Bucket/Resource`.
  pub fn absolute_path(&self, id: NodeId) -> String {
    format!("{PATH_SEP}{}", self.path(id))
  }

  /// Identifier unique within the application, derived from the full path.
  pub fn unique_id(&self, id: NodeId) -> String {
    make_unique_id(&self.path_components(id))
  }

  /// Identifier unique within the enclosing stack, used for template
  /// parameters and resources.
  pub fn logical_id(&self, id: NodeId) -> String {
    let components = self.path_components(id);
    let stack_depth = self
      .parent(id)
      .and_then(|p| self.nearest_stack(p))
      .map(|s| self.path_components(s).len())
      .unwrap_or(0);
    make_unique_id(&components[stack_depth..])
  }
}

/// Join path components into an alphanumeric identifier.
///
/// A single component is used as is (minus non-alphanumerics). Longer paths
/// get a digest of the full path appended so that different paths that
/// sanitize to the same text still yield distinct ids.
pub fn make_unique_id(components: &[&str]) -> String {
  let sanitize = |s: &str| s.chars().filter(char::is_ascii_alphanumeric).collect::<String>();

  if let [single] = components {
    return sanitize(single);
  }

  let mut human: Vec<String> = Vec::new();
  for component in components {
    let clean = sanitize(component);
    // Foo/Foo reads better as Foo
    if human.last() != Some(&clean) {
      human.push(clean);
    }
  }

  let digest = short_digest(&components.join(PATH_SEP), UNIQUE_ID_HASH_LEN);
  format!("{}{}", human.concat(), digest)
}
