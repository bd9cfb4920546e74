//! Node and stack types stored in the construct tree.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::consts::{UNKNOWN_ACCOUNT, UNKNOWN_REGION};
use crate::expr::Expr;
use crate::synthesizer::{AssetHook, Synthesizer};

/// Index of a node in a [`ConstructTree`](super::ConstructTree).
///
/// Ids are only handed out by the tree that owns the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// A metadata entry attached to a construct.
///
/// # Example
///
/// ```json
/// { "type": "aws:cdk:asset", "data": { "id": "abc123", "packaging": "file" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
  #[serde(rename = "type")]
  pub entry_type: String,
  #[serde(default, skip_serializing_if = "Value::is_null")]
  pub data: Value,
}

impl MetadataEntry {
  pub fn new(entry_type: impl Into<String>, data: Value) -> Self {
    Self {
      entry_type: entry_type.into(),
      data,
    }
  }
}

/// A single node of the construct tree.
#[derive(Debug)]
pub struct Node {
  /// Id of the node, unique among its siblings.
  pub id: String,
  /// Non-owning back-reference to the enclosing scope.
  pub parent: Option<NodeId>,
  pub children: Vec<NodeId>,
  pub metadata: Vec<MetadataEntry>,
  pub context: BTreeMap<String, Value>,
  pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
  /// The application root.
  Root,
  /// A plain scope with no behavior of its own.
  Construct,
  /// A template parameter.
  Parameter(Parameter),
  /// A deployment unit.
  Stack(Box<Stack>),
}

/// A template parameter declared by a construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
  pub logical_id: String,
  pub param_type: String,
  pub description: Option<String>,
}

impl Parameter {
  /// Reference to the parameter's deploy-time value.
  pub fn value(&self) -> Expr {
    Expr::reference(&self.logical_id)
  }

  pub fn to_template_value(&self) -> Value {
    let mut param = Map::new();
    param.insert("Type".to_string(), Value::String(self.param_type.clone()));
    if let Some(description) = &self.description {
      param.insert("Description".to_string(), Value::String(description.clone()));
    }
    Value::Object(param)
  }
}

/// Target account and region of a stack.
///
/// Either value is a [`Expr::Literal`] when pinned, or the matching pseudo
/// parameter reference for environment-agnostic stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
  pub account: Expr,
  pub region: Expr,
}

impl Environment {
  pub fn new(account: Option<String>, region: Option<String>) -> Self {
    Self {
      account: account.map(Expr::Literal).unwrap_or_else(Expr::account_id),
      region: region.map(Expr::Literal).unwrap_or_else(Expr::region),
    }
  }

  /// Environment-agnostic: neither account nor region is known.
  pub fn agnostic() -> Self {
    Self::new(None, None)
  }

  /// `aws://{account}/{region}`, with `unknown-*` for unresolved values.
  pub fn to_assembly_string(&self) -> String {
    format!(
      "aws://{}/{}",
      self.account.resolved_or(UNKNOWN_ACCOUNT),
      self.region.resolved_or(UNKNOWN_REGION)
    )
  }
}

impl Default for Environment {
  fn default() -> Self {
    Self::agnostic()
  }
}

/// User-facing options for a new stack.
#[derive(Debug, Clone, Default)]
pub struct StackProps {
  /// Physical stack name; defaults to the artifact id.
  pub stack_name: Option<String>,
  pub account: Option<String>,
  pub region: Option<String>,
  pub tags: BTreeMap<String, String>,
}

/// A deployment unit and its synthesis state.
pub struct Stack {
  pub artifact_id: String,
  pub stack_name: String,
  pub environment: Environment,
  pub url_suffix: Expr,
  /// Template file name relative to the assembly directory.
  pub template_file: String,
  pub tags: BTreeMap<String, String>,
  /// Stacks that must be deployed before this one.
  pub dependencies: Vec<NodeId>,
  /// Set for nested stacks: the stack this one is folded into.
  pub nested_parent: Option<NodeId>,
  /// Template body (resources, outputs, ...) provided by the caller.
  pub template: Map<String, Value>,
  /// Optional override of asset registration, honored by the legacy synthesizer.
  pub asset_hook: Option<Rc<dyn AssetHook>>,
  pub synthesizer: Rc<RefCell<Synthesizer>>,
}

impl Stack {
  pub fn is_nested(&self) -> bool {
    self.nested_parent.is_some()
  }

  /// Insert `key` into a top-level template section. A section that is not
  /// an object is replaced.
  fn insert_into(&mut self, section: &str, key: String, value: Value) {
    let entry = self
      .template
      .entry(section.to_string())
      .or_insert_with(|| Value::Object(Map::new()));
    if let Some(map) = entry.as_object_mut() {
      map.insert(key, value);
      return;
    }
    let mut map = Map::new();
    map.insert(key, value);
    *entry = Value::Object(map);
  }

  pub fn add_resource(&mut self, logical_id: impl Into<String>, resource: Value) {
    self.insert_into("Resources", logical_id.into(), resource);
  }

  pub fn add_output(&mut self, name: impl Into<String>, value: &Expr) {
    let output = json!({ "Value": value.to_template_value() });
    self.insert_into("Outputs", name.into(), output);
  }
}

impl fmt::Debug for Stack {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Stack")
      .field("artifact_id", &self.artifact_id)
      .field("stack_name", &self.stack_name)
      .field("environment", &self.environment)
      .field("template_file", &self.template_file)
      .field("nested_parent", &self.nested_parent)
      .field("has_asset_hook", &self.asset_hook.is_some())
      .finish_non_exhaustive()
  }
}
