//! Implementation of the `synth list` command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use super::load_tree;
use crate::output::{OutputFormat, print_field, print_heading, print_json};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StackSummary {
  path: String,
  artifact_id: String,
  stack_name: String,
  environment: String,
  synthesizer: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  nested_in: Option<String>,
}

pub fn cmd_list(app: &Path, context: Vec<(String, Value)>, format: OutputFormat) -> Result<()> {
  let tree = load_tree(app, context)?;

  let mut stacks = Vec::new();
  for id in tree.stacks() {
    let stack = tree.stack(id)?;
    let nested_in = match stack.nested_parent {
      Some(parent) => Some(tree.stack(parent)?.artifact_id.clone()),
      None => None,
    };
    stacks.push(StackSummary {
      path: tree.path(id),
      artifact_id: stack.artifact_id.clone(),
      stack_name: stack.stack_name.clone(),
      environment: stack.environment.to_assembly_string(),
      synthesizer: stack.synthesizer.borrow().kind(),
      nested_in,
    });
  }

  if format.is_json() {
    return print_json(&stacks);
  }

  for stack in &stacks {
    print_heading(if stack.nested_in.is_some() { "nested" } else { "stack" }, &stack.path);
    print_field("artifact", &stack.artifact_id);
    if stack.stack_name != stack.artifact_id {
      print_field("stack name", &stack.stack_name);
    }
    print_field("environment", &stack.environment);
    print_field("synthesizer", stack.synthesizer);
    if let Some(parent) = &stack.nested_in {
      print_field("nested in", parent);
    }
  }
  Ok(())
}
