//! Synthesis driver.
//!
//! Renders every stack template into the output directory and lets each
//! stack's synthesizer write its artifacts. Stacks are visited children
//! first: a nested stack's template must exist before its parent is written,
//! since the parent publishes it as a file asset and points an
//! `AWS::CloudFormation::Stack` resource at it.
//!
//! A nested template may refer to parameters declared by an enclosing stack
//! (legacy asset parameters are always declared on the top-level stack).
//! Such parameters are declared again in the nested template and passed down
//! through the nested stack resource's `Parameters`.

use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::assembly::{AssemblyManifest, CloudAssemblyBuilder};
use crate::asset::{FileAssetPackaging, FileAssetSource};
use crate::error::SynthError;
use crate::placeholder::placeholders;
use crate::synthesizer::{self, StackSynthesizer};
use crate::tree::{ConstructTree, NodeId};
use crate::util::hash::hash_bytes;

/// Resource type used for a nested stack inside its parent template.
pub const NESTED_STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// Synthesize all stacks of `tree` into a cloud assembly at `outdir`.
pub fn synthesize(tree: &mut ConstructTree, outdir: &Path) -> Result<AssemblyManifest, SynthError> {
  let mut assembly = CloudAssemblyBuilder::new(outdir)?;
  let stacks = tree.stacks_post_order();
  info!(outdir = %outdir.display(), stacks = stacks.len(), "synthesizing");

  for stack in stacks {
    let mut template = render_template(tree, stack)?;
    let nested_parent = tree.stack(stack)?.nested_parent;
    let inherited = match nested_parent {
      Some(_) => declare_inherited_parameters(tree, stack, &mut template)?,
      None => Vec::new(),
    };

    let template_file = tree.stack(stack)?.template_file.clone();
    assembly.write_json(&template_file, "stack template", &template)?;
    debug!(stack = %tree.path(stack), file = %template_file, "wrote template");

    if let Some(parent) = nested_parent {
      fold_into_parent(tree, stack, parent, &assembly, &inherited)?;
    }

    let synthesizer = Rc::clone(&tree.stack(stack)?.synthesizer);
    let mut synthesizer = synthesizer.try_borrow_mut().map_err(|_| SynthError::Reentrant)?;
    synthesizer.write_stack_artifacts(tree, &mut assembly)?;
  }

  assembly.build()
}

/// The stack's template body plus the parameters declared inside it.
pub fn render_template(tree: &ConstructTree, stack: NodeId) -> Result<Value, SynthError> {
  let mut template = tree.stack(stack)?.template.clone();

  let parameters: Map<String, Value> = tree
    .owned_nodes(stack)
    .into_iter()
    .filter_map(|node| tree.parameter(node))
    .map(|p| (p.logical_id.clone(), p.to_template_value()))
    .collect();
  if !parameters.is_empty() {
    template.insert("Parameters".to_string(), Value::Object(parameters));
  }

  Ok(Value::Object(template))
}

/// Declare in `template` every parameter of an enclosing stack that it
/// refers to. Returns the declared logical ids.
fn declare_inherited_parameters(
  tree: &ConstructTree,
  nested: NodeId,
  template: &mut Value,
) -> Result<Vec<String>, SynthError> {
  let mut enclosing = Map::new();
  let mut current = tree.stack(nested)?.nested_parent;
  while let Some(stack) = current {
    for node in tree.owned_nodes(stack) {
      if let Some(p) = tree.parameter(node) {
        enclosing
          .entry(p.logical_id.clone())
          .or_insert_with(|| p.to_template_value());
      }
    }
    current = tree.stack(stack)?.nested_parent;
  }

  let mut referenced = BTreeSet::new();
  collect_references(template, &mut referenced);

  let Some(body) = template.as_object_mut() else {
    return Ok(Vec::new());
  };
  let declared = body
    .entry("Parameters")
    .or_insert_with(|| Value::Object(Map::new()));
  let Some(declared) = declared.as_object_mut() else {
    return Ok(Vec::new());
  };

  let mut inherited = Vec::new();
  for name in referenced {
    if declared.contains_key(&name) {
      continue;
    }
    if let Some(declaration) = enclosing.get(&name) {
      declared.insert(name.clone(), declaration.clone());
      inherited.push(name);
    }
  }
  if declared.is_empty() {
    body.remove("Parameters");
  }

  if !inherited.is_empty() {
    debug!(nested = %tree.path(nested), parameters = inherited.len(), "declared inherited parameters");
  }
  Ok(inherited)
}

/// Names used by `Ref` objects and `Fn::Sub` markers anywhere in `value`.
fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
  match value {
    Value::Object(map) => {
      if let Some(Value::String(name)) = map.get("Ref") {
        out.insert(name.clone());
      }
      // `Fn::Sub` is either a string or `[string, variables]`
      let sub = match map.get("Fn::Sub") {
        Some(Value::Array(items)) => items.first(),
        other => other,
      };
      if let Some(Ok(found)) = sub.and_then(Value::as_str).map(placeholders) {
        out.extend(found.iter().map(|p| p.name().to_string()));
      }
      map.values().for_each(|v| collect_references(v, out));
    }
    Value::Array(items) => items.iter().for_each(|v| collect_references(v, out)),
    _ => {}
  }
}

fn fold_into_parent(
  tree: &mut ConstructTree,
  nested: NodeId,
  parent: NodeId,
  assembly: &CloudAssemblyBuilder,
  inherited: &[String],
) -> Result<(), SynthError> {
  let template_file = tree.stack(nested)?.template_file.clone();
  let content = assembly.read_file(&template_file)?;
  let source = FileAssetSource {
    source_hash: hash_bytes(&content).0,
    file_name: template_file,
    packaging: FileAssetPackaging::File,
  };

  let location = synthesizer::add_file_asset(tree, nested, &source)?;
  let logical_id = tree.logical_id(nested);
  let mut properties = Map::new();
  properties.insert("TemplateURL".to_string(), location.http_url.to_template_value());
  if !inherited.is_empty() {
    let passed: Map<String, Value> = inherited
      .iter()
      .map(|name| (name.clone(), json!({ "Ref": name })))
      .collect();
    properties.insert("Parameters".to_string(), Value::Object(passed));
  }
  tree.stack_mut(parent)?.add_resource(
    logical_id.clone(),
    json!({ "Type": NESTED_STACK_RESOURCE_TYPE, "Properties": properties }),
  );

  debug!(nested = %tree.path(nested), resource = %logical_id, "folded nested stack into parent");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assembly::ArtifactType;
  use crate::asset::AssetManifest;
  use crate::tree::{MetadataEntry, StackProps};
  use crate::util::testutil::{add_stack, default, file_source, legacy};
  use std::fs;

  fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
  }

  fn template_of(tree: &ConstructTree, stack: NodeId, outdir: &Path) -> Value {
    read_json(&outdir.join(&tree.stack(stack).unwrap().template_file))
  }

  fn references(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_references(value, &mut out);
    out
  }

  /// Every `Ref` is a pseudo parameter, a declared parameter or a resource.
  fn assert_references_resolve(template: &Value) {
    let empty = Map::new();
    let parameters = template["Parameters"].as_object().unwrap_or(&empty);
    let resources = template["Resources"].as_object().unwrap_or(&empty);
    for name in references(template) {
      assert!(
        name.starts_with("AWS::") || parameters.contains_key(&name) || resources.contains_key(&name),
        "unresolved reference {name} in {template}"
      );
    }
  }

  fn nested_resource_parameters(template: &Value) -> Map<String, Value> {
    template["Resources"]
      .as_object()
      .unwrap()
      .values()
      .find(|r| r["Type"] == NESTED_STACK_RESOURCE_TYPE)
      .and_then(|r| r["Properties"]["Parameters"].as_object().cloned())
      .unwrap_or_default()
  }

  #[test]
  fn default_stack_with_nested_child() {
    let temp = tempfile::tempdir().unwrap();
    let mut tree = ConstructTree::new();
    let parent = add_stack(&mut tree, "Parent", default());
    tree
      .stack_mut(parent)
      .unwrap()
      .add_resource("Queue", json!({ "Type": "AWS::SQS::Queue" }));
    let nested = tree.add_nested_stack(parent, "Child", StackProps::default()).unwrap();
    let inner = tree.add_construct(nested, "Topic").unwrap();
    tree.add_metadata(inner, MetadataEntry::new("info", json!("nested only")));

    let manifest = synthesize(&mut tree, temp.path()).unwrap();

    // nested stacks produce no artifact of their own
    assert_eq!(
      manifest.artifacts.keys().collect::<Vec<_>>(),
      vec!["Parent", "Parent.assets"]
    );
    assert_eq!(manifest.artifacts["Parent.assets"].artifact_type, ArtifactType::AssetManifest);
    assert!(manifest.artifacts["Parent"].metadata.is_none());

    let template = read_json(&temp.path().join("Parent.template.json"));
    let resources = template["Resources"].as_object().unwrap();
    let nested_resource = resources
      .values()
      .find(|r| r["Type"] == NESTED_STACK_RESOURCE_TYPE)
      .unwrap();
    let url = nested_resource["Properties"]["TemplateURL"]["Fn::Sub"].as_str().unwrap();
    assert!(url.starts_with("https://s3.${AWS::Region}.${AWS::URLSuffix}/"), "{url}");

    let assets: AssetManifest =
      serde_json::from_value(read_json(&temp.path().join("Parent.assets.json"))).unwrap();
    let paths: Vec<&str> = assets.files.values().map(|f| f.source.path.as_str()).collect();
    assert!(
      paths
        .iter()
        .any(|p| p.starts_with("ParentChild") && p.ends_with(".nested.template.json"))
    );
    assert!(paths.contains(&"Parent.template.json"));
    assert!(temp.path().join("manifest.json").exists());
  }

  #[test]
  fn legacy_parent_passes_asset_parameters_to_nested_child() {
    let temp = tempfile::tempdir().unwrap();
    let mut tree = ConstructTree::new();
    let parent = add_stack(&mut tree, "Parent", legacy());
    let nested = tree.add_nested_stack(parent, "Child", StackProps::default()).unwrap();
    let source = file_source("abc123", FileAssetPackaging::File);
    let location = synthesizer::add_file_asset(&mut tree, nested, &source).unwrap();
    tree.stack_mut(nested).unwrap().add_output("Url", &location.http_url);

    synthesize(&mut tree, temp.path()).unwrap();

    let child = template_of(&tree, nested, temp.path());
    assert_references_resolve(&child);
    let inherited = child["Parameters"].as_object().unwrap();
    // bucket and key; the artifact hash is never referenced
    assert_eq!(inherited.len(), 2);
    assert!(inherited.keys().all(|k| k.starts_with("AssetParametersabc123")));
    assert!(inherited.values().all(|p| p["Type"] == "String"));

    let parent_template = template_of(&tree, parent, temp.path());
    assert_references_resolve(&parent_template);
    let passed = nested_resource_parameters(&parent_template);
    assert_eq!(passed.keys().collect::<Vec<_>>(), inherited.keys().collect::<Vec<_>>());
    for (name, value) in &passed {
      assert_eq!(value, &json!({ "Ref": name }));
    }
  }

  #[test]
  fn inherited_parameters_pass_through_every_level() {
    let temp = tempfile::tempdir().unwrap();
    let mut tree = ConstructTree::new();
    let root = add_stack(&mut tree, "Root", legacy());
    let middle = tree.add_nested_stack(root, "Middle", StackProps::default()).unwrap();
    let inner = tree.add_nested_stack(middle, "Inner", StackProps::default()).unwrap();
    let source = file_source("feed42", FileAssetPackaging::ZipDirectory);
    let location = synthesizer::add_file_asset(&mut tree, inner, &source).unwrap();
    tree.stack_mut(inner).unwrap().add_output("Key", &location.object_key);

    synthesize(&mut tree, temp.path()).unwrap();

    let inner_template = template_of(&tree, inner, temp.path());
    let middle_template = template_of(&tree, middle, temp.path());
    let root_template = template_of(&tree, root, temp.path());
    for template in [&inner_template, &middle_template, &root_template] {
      assert_references_resolve(template);
    }

    let key_parameter: Vec<&String> = inner_template["Parameters"].as_object().unwrap().keys().collect();
    assert_eq!(key_parameter.len(), 1);
    assert!(middle_template["Parameters"].get(key_parameter[0]).is_some());
    assert!(nested_resource_parameters(&middle_template).contains_key(key_parameter[0]));
    assert!(nested_resource_parameters(&root_template).contains_key(key_parameter[0]));
  }

  #[test]
  fn default_parent_passes_no_parameters() {
    let temp = tempfile::tempdir().unwrap();
    let mut tree = ConstructTree::new();
    let parent = add_stack(&mut tree, "Parent", default());
    let nested = tree.add_nested_stack(parent, "Child", StackProps::default()).unwrap();
    let source = file_source("abc123", FileAssetPackaging::File);
    let location = synthesizer::add_file_asset(&mut tree, nested, &source).unwrap();
    tree.stack_mut(nested).unwrap().add_output("Url", &location.http_url);

    synthesize(&mut tree, temp.path()).unwrap();

    let child = template_of(&tree, nested, temp.path());
    assert!(child.get("Parameters").is_none());
    assert!(nested_resource_parameters(&template_of(&tree, parent, temp.path())).is_empty());
  }

  #[test]
  fn legacy_parameters_rendered_into_template() {
    let temp = tempfile::tempdir().unwrap();
    let mut tree = ConstructTree::new();
    let stack = add_stack(&mut tree, "Old", legacy());
    let source = file_source("abc123", FileAssetPackaging::File);
    let location = synthesizer::add_file_asset(&mut tree, stack, &source).unwrap();
    tree.stack_mut(stack).unwrap().add_output("AssetUrl", &location.http_url);

    let manifest = synthesize(&mut tree, temp.path()).unwrap();

    let template = read_json(&temp.path().join("Old.template.json"));
    let parameters = template["Parameters"].as_object().unwrap();
    assert_eq!(parameters.len(), 3);
    assert!(parameters.values().all(|p| p["Type"] == "String"));
    assert!(template["Outputs"]["AssetUrl"]["Value"]["Fn::Join"].is_array());

    let artifact = &manifest.artifacts["Old"];
    assert!(artifact.dependencies.is_none());
    let props = manifest.stack_properties("Old").unwrap();
    assert!(props.assume_role_arn.is_none());
    assert!(props.requires_bootstrap_stack_version.is_none());
    assert_eq!(artifact.metadata.as_ref().unwrap()["/Old"].len(), 1);
  }
}
