//! Emits the stack artifact record shared by all synthesizers.

use serde_json::Value;
use tracing::debug;

use crate::assembly::builder::CloudAssemblyBuilder;
use crate::assembly::metadata::collect_stack_metadata;
use crate::assembly::types::{ArtifactManifest, ArtifactProperties, ArtifactType, StackArtifactOptions, StackProperties};
use crate::consts::STACK_TAGS_METADATA;
use crate::error::SynthError;
use crate::tree::{ConstructTree, MetadataEntry, NodeId};

/// Add the artifact describing `stack` to the assembly.
///
/// Dependencies are the stack's own dependencies followed by
/// `extra_dependencies`; both `dependencies` and `metadata` are left out of
/// the record when empty. `stackName` is only written when it differs from
/// the artifact id.
pub fn add_stack_artifact_to_assembly(
  tree: &ConstructTree,
  stack: NodeId,
  assembly: &mut CloudAssemblyBuilder,
  options: StackArtifactOptions,
  extra_dependencies: &[String],
) -> Result<(), SynthError> {
  let s = tree.stack(stack)?;

  let mut dependencies = Vec::new();
  for dep in &s.dependencies {
    dependencies.push(tree.stack(*dep)?.artifact_id.clone());
  }
  dependencies.extend(extra_dependencies.iter().cloned());

  let mut metadata = collect_stack_metadata(tree, stack);
  if !s.tags.is_empty() {
    let tags: Vec<Value> = s
      .tags
      .iter()
      .map(|(key, value)| serde_json::json!({ "Key": key, "Value": value }))
      .collect();
    metadata
      .entry(tree.absolute_path(stack))
      .or_default()
      .push(MetadataEntry::new(STACK_TAGS_METADATA, Value::Array(tags)));
  }

  let stack_name = (s.stack_name != s.artifact_id).then(|| s.stack_name.clone());

  let properties = StackProperties {
    template_file: s.template_file.clone(),
    assume_role_arn: options.assume_role_arn,
    cloud_formation_execution_role_arn: options.cloud_formation_execution_role_arn,
    stack_template_asset_object_url: options.stack_template_asset_object_url,
    requires_bootstrap_stack_version: options.requires_bootstrap_stack_version,
    stack_name,
  };

  debug!(
    artifact = %s.artifact_id,
    dependencies = dependencies.len(),
    metadata_paths = metadata.len(),
    "adding stack artifact"
  );

  assembly.add_artifact(
    s.artifact_id.clone(),
    ArtifactManifest {
      artifact_type: ArtifactType::CloudFormationStack,
      environment: Some(s.environment.to_assembly_string()),
      properties: Some(ArtifactProperties::Stack(properties)),
      dependencies: (!dependencies.is_empty()).then_some(dependencies),
      metadata: (!metadata.is_empty()).then_some(metadata),
    },
  );
  Ok(())
}
