//! Cloud assembly manifest types.
//!
//! The assembly manifest (`manifest.json`) lists every artifact produced by a
//! synthesis run. Deployment tooling reads it to find templates, roles and the
//! asset manifests that must be published first.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": "5.0.0",
//!   "artifacts": {
//!     "Api.assets": { "type": "cdk:asset-manifest", "properties": { "file": "Api.assets.json" } },
//!     "Api": {
//!       "type": "aws:cloudformation:stack",
//!       "environment": "aws://unknown-account/unknown-region",
//!       "properties": { "templateFile": "Api.template.json", "requiresBootstrapStackVersion": 1 },
//!       "dependencies": ["Api.assets"]
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::MetadataEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactType {
  #[serde(rename = "aws:cloudformation:stack")]
  CloudFormationStack,
  #[serde(rename = "cdk:asset-manifest")]
  AssetManifest,
}

/// One artifact record in the assembly manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
  #[serde(rename = "type")]
  pub artifact_type: ArtifactType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub environment: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub properties: Option<ArtifactProperties>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<BTreeMap<String, Vec<MetadataEntry>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactProperties {
  Stack(StackProperties),
  AssetManifest(AssetManifestProperties),
}

/// Properties of a stack artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackProperties {
  pub template_file: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_arn: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cloud_formation_execution_role_arn: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stack_template_asset_object_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub requires_bootstrap_stack_version: Option<u32>,
  /// Omitted when equal to the artifact id; deployment tools then use the id.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stack_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifestProperties {
  pub file: String,
}

/// Stack artifact properties contributed by a synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackArtifactOptions {
  pub assume_role_arn: Option<String>,
  pub cloud_formation_execution_role_arn: Option<String>,
  pub stack_template_asset_object_url: Option<String>,
  pub requires_bootstrap_stack_version: Option<u32>,
}

/// The assembly manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyManifest {
  pub version: String,
  #[serde(default)]
  pub artifacts: BTreeMap<String, ArtifactManifest>,
}

impl AssemblyManifest {
  /// Stack artifacts only, keyed by artifact id.
  pub fn stacks(&self) -> impl Iterator<Item = (&String, &ArtifactManifest)> {
    self
      .artifacts
      .iter()
      .filter(|(_, a)| a.artifact_type == ArtifactType::CloudFormationStack)
  }

  pub fn stack_properties(&self, artifact_id: &str) -> Option<&StackProperties> {
    match self.artifacts.get(artifact_id)?.properties.as_ref()? {
      ArtifactProperties::Stack(props) => Some(props),
      ArtifactProperties::AssetManifest(_) => None,
    }
  }
}
