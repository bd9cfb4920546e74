//! Serde model of an application description file.
//!
//! # Example
//!
//! ```json
//! {
//!   "context": { "@aws-cdk/core:bootstrapQualifier": "myqual" },
//!   "stacks": [
//!     {
//!       "id": "Api",
//!       "region": "eu-west-1",
//!       "synthesizer": { "type": "default" },
//!       "tags": { "team": "platform" },
//!       "resources": { "Queue": { "Type": "AWS::SQS::Queue" } },
//!       "fileAssets": [{ "id": "Handler", "path": "handler" }],
//!       "nestedStacks": [{ "id": "Storage" }]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::asset::FileAssetPackaging;
use crate::synthesizer::DefaultSynthesizerProps;
use crate::tree::MetadataEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescription {
  /// Context values set on the application root.
  #[serde(default)]
  pub context: BTreeMap<String, Value>,
  #[serde(default)]
  pub stacks: Vec<StackDescription>,
}

/// Which synthesizer a stack is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SynthesizerConfig {
  Default(DefaultSynthesizerProps),
  Legacy,
}

impl Default for SynthesizerConfig {
  fn default() -> Self {
    SynthesizerConfig::Default(DefaultSynthesizerProps::default())
  }
}

/// A top-level stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDescription {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stack_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub account: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  #[serde(default)]
  pub synthesizer: SynthesizerConfig,
  /// Ids of stacks that must be deployed first.
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(flatten)]
  pub body: StackBody,
}

/// A stack nested inside another; it shares its parent's environment and
/// synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedStackDescription {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stack_name: Option<String>,
  #[serde(flatten)]
  pub body: StackBody,
}

/// Contents shared by top-level and nested stacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackBody {
  #[serde(default)]
  pub tags: BTreeMap<String, String>,
  /// Template resources copied verbatim.
  #[serde(default)]
  pub resources: Map<String, Value>,
  /// Metadata attached to the stack construct.
  #[serde(default)]
  pub metadata: Vec<MetadataEntry>,
  #[serde(default)]
  pub file_assets: Vec<FileAssetDescription>,
  #[serde(default)]
  pub docker_image_assets: Vec<DockerImageAssetDescription>,
  #[serde(default)]
  pub nested_stacks: Vec<NestedStackDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssetDescription {
  pub id: String,
  /// Relative to the description file.
  pub path: PathBuf,
  /// Defaults to `zip` for directories and `file` otherwise.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub packaging: Option<FileAssetPackaging>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageAssetDescription {
  pub id: String,
  /// Build context directory, relative to the description file.
  pub directory: PathBuf,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_file: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_args: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository_name: Option<String>,
}
