//! Asset sources and the locations returned for them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// How a file asset is packaged for upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileAssetPackaging {
  /// Uploaded as is.
  #[default]
  #[serde(rename = "file")]
  File,
  /// A directory zipped before upload.
  #[serde(rename = "zip")]
  ZipDirectory,
}

impl FileAssetPackaging {
  pub fn as_str(self) -> &'static str {
    match self {
      FileAssetPackaging::File => "file",
      FileAssetPackaging::ZipDirectory => "zip",
    }
  }
}

/// A local file (or directory) that must be uploaded before deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssetSource {
  /// Content hash identifying the asset.
  pub source_hash: String,
  /// Path of the file, relative to the assembly directory or absolute.
  pub file_name: String,
  #[serde(default)]
  pub packaging: FileAssetPackaging,
}

/// A container image built from a local directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageAssetSource {
  pub source_hash: String,
  /// Directory holding the build context.
  pub directory_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_file: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_build_args: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_build_target: Option<String>,
  /// Repository to push to; only honored by the legacy synthesizer.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository_name: Option<String>,
}

/// Where a file asset will be found once published.
///
/// Values may still be deploy-time expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssetLocation {
  pub bucket_name: Expr,
  pub object_key: Expr,
  /// HTTPS URL of the object. Same value as `http_url`.
  pub s3_url: Expr,
  pub http_url: Expr,
  /// `s3://bucket/key` form of the object location.
  pub s3_object_url: Expr,
}

/// Where a container image asset will be found once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageAssetLocation {
  pub repository_name: Expr,
  pub image_uri: Expr,
}
