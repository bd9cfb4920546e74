//! Asset manifest: the list of assets a stack needs published.
//!
//! The manifest is content addressed: entries are keyed by source hash, so
//! registering the same content twice yields one entry. Each entry carries one
//! destination per environment key (`{account}-{region}`); registering from
//! the same environment again replaces that destination instead of adding a
//! second one. Entries and destinations keep first-registration order.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": "5.0.0",
//!   "files": {
//!     "abc123": {
//!       "source": { "path": "asset.abc123", "packaging": "zip" },
//!       "destinations": {
//!         "current_account-current_region": {
//!           "bucketName": "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}",
//!           "objectKey": "abc123.zip",
//!           "assumeRoleArn": "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/..."
//!         }
//!       }
//!     }
//!   },
//!   "dockerImages": {}
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::asset::types::{DockerImageAssetSource, FileAssetPackaging, FileAssetSource};
use crate::consts::{CURRENT_ACCOUNT, CURRENT_REGION, MANIFEST_SCHEMA_VERSION};
use crate::error::SynthError;
use crate::expr::Expr;

/// Serialized asset manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
  pub version: String,
  #[serde(default)]
  pub files: IndexMap<String, FileAsset>,
  #[serde(default)]
  pub docker_images: IndexMap<String, DockerImageAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAsset {
  pub source: FileSource,
  pub destinations: IndexMap<String, FileDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSource {
  pub path: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub packaging: Option<FileAssetPackaging>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDestination {
  pub bucket_name: String,
  pub object_key: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_arn: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerImageAsset {
  pub source: DockerImageSource,
  pub destinations: IndexMap<String, DockerImageDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageSource {
  pub directory: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_build_args: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_build_target: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageDestination {
  pub repository_name: String,
  pub image_tag: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_arn: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assume_role_external_id: Option<String>,
}

/// Key under which a destination is stored: `{account}-{region}`, using
/// `current_account` / `current_region` for values unknown at synthesis time.
pub fn environment_key(account: &Expr, region: &Expr) -> String {
  format!(
    "{}-{}",
    account.resolved_or(CURRENT_ACCOUNT),
    region.resolved_or(CURRENT_REGION)
  )
}

/// Accumulates asset registrations for one synthesis run.
#[derive(Debug, Clone, Default)]
pub struct AssetManifestBuilder {
  files: IndexMap<String, FileAsset>,
  docker_images: IndexMap<String, DockerImageAsset>,
}

impl AssetManifestBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a file asset destination.
  ///
  /// Returns `true` when this is the first registration of the source hash.
  pub fn add_file(&mut self, source: &FileAssetSource, env_key: &str, destination: FileDestination) -> bool {
    let mut created = false;
    let entry = self.files.entry(source.source_hash.clone()).or_insert_with(|| {
      created = true;
      FileAsset {
        source: FileSource {
          path: source.file_name.clone(),
          packaging: Some(source.packaging),
        },
        destinations: IndexMap::new(),
      }
    });
    entry.destinations.insert(env_key.to_string(), destination);

    debug!(
      hash = %source.source_hash,
      env = env_key,
      new_entry = created,
      "registered file asset"
    );
    created
  }

  /// Register a container image destination.
  ///
  /// Returns `true` when this is the first registration of the source hash.
  pub fn add_docker_image(
    &mut self,
    source: &DockerImageAssetSource,
    env_key: &str,
    destination: DockerImageDestination,
  ) -> bool {
    let mut created = false;
    let entry = self
      .docker_images
      .entry(source.source_hash.clone())
      .or_insert_with(|| {
        created = true;
        DockerImageAsset {
          source: DockerImageSource {
            directory: source.directory_name.clone(),
            docker_build_args: source.docker_build_args.clone(),
            docker_build_target: source.docker_build_target.clone(),
            docker_file: source.docker_file.clone(),
          },
          destinations: IndexMap::new(),
        }
      });
    entry.destinations.insert(env_key.to_string(), destination);

    debug!(
      hash = %source.source_hash,
      env = env_key,
      new_entry = created,
      "registered docker image asset"
    );
    created
  }

  pub fn build(&self) -> AssetManifest {
    AssetManifest {
      version: MANIFEST_SCHEMA_VERSION.to_string(),
      files: self.files.clone(),
      docker_images: self.docker_images.clone(),
    }
  }

  /// Serialize the manifest to `path` as pretty-printed JSON.
  pub fn write(&self, path: &Path) -> Result<(), SynthError> {
    let manifest = self.build();
    let content = serde_json::to_string_pretty(&manifest).map_err(|source| SynthError::Serialize {
      what: "asset manifest".to_string(),
      source,
    })?;
    fs::write(path, content).map_err(|source| SynthError::Write {
      path: path.to_path_buf(),
      source,
    })?;

    info!(
      path = %path.display(),
      files = manifest.files.len(),
      docker_images = manifest.docker_images.len(),
      "wrote asset manifest"
    );
    Ok(())
  }
}
