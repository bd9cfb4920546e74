//! The legacy synthesizer.
//!
//! Each file asset gets three template parameters whose values are supplied by
//! the deploying tool; container images are pushed to a single shared
//! repository. Nothing is written besides the stack artifact itself.
//!
//! Stacks can intercept registration with an [`AssetHook`]. The hook receives
//! this synthesizer as its [`AssetRegistrar`] and decides whether and how to
//! call it.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::assembly::{CloudAssemblyBuilder, StackArtifactOptions, add_stack_artifact_to_assembly};
use crate::asset::{DockerImageAssetLocation, DockerImageAssetSource, FileAssetLocation, FileAssetSource};
use crate::consts::{
  ASSET_METADATA, ASSET_PREFIX_SEPARATOR, ASSETS_ECR_REPOSITORY_NAME, ASSETS_ECR_REPOSITORY_NAME_OVERRIDE_CONTEXT_KEY,
};
use crate::error::SynthError;
use crate::expr::Expr;
use crate::synthesizer::{AssetRegistrar, StackSynthesizer};
use crate::tree::{ConstructTree, MetadataEntry, NodeId};

const ASSET_PARAMETERS_ID: &str = "AssetParameters";
const BUCKET_PARAMETER_ID: &str = "S3Bucket";
const KEY_PARAMETER_ID: &str = "S3VersionKey";
const HASH_PARAMETER_ID: &str = "ArtifactHash";

#[derive(Debug, Default)]
pub struct LegacySynthesizer {
  stack: Option<NodeId>,
  /// Scope holding one child per file asset, created on first use.
  asset_parameters: Option<NodeId>,
  added_image_assets: BTreeSet<String>,
}

impl LegacySynthesizer {
  pub fn new() -> Self {
    Self::default()
  }

  fn bound_stack(&self) -> Result<NodeId, SynthError> {
    self.stack.ok_or(SynthError::NotBound)
  }

  fn asset_parameters_scope(&mut self, tree: &mut ConstructTree, stack: NodeId) -> Result<NodeId, SynthError> {
    if let Some(scope) = self.asset_parameters {
      return Ok(scope);
    }
    let scope = match tree.try_find_child(stack, ASSET_PARAMETERS_ID) {
      Some(existing) => existing,
      None => tree.add_construct(stack, ASSET_PARAMETERS_ID)?,
    };
    self.asset_parameters = Some(scope);
    Ok(scope)
  }

  fn parameter_logical_id(tree: &ConstructTree, scope: NodeId, id: &str) -> Result<String, SynthError> {
    tree
      .try_find_child(scope, id)
      .and_then(|node| tree.parameter(node))
      .map(|p| p.logical_id.clone())
      .ok_or_else(|| SynthError::UnknownNode(format!("{}/{id}", tree.path(scope))))
  }

  fn do_add_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError> {
    let stack = self.bound_stack()?;
    if source.file_name.contains(ASSET_PREFIX_SEPARATOR) {
      return Err(SynthError::InvalidAssetFileName(source.file_name.clone()));
    }

    let parameters = self.asset_parameters_scope(tree, stack)?;
    let hash = &source.source_hash;

    let asset_scope = match tree.try_find_child(parameters, hash) {
      Some(existing) => existing,
      None => {
        let scope = tree.add_construct(parameters, hash)?;
        let bucket = tree.add_parameter(
          scope,
          BUCKET_PARAMETER_ID,
          "String",
          Some(format!("S3 bucket for asset \"{hash}\"")),
        )?;
        let key = tree.add_parameter(
          scope,
          KEY_PARAMETER_ID,
          "String",
          Some(format!("S3 key for asset version \"{hash}\"")),
        )?;
        let artifact_hash = tree.add_parameter(
          scope,
          HASH_PARAMETER_ID,
          "String",
          Some(format!("Artifact hash for asset \"{hash}\"")),
        )?;

        let logical = |node: NodeId| tree.parameter(node).map(|p| p.logical_id.clone());
        let data = json!({
          "path": source.file_name,
          "id": hash,
          "packaging": source.packaging.as_str(),
          "sourceHash": hash,
          "s3BucketParameter": logical(bucket),
          "s3KeyParameter": logical(key),
          "artifactHashParameter": logical(artifact_hash),
        });
        tree.add_metadata(stack, MetadataEntry::new(ASSET_METADATA, data));

        debug!(stack = %tree.path(stack), hash = %hash, "added file asset parameters");
        scope
      }
    };

    let bucket = Expr::reference(Self::parameter_logical_id(tree, asset_scope, BUCKET_PARAMETER_ID)?);
    let key = Expr::reference(Self::parameter_logical_id(tree, asset_scope, KEY_PARAMETER_ID)?);

    // `{prefix}||{filename}` recombined without the separator
    let object_key = Expr::concat([
      Expr::select(0, Expr::split(ASSET_PREFIX_SEPARATOR, key.clone())),
      Expr::select(1, Expr::split(ASSET_PREFIX_SEPARATOR, key)),
    ]);

    let s = tree.stack(stack)?;
    let http_url = Expr::concat([
      "https://s3.".into(),
      s.environment.region.clone(),
      ".".into(),
      s.url_suffix.clone(),
      "/".into(),
      bucket.clone(),
      "/".into(),
      object_key.clone(),
    ]);
    let s3_object_url = Expr::concat(["s3://".into(), bucket.clone(), "/".into(), object_key.clone()]);

    Ok(FileAssetLocation {
      bucket_name: bucket,
      object_key,
      s3_url: http_url.clone(),
      http_url,
      s3_object_url,
    })
  }

  fn do_add_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    let stack = self.bound_stack()?;

    let repository_name = source
      .repository_name
      .clone()
      .or_else(|| {
        tree
          .try_get_context(stack, ASSETS_ECR_REPOSITORY_NAME_OVERRIDE_CONTEXT_KEY)
          .and_then(Value::as_str)
          .map(str::to_string)
      })
      .unwrap_or_else(|| ASSETS_ECR_REPOSITORY_NAME.to_string());
    let image_tag = source.source_hash.clone();

    if self.added_image_assets.insert(source.source_hash.clone()) {
      let mut data = Map::new();
      data.insert("repositoryName".into(), json!(repository_name));
      data.insert("imageTag".into(), json!(image_tag));
      data.insert("id".into(), json!(source.source_hash));
      data.insert("packaging".into(), json!("container-image"));
      data.insert("path".into(), json!(source.directory_name));
      data.insert("sourceHash".into(), json!(source.source_hash));
      if let Some(args) = &source.docker_build_args {
        data.insert("buildArgs".into(), json!(args));
      }
      if let Some(target) = &source.docker_build_target {
        data.insert("target".into(), json!(target));
      }
      if let Some(file) = &source.docker_file {
        data.insert("file".into(), json!(file));
      }
      tree.add_metadata(stack, MetadataEntry::new(ASSET_METADATA, Value::Object(data)));
      debug!(stack = %tree.path(stack), hash = %source.source_hash, "added container image asset");
    }

    let s = tree.stack(stack)?;
    let image_uri = Expr::concat([
      s.environment.account.clone(),
      ".dkr.ecr.".into(),
      s.environment.region.clone(),
      ".".into(),
      s.url_suffix.clone(),
      format!("/{repository_name}:{image_tag}").into(),
    ]);

    Ok(DockerImageAssetLocation {
      repository_name: Expr::Literal(repository_name),
      image_uri,
    })
  }
}

impl AssetRegistrar for LegacySynthesizer {
  fn register_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError> {
    self.do_add_file_asset(tree, source)
  }

  fn register_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    self.do_add_docker_image_asset(tree, source)
  }
}

impl StackSynthesizer for LegacySynthesizer {
  fn bind(&mut self, tree: &ConstructTree, stack: NodeId) -> Result<(), SynthError> {
    if let Some(existing) = self.stack {
      return Err(SynthError::AlreadyBound(tree.path(existing)));
    }
    tree.stack(stack)?;
    self.stack = Some(stack);
    Ok(())
  }

  fn add_file_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError> {
    let stack = self.bound_stack()?;
    match tree.stack(stack)?.asset_hook.clone() {
      Some(hook) => hook.add_file_asset(tree, source, self),
      None => self.do_add_file_asset(tree, source),
    }
  }

  fn add_docker_image_asset(
    &mut self,
    tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    let stack = self.bound_stack()?;
    match tree.stack(stack)?.asset_hook.clone() {
      Some(hook) => hook.add_docker_image_asset(tree, source, self),
      None => self.do_add_docker_image_asset(tree, source),
    }
  }

  fn write_stack_artifacts(
    &mut self,
    tree: &ConstructTree,
    assembly: &mut CloudAssemblyBuilder,
  ) -> Result<(), SynthError> {
    let stack = self.bound_stack()?;
    add_stack_artifact_to_assembly(tree, stack, assembly, StackArtifactOptions::default(), &[])
  }
}
