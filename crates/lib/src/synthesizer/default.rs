//! The default synthesizer.
//!
//! Assets are published into the resources created by bootstrapping the
//! target environment: one staging bucket, one container repository and a set
//! of roles, all named from templates carrying `${Qualifier}` and environment
//! placeholders. Every stack gets an asset manifest listing what must be
//! published, and its template is published as one more file asset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::assembly::{
  AssetManifestProperties, ArtifactManifest, ArtifactProperties, ArtifactType, CloudAssemblyBuilder,
  StackArtifactOptions, add_stack_artifact_to_assembly,
};
use crate::asset::manifest::{DockerImageDestination, FileDestination};
use crate::asset::{
  AssetManifestBuilder, DockerImageAssetLocation, DockerImageAssetSource, FileAssetLocation, FileAssetPackaging,
  FileAssetSource, environment_key,
};
use crate::consts::{
  BOOTSTRAP_QUALIFIER_CONTEXT, DEFAULT_CLOUDFORMATION_ROLE_ARN, DEFAULT_DEPLOY_ROLE_ARN,
  DEFAULT_FILE_ASSET_PUBLISHING_ROLE_ARN, DEFAULT_FILE_ASSETS_BUCKET_NAME, DEFAULT_IMAGE_ASSET_PUBLISHING_ROLE_ARN,
  DEFAULT_IMAGE_ASSETS_REPOSITORY_NAME, DEFAULT_QUALIFIER, MIN_BOOTSTRAP_STACK_VERSION,
};
use crate::error::SynthError;
use crate::expr::Expr;
use crate::placeholder::{Specialization, specialize};
use crate::synthesizer::{StackSynthesizer, interpolate};
use crate::tree::{ConstructTree, NodeId};
use crate::util::hash::hash_bytes;

/// Overrides for the bootstrap resource names.
///
/// Every value may contain `${Qualifier}`, `${AWS::AccountId}`,
/// `${AWS::Region}` and `${AWS::Partition}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultSynthesizerProps {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_assets_bucket_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_assets_repository_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_asset_publishing_role_arn: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_asset_publishing_external_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_asset_publishing_role_arn: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_asset_publishing_external_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deploy_role_arn: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cloud_formation_execution_role: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub qualifier: Option<String>,
}

/// Names resolved for the bound stack.
#[derive(Debug, Clone)]
struct Bound {
  stack: NodeId,
  artifact_id: String,
  account: Expr,
  region: Expr,
  url_suffix: Expr,
  env_key: String,
  bucket_name: String,
  repository_name: String,
  deploy_role_arn: String,
  cloud_formation_execution_role_arn: String,
  file_asset_publishing_role_arn: String,
  image_asset_publishing_role_arn: String,
}

#[derive(Debug, Default)]
pub struct DefaultSynthesizer {
  props: DefaultSynthesizerProps,
  bound: Option<Bound>,
  manifest: AssetManifestBuilder,
}

impl DefaultSynthesizer {
  pub fn new(props: DefaultSynthesizerProps) -> Self {
    Self {
      props,
      bound: None,
      manifest: AssetManifestBuilder::new(),
    }
  }

  /// Qualifier from the props, then the construct context, then the default.
  fn qualifier(&self, tree: &ConstructTree, stack: NodeId) -> String {
    self
      .props
      .qualifier
      .clone()
      .or_else(|| {
        tree
          .try_get_context(stack, BOOTSTRAP_QUALIFIER_CONTEXT)
          .and_then(Value::as_str)
          .map(str::to_string)
      })
      .unwrap_or_else(|| DEFAULT_QUALIFIER.to_string())
  }

  fn register_file(&mut self, source: &FileAssetSource) -> Result<FileAssetLocation, SynthError> {
    let bound = self.bound.as_ref().ok_or(SynthError::NotBound)?;
    let object_key = format!("{}.zip", source.source_hash);

    self.manifest.add_file(
      source,
      &bound.env_key,
      FileDestination {
        bucket_name: bound.bucket_name.clone(),
        object_key: object_key.clone(),
        region: bound.region.as_literal().map(str::to_string),
        assume_role_arn: Some(bound.file_asset_publishing_role_arn.clone()),
        assume_role_external_id: self.props.file_asset_publishing_external_id.clone(),
      },
    );

    let bucket_name = Expr::sub_if_needed(bound.bucket_name.clone());
    let http_url = interpolate(vec![
      "https://s3.".into(),
      bound.region.clone(),
      ".".into(),
      bound.url_suffix.clone(),
      "/".into(),
      bucket_name.clone(),
      "/".into(),
      Expr::literal(object_key.clone()),
    ]);
    let s3_object_url = interpolate(vec![
      "s3://".into(),
      bucket_name.clone(),
      "/".into(),
      Expr::literal(object_key.clone()),
    ]);

    Ok(FileAssetLocation {
      bucket_name,
      object_key: Expr::Literal(object_key),
      s3_url: http_url.clone(),
      http_url,
      s3_object_url,
    })
  }
}

impl StackSynthesizer for DefaultSynthesizer {
  fn bind(&mut self, tree: &ConstructTree, stack: NodeId) -> Result<(), SynthError> {
    if let Some(bound) = &self.bound {
      return Err(SynthError::AlreadyBound(tree.path(bound.stack)));
    }

    let qualifier = self.qualifier(tree, stack);
    let s = tree.stack(stack)?;
    let spec = Specialization {
      qualifier: &qualifier,
      account: s.environment.account.as_literal(),
      region: s.environment.region.as_literal(),
    };
    let name = |value: &Option<String>, fallback: &str| specialize(value.as_deref().unwrap_or(fallback), &spec);

    let bound = Bound {
      stack,
      artifact_id: s.artifact_id.clone(),
      account: s.environment.account.clone(),
      region: s.environment.region.clone(),
      url_suffix: s.url_suffix.clone(),
      env_key: environment_key(&s.environment.account, &s.environment.region),
      bucket_name: name(&self.props.file_assets_bucket_name, DEFAULT_FILE_ASSETS_BUCKET_NAME)?,
      repository_name: name(
        &self.props.image_assets_repository_name,
        DEFAULT_IMAGE_ASSETS_REPOSITORY_NAME,
      )?,
      deploy_role_arn: name(&self.props.deploy_role_arn, DEFAULT_DEPLOY_ROLE_ARN)?,
      cloud_formation_execution_role_arn: name(
        &self.props.cloud_formation_execution_role,
        DEFAULT_CLOUDFORMATION_ROLE_ARN,
      )?,
      file_asset_publishing_role_arn: name(
        &self.props.file_asset_publishing_role_arn,
        DEFAULT_FILE_ASSET_PUBLISHING_ROLE_ARN,
      )?,
      image_asset_publishing_role_arn: name(
        &self.props.image_asset_publishing_role_arn,
        DEFAULT_IMAGE_ASSET_PUBLISHING_ROLE_ARN,
      )?,
    };

    debug!(
      stack = %tree.path(stack),
      qualifier = %qualifier,
      bucket = %bound.bucket_name,
      "bound default synthesizer"
    );
    self.bound = Some(bound);
    Ok(())
  }

  fn add_file_asset(
    &mut self,
    _tree: &mut ConstructTree,
    source: &FileAssetSource,
  ) -> Result<FileAssetLocation, SynthError> {
    self.register_file(source)
  }

  fn add_docker_image_asset(
    &mut self,
    _tree: &mut ConstructTree,
    source: &DockerImageAssetSource,
  ) -> Result<DockerImageAssetLocation, SynthError> {
    let bound = self.bound.as_ref().ok_or(SynthError::NotBound)?;
    let image_tag = source.source_hash.clone();

    self.manifest.add_docker_image(
      source,
      &bound.env_key,
      DockerImageDestination {
        repository_name: bound.repository_name.clone(),
        image_tag: image_tag.clone(),
        region: bound.region.as_literal().map(str::to_string),
        assume_role_arn: Some(bound.image_asset_publishing_role_arn.clone()),
        assume_role_external_id: self.props.image_asset_publishing_external_id.clone(),
      },
    );

    let repository_name = Expr::sub_if_needed(bound.repository_name.clone());
    let image_uri = interpolate(vec![
      bound.account.clone(),
      ".dkr.ecr.".into(),
      bound.region.clone(),
      ".".into(),
      bound.url_suffix.clone(),
      "/".into(),
      repository_name.clone(),
      ":".into(),
      Expr::Literal(image_tag),
    ]);

    Ok(DockerImageAssetLocation {
      repository_name,
      image_uri,
    })
  }

  fn write_stack_artifacts(
    &mut self,
    tree: &ConstructTree,
    assembly: &mut CloudAssemblyBuilder,
  ) -> Result<(), SynthError> {
    let (stack, artifact_id) = {
      let bound = self.bound.as_ref().ok_or(SynthError::NotBound)?;
      (bound.stack, bound.artifact_id.clone())
    };
    let template_file = tree.stack(stack)?.template_file.clone();

    // The template is already on disk; publish it like any other file.
    let template = assembly.read_file(&template_file)?;
    let template_source = FileAssetSource {
      source_hash: hash_bytes(&template).0,
      file_name: template_file,
      packaging: FileAssetPackaging::File,
    };
    let template_location = self.register_file(&template_source)?;
    // Assembly properties carry `${...}` markers as plain text.
    let template_object_url = template_location.s3_object_url.to_string();
    let bound = self.bound.as_ref().ok_or(SynthError::NotBound)?;

    let manifest_artifact_id = format!("{artifact_id}.assets");
    let manifest_file = format!("{manifest_artifact_id}.json");
    self.manifest.write(&assembly.outdir().join(&manifest_file))?;
    assembly.add_artifact(
      manifest_artifact_id.clone(),
      ArtifactManifest {
        artifact_type: ArtifactType::AssetManifest,
        environment: None,
        properties: Some(ArtifactProperties::AssetManifest(AssetManifestProperties {
          file: manifest_file,
        })),
        dependencies: None,
        metadata: None,
      },
    );

    add_stack_artifact_to_assembly(
      tree,
      stack,
      assembly,
      StackArtifactOptions {
        assume_role_arn: Some(bound.deploy_role_arn.clone()),
        cloud_formation_execution_role_arn: Some(bound.cloud_formation_execution_role_arn.clone()),
        stack_template_asset_object_url: Some(template_object_url),
        requires_bootstrap_stack_version: Some(MIN_BOOTSTRAP_STACK_VERSION),
      },
      &[manifest_artifact_id],
    )?;

    info!(stack = %artifact_id, template_hash = %template_source.source_hash, "wrote stack artifacts");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::asset::AssetManifest;
  use crate::synthesizer::Synthesizer;
  use crate::tree::StackProps;
  use serde_json::json;

  fn default_synth(props: DefaultSynthesizerProps) -> Synthesizer {
    Synthesizer::Default(DefaultSynthesizer::new(props))
  }

  fn source(hash: &str) -> FileAssetSource {
    FileAssetSource {
      source_hash: hash.to_string(),
      file_name: "t.zip".to_string(),
      packaging: FileAssetPackaging::File,
    }
  }

  fn bound_default(tree: &ConstructTree, stack: NodeId) -> DefaultSynthesizer {
    let mut synth = DefaultSynthesizer::new(DefaultSynthesizerProps::default());
    synth.bind(tree, stack).unwrap();
    synth
  }

  fn agnostic_stack(tree: &mut ConstructTree) -> NodeId {
    let root = tree.root();
    tree
      .add_stack(root, "App", StackProps::default(), default_synth(Default::default()))
      .unwrap()
  }

  #[test]
  fn agnostic_file_asset_keeps_markers() {
    let mut tree = ConstructTree::new();
    let stack = agnostic_stack(&mut tree);
    let mut synth = bound_default(&tree, stack);

    let location = synth.add_file_asset(&mut tree, &source("abc123")).unwrap();
    assert_eq!(location.object_key, Expr::literal("abc123.zip"));
    assert_eq!(
      location.bucket_name,
      Expr::Sub("cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}".to_string())
    );
    assert_eq!(
      location.http_url,
      Expr::Sub(
        "https://s3.${AWS::Region}.${AWS::URLSuffix}/cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}/abc123.zip"
          .to_string()
      )
    );
    assert_eq!(location.s3_url, location.http_url);
  }

  #[test]
  fn pinned_environment_resolves_names() {
    let mut tree = ConstructTree::new();
    let root = tree.root();
    let props = StackProps {
      account: Some("123456789012".to_string()),
      region: Some("eu-west-1".to_string()),
      ..Default::default()
    };
    let stack = tree
      .add_stack(root, "Pinned", props, default_synth(Default::default()))
      .unwrap();
    let mut synth = bound_default(&tree, stack);

    let location = synth.add_file_asset(&mut tree, &source("abc123")).unwrap();
    assert_eq!(
      location.bucket_name,
      Expr::literal("cdk-hnb659fds-assets-123456789012-eu-west-1")
    );
    assert_eq!(
      location.s3_object_url,
      Expr::literal("s3://cdk-hnb659fds-assets-123456789012-eu-west-1/abc123.zip")
    );

    let manifest = synth.manifest.build();
    let destination = &manifest.files["abc123"].destinations["123456789012-eu-west-1"];
    assert_eq!(destination.region.as_deref(), Some("eu-west-1"));
    assert_eq!(
      destination.assume_role_arn.as_deref(),
      Some("arn:${AWS::Partition}:iam::123456789012:role/cdk-hnb659fds-file-publishing-role-123456789012-eu-west-1")
    );
  }

  #[test]
  fn same_hash_registered_once() {
    let mut tree = ConstructTree::new();
    let stack = agnostic_stack(&mut tree);
    let mut synth = bound_default(&tree, stack);

    synth.add_file_asset(&mut tree, &source("abc123")).unwrap();
    synth.add_file_asset(&mut tree, &source("abc123")).unwrap();

    let manifest = synth.manifest.build();
    assert_eq!(manifest.files.len(), 1);
    assert_eq!(manifest.files["abc123"].destinations.len(), 1);
  }

  #[test]
  fn operations_before_bind_fail() {
    let mut tree = ConstructTree::new();
    let mut synth = DefaultSynthesizer::new(DefaultSynthesizerProps::default());

    let err = synth.add_file_asset(&mut tree, &source("abc123")).unwrap_err();
    assert!(matches!(err, SynthError::NotBound));

    let err = synth
      .add_docker_image_asset(&mut tree, &DockerImageAssetSource::default())
      .unwrap_err();
    assert!(matches!(err, SynthError::NotBound));

    let temp = tempfile::tempdir().unwrap();
    let mut assembly = CloudAssemblyBuilder::new(temp.path()).unwrap();
    let err = synth.write_stack_artifacts(&tree, &mut assembly).unwrap_err();
    assert!(matches!(err, SynthError::NotBound));
  }

  #[test]
  fn bind_twice_fails() {
    let mut tree = ConstructTree::new();
    let stack = agnostic_stack(&mut tree);
    let mut synth = bound_default(&tree, stack);

    let err = synth.bind(&tree, stack).unwrap_err();
    assert!(matches!(err, SynthError::AlreadyBound(ref path) if path == "App"));
  }

  #[test]
  fn qualifier_from_context_and_props() {
    let mut tree = ConstructTree::new();
    let root = tree.root();
    tree.set_context(root, BOOTSTRAP_QUALIFIER_CONTEXT, json!("ctxqual"));
    let stack = tree
      .add_stack(root, "Ctx", StackProps::default(), default_synth(Default::default()))
      .unwrap();

    let mut from_context = bound_default(&tree, stack);
    let location = from_context.add_file_asset(&mut tree, &source("h")).unwrap();
    assert!(location.bucket_name.to_string().starts_with("cdk-ctxqual-assets-"));

    let mut from_props = DefaultSynthesizer::new(DefaultSynthesizerProps {
      qualifier: Some("propqual".to_string()),
      ..Default::default()
    });
    from_props.bind(&tree, stack).unwrap();
    let location = from_props.add_file_asset(&mut tree, &source("h")).unwrap();
    assert!(location.bucket_name.to_string().starts_with("cdk-propqual-assets-"));
  }

  #[test]
  fn docker_image_uri_uses_hash_as_tag() {
    let mut tree = ConstructTree::new();
    let stack = agnostic_stack(&mut tree);
    let mut synth = bound_default(&tree, stack);

    let image = DockerImageAssetSource {
      source_hash: "feed42".to_string(),
      directory_name: "docker".to_string(),
      ..Default::default()
    };
    let location = synth.add_docker_image_asset(&mut tree, &image).unwrap();
    assert_eq!(
      location.image_uri,
      Expr::Sub(
        "${AWS::AccountId}.dkr.ecr.${AWS::Region}.${AWS::URLSuffix}/cdk-hnb659fds-container-assets-${AWS::AccountId}-${AWS::Region}:feed42"
          .to_string()
      )
    );

    let manifest = synth.manifest.build();
    let destination = &manifest.docker_images["feed42"].destinations["current_account-current_region"];
    assert_eq!(destination.image_tag, "feed42");
    assert_eq!(destination.region, None);
  }

  #[test]
  fn write_stack_artifacts_publishes_template() {
    let mut tree = ConstructTree::new();
    let stack = agnostic_stack(&mut tree);
    let temp = tempfile::tempdir().unwrap();
    let mut assembly = CloudAssemblyBuilder::new(temp.path()).unwrap();
    let template = br#"{"Resources":{}}"#;
    std::fs::write(temp.path().join("App.template.json"), template).unwrap();
    let template_hash = hash_bytes(template).0;

    let synthesizer = std::rc::Rc::clone(&tree.stack(stack).unwrap().synthesizer);
    synthesizer
      .borrow_mut()
      .write_stack_artifacts(&tree, &mut assembly)
      .unwrap();

    let manifest: AssetManifest =
      serde_json::from_str(&std::fs::read_to_string(temp.path().join("App.assets.json")).unwrap()).unwrap();
    assert_eq!(manifest.files[&template_hash].source.path, "App.template.json");

    let artifacts = assembly.build().unwrap();
    let props = artifacts.stack_properties("App").unwrap();
    assert_eq!(props.requires_bootstrap_stack_version, Some(1));
    assert_eq!(
      props.stack_template_asset_object_url.as_deref(),
      Some(format!("s3://cdk-hnb659fds-assets-${{AWS::AccountId}}-${{AWS::Region}}/{template_hash}.zip").as_str())
    );
    assert_eq!(
      props.assume_role_arn.as_deref(),
      Some("arn:${AWS::Partition}:iam::${AWS::AccountId}:role/cdk-hnb659fds-deploy-role-${AWS::AccountId}-${AWS::Region}")
    );
    assert_eq!(
      artifacts.artifacts["App"].dependencies,
      Some(vec!["App.assets".to_string()])
    );
    assert_eq!(
      artifacts.artifacts["App.assets"].artifact_type,
      ArtifactType::AssetManifest
    );
  }

  #[test]
  fn template_url_is_the_registered_object_url() {
    let mut tree = ConstructTree::new();
    let root = tree.root();
    let props = StackProps {
      account: Some("123456789012".to_string()),
      region: Some("eu-west-1".to_string()),
      ..Default::default()
    };
    let stack = tree
      .add_stack(root, "Pinned", props, default_synth(Default::default()))
      .unwrap();
    let temp = tempfile::tempdir().unwrap();
    let mut assembly = CloudAssemblyBuilder::new(temp.path()).unwrap();
    let template = br#"{"Resources":{"Q":{"Type":"AWS::SQS::Queue"}}}"#;
    std::fs::write(temp.path().join("Pinned.template.json"), template).unwrap();

    let synthesizer = std::rc::Rc::clone(&tree.stack(stack).unwrap().synthesizer);
    synthesizer
      .borrow_mut()
      .write_stack_artifacts(&tree, &mut assembly)
      .unwrap();

    let mut other = bound_default(&tree, stack);
    let registered = other
      .add_file_asset(
        &mut tree,
        &FileAssetSource {
          source_hash: hash_bytes(template).0,
          file_name: "Pinned.template.json".to_string(),
          packaging: FileAssetPackaging::File,
        },
      )
      .unwrap();

    let artifacts = assembly.build().unwrap();
    let props = artifacts.stack_properties("Pinned").unwrap();
    assert_eq!(
      props.stack_template_asset_object_url,
      registered.s3_object_url.as_literal().map(str::to_string)
    );
    assert!(
      props
        .stack_template_asset_object_url
        .as_deref()
        .is_some_and(|url| url.starts_with("s3://cdk-hnb659fds-assets-123456789012-eu-west-1/"))
    );
  }
}
