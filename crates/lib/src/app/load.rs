//! Builds a construct tree from an application description.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::app::types::{
  AppDescription, DockerImageAssetDescription, FileAssetDescription, StackBody, SynthesizerConfig,
};
use crate::asset::{DockerImageAssetSource, FileAssetPackaging, FileAssetSource};
use crate::error::SynthError;
use crate::synthesizer::{self, DefaultSynthesizer, LegacySynthesizer, Synthesizer};
use crate::tree::{ConstructTree, NodeId, StackProps, make_unique_id};
use crate::util::hash::{HashError, hash_directory, hash_path};

/// Entries never included in an asset's content hash.
const HASH_EXCLUDES: &[&str] = &[".git"];

#[derive(Debug, Error)]
pub enum AppError {
  #[error("failed to read app description {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse app description {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("stack '{stack}' depends on unknown stack '{dependency}'")]
  UnknownDependency { stack: String, dependency: String },

  #[error("asset '{id}' at {path}: {source}")]
  Asset {
    id: String,
    path: PathBuf,
    #[source]
    source: HashError,
  },

  #[error(transparent)]
  Synth(#[from] SynthError),
}

/// Read and parse a description file.
pub fn load_app(path: &Path) -> Result<AppDescription, AppError> {
  let content = fs::read_to_string(path).map_err(|source| AppError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| AppError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// Build the construct tree described by `app`.
///
/// Asset paths are resolved against `base_dir`. `context` entries are applied
/// on the root after the description's own context and win over it.
pub fn build_tree(
  app: &AppDescription,
  base_dir: &Path,
  context: &BTreeMap<String, Value>,
) -> Result<ConstructTree, AppError> {
  let mut tree = ConstructTree::new();
  let root = tree.root();
  for (key, value) in app.context.iter().chain(context) {
    tree.set_context(root, key.clone(), value.clone());
  }

  let mut by_id = BTreeMap::new();
  for desc in &app.stacks {
    let synth = match &desc.synthesizer {
      SynthesizerConfig::Default(props) => Synthesizer::Default(DefaultSynthesizer::new(props.clone())),
      SynthesizerConfig::Legacy => Synthesizer::Legacy(LegacySynthesizer::new()),
    };
    let props = StackProps {
      stack_name: desc.stack_name.clone(),
      account: desc.account.clone(),
      region: desc.region.clone(),
      tags: desc.body.tags.clone(),
    };
    let stack = tree.add_stack(root, &desc.id, props, synth)?;
    populate(&mut tree, stack, &desc.body, base_dir)?;
    by_id.insert(desc.id.as_str(), stack);
  }

  for desc in &app.stacks {
    let stack = by_id[desc.id.as_str()];
    for dependency in &desc.depends_on {
      let target = by_id
        .get(dependency.as_str())
        .copied()
        .ok_or_else(|| AppError::UnknownDependency {
          stack: desc.id.clone(),
          dependency: dependency.clone(),
        })?;
      tree.add_dependency(stack, target)?;
    }
  }

  info!(stacks = app.stacks.len(), "built construct tree");
  Ok(tree)
}

fn populate(tree: &mut ConstructTree, stack: NodeId, body: &StackBody, base_dir: &Path) -> Result<(), AppError> {
  {
    let s = tree.stack_mut(stack)?;
    for (logical_id, resource) in &body.resources {
      s.add_resource(logical_id.clone(), resource.clone());
    }
  }
  for entry in &body.metadata {
    tree.add_metadata(stack, entry.clone());
  }

  for asset in &body.file_assets {
    add_file_asset(tree, stack, asset, base_dir)?;
  }
  for asset in &body.docker_image_assets {
    add_docker_image_asset(tree, stack, asset, base_dir)?;
  }

  for nested in &body.nested_stacks {
    let props = StackProps {
      stack_name: nested.stack_name.clone(),
      tags: nested.body.tags.clone(),
      ..Default::default()
    };
    let child = tree.add_nested_stack(stack, &nested.id, props)?;
    populate(tree, child, &nested.body, base_dir)?;
  }
  Ok(())
}

fn add_file_asset(
  tree: &mut ConstructTree,
  stack: NodeId,
  asset: &FileAssetDescription,
  base_dir: &Path,
) -> Result<(), AppError> {
  let path = base_dir.join(&asset.path);
  let hash = hash_path(&path, HASH_EXCLUDES).map_err(|source| AppError::Asset {
    id: asset.id.clone(),
    path: path.clone(),
    source,
  })?;
  let packaging = asset.packaging.unwrap_or(if path.is_dir() {
    FileAssetPackaging::ZipDirectory
  } else {
    FileAssetPackaging::File
  });

  tree.add_construct(stack, &asset.id)?;
  let source = FileAssetSource {
    source_hash: hash.0,
    file_name: path.display().to_string(),
    packaging,
  };
  let location = synthesizer::add_file_asset(tree, stack, &source)?;
  debug!(asset = %asset.id, hash = %source.source_hash, url = %location.http_url, "registered file asset");

  let prefix = make_unique_id(&[asset.id.as_str()]);
  let s = tree.stack_mut(stack)?;
  s.add_output(format!("{prefix}BucketName"), &location.bucket_name);
  s.add_output(format!("{prefix}ObjectKey"), &location.object_key);
  s.add_output(format!("{prefix}HttpUrl"), &location.http_url);
  Ok(())
}

fn add_docker_image_asset(
  tree: &mut ConstructTree,
  stack: NodeId,
  asset: &DockerImageAssetDescription,
  base_dir: &Path,
) -> Result<(), AppError> {
  let directory = base_dir.join(&asset.directory);
  let hash = hash_directory(&directory, HASH_EXCLUDES).map_err(|source| AppError::Asset {
    id: asset.id.clone(),
    path: directory.clone(),
    source,
  })?;

  tree.add_construct(stack, &asset.id)?;
  let source = DockerImageAssetSource {
    source_hash: hash.0,
    directory_name: directory.display().to_string(),
    docker_file: asset.docker_file.clone(),
    docker_build_args: asset.build_args.clone(),
    docker_build_target: asset.target.clone(),
    repository_name: asset.repository_name.clone(),
  };
  let location = synthesizer::add_docker_image_asset(tree, stack, &source)?;
  debug!(asset = %asset.id, hash = %source.source_hash, image = %location.image_uri, "registered image asset");

  let prefix = make_unique_id(&[asset.id.as_str()]);
  tree
    .stack_mut(stack)?
    .add_output(format!("{prefix}ImageUri"), &location.image_uri);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn parse(value: Value) -> AppDescription {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn synthesizer_defaults_to_default() {
    let app = parse(json!({ "stacks": [{ "id": "A" }, { "id": "B", "synthesizer": { "type": "legacy" } }] }));
    assert_eq!(app.stacks[0].synthesizer, SynthesizerConfig::default());
    assert_eq!(app.stacks[1].synthesizer, SynthesizerConfig::Legacy);
  }

  #[test]
  fn default_props_are_camel_case() {
    let app = parse(json!({
      "stacks": [{
        "id": "A",
        "synthesizer": { "type": "default", "qualifier": "abc", "fileAssetsBucketName": "my-bucket" }
      }]
    }));
    match &app.stacks[0].synthesizer {
      SynthesizerConfig::Default(props) => {
        assert_eq!(props.qualifier.as_deref(), Some("abc"));
        assert_eq!(props.file_assets_bucket_name.as_deref(), Some("my-bucket"));
      }
      other => panic!("unexpected synthesizer {other:?}"),
    }
  }

  #[test]
  fn builds_stacks_assets_and_dependencies() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("handler.js"), "exports.handler = () => {}").unwrap();
    fs::create_dir(temp.path().join("site")).unwrap();
    fs::write(temp.path().join("site/index.html"), "<html></html>").unwrap();

    let app = parse(json!({
      "stacks": [
        { "id": "Network", "synthesizer": { "type": "legacy" } },
        {
          "id": "Web",
          "dependsOn": ["Network"],
          "fileAssets": [
            { "id": "Handler", "path": "handler.js" },
            { "id": "Site", "path": "site" }
          ],
          "nestedStacks": [{ "id": "Cdn", "resources": { "Dist": { "Type": "AWS::CloudFront::Distribution" } } }]
        }
      ]
    }));
    let tree = build_tree(&app, temp.path(), &BTreeMap::new()).unwrap();

    let stacks = tree.stacks();
    assert_eq!(stacks.len(), 3);
    let web = stacks[1];
    let web_stack = tree.stack(web).unwrap();
    assert_eq!(web_stack.artifact_id, "Web");
    assert_eq!(web_stack.dependencies, vec![stacks[0]]);

    let outputs = web_stack.template["Outputs"].as_object().unwrap();
    assert!(outputs.contains_key("HandlerHttpUrl"));
    assert_eq!(outputs["SiteObjectKey"]["Value"].as_str().map(|k| k.ends_with(".zip")), Some(true));

    let cdn = tree.stack(stacks[2]).unwrap();
    assert!(cdn.is_nested());
    assert!(cdn.template["Resources"].get("Dist").is_some());
  }

  #[test]
  fn unknown_dependency_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let app = parse(json!({ "stacks": [{ "id": "A", "dependsOn": ["Missing"] }] }));
    let err = build_tree(&app, temp.path(), &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, AppError::UnknownDependency { ref dependency, .. } if dependency == "Missing"));
  }

  #[test]
  fn missing_asset_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let app = parse(json!({ "stacks": [{ "id": "A", "fileAssets": [{ "id": "Gone", "path": "gone.txt" }] }] }));
    let err = build_tree(&app, temp.path(), &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, AppError::Asset { ref id, .. } if id == "Gone"));
  }

  #[test]
  fn context_overrides_win() {
    let temp = tempfile::tempdir().unwrap();
    let app = parse(json!({ "context": { "k": "from-file" }, "stacks": [] }));
    let overrides = BTreeMap::from([("k".to_string(), json!("from-flag"))]);
    let tree = build_tree(&app, temp.path(), &overrides).unwrap();
    assert_eq!(tree.try_get_context(tree.root(), "k"), Some(&json!("from-flag")));
  }

  #[test]
  fn load_reports_parse_errors() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("app.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(load_app(&path), Err(AppError::Parse { .. })));
    assert!(matches!(load_app(&temp.path().join("nope.json")), Err(AppError::Read { .. })));
  }
}
