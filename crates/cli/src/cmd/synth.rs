//! Implementation of the `synth synth` command.
//!
//! Builds the construct tree from the application description and writes
//! templates, asset manifests and `manifest.json` to the output directory.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use stacksynth_lib::assembly::{ArtifactProperties, ArtifactType};
use stacksynth_lib::synthesize;

use super::load_tree;
use crate::output::{OutputFormat, print_done, print_field, print_heading, print_json};

pub fn cmd_synth(app: &Path, outdir: &Path, context: Vec<(String, Value)>, format: OutputFormat) -> Result<()> {
  let mut tree = load_tree(app, context)?;
  let manifest = synthesize(&mut tree, outdir)
    .with_context(|| format!("Failed to synthesize into {}", outdir.display()))?;

  if format.is_json() {
    return print_json(&manifest);
  }

  for (id, artifact) in &manifest.artifacts {
    match (&artifact.artifact_type, &artifact.properties) {
      (ArtifactType::CloudFormationStack, Some(ArtifactProperties::Stack(props))) => {
        print_heading("stack", id);
        print_field("template", &props.template_file);
        if let Some(environment) = &artifact.environment {
          print_field("environment", environment);
        }
        if let Some(dependencies) = &artifact.dependencies {
          print_field("depends on", &dependencies.join(", "));
        }
      }
      (ArtifactType::AssetManifest, Some(ArtifactProperties::AssetManifest(props))) => {
        print_heading("assets", id);
        print_field("manifest", &props.file);
      }
      _ => print_heading("artifact", id),
    }
  }

  print_done(&format!(
    "Wrote {} artifact(s) to {}",
    manifest.artifacts.len(),
    outdir.display()
  ));
  Ok(())
}
