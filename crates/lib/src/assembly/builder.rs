//! Accumulates artifacts and writes the assembly directory.
//!
//! # Layout
//!
//! ```text
//! {outdir}/
//! ├── manifest.json              # AssemblyManifest
//! ├── <Stack>.template.json      # rendered stack templates
//! ├── <Nested>.nested.template.json
//! └── <Stack>.assets.json        # asset manifests (default synthesizer)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::assembly::types::{ArtifactManifest, AssemblyManifest};
use crate::consts::{ASSEMBLY_MANIFEST_FILENAME, MANIFEST_SCHEMA_VERSION};
use crate::error::SynthError;

#[derive(Debug)]
pub struct CloudAssemblyBuilder {
  outdir: PathBuf,
  artifacts: BTreeMap<String, ArtifactManifest>,
}

impl CloudAssemblyBuilder {
  /// Create a builder writing into `outdir`, creating the directory if needed.
  pub fn new(outdir: impl Into<PathBuf>) -> Result<Self, SynthError> {
    let outdir = outdir.into();
    fs::create_dir_all(&outdir).map_err(|source| SynthError::CreateDir {
      path: outdir.clone(),
      source,
    })?;
    Ok(Self {
      outdir,
      artifacts: BTreeMap::new(),
    })
  }

  pub fn outdir(&self) -> &Path {
    &self.outdir
  }

  pub fn add_artifact(&mut self, id: impl Into<String>, artifact: ArtifactManifest) {
    let id = id.into();
    if self.artifacts.contains_key(&id) {
      warn!(artifact = %id, "replacing existing artifact");
    }
    self.artifacts.insert(id, artifact);
  }

  pub fn artifact(&self, id: &str) -> Option<&ArtifactManifest> {
    self.artifacts.get(id)
  }

  /// Write `value` as pretty JSON to `file_name` inside the assembly.
  pub fn write_json(&self, file_name: &str, what: &str, value: &impl Serialize) -> Result<PathBuf, SynthError> {
    let path = self.outdir.join(file_name);
    let content = serde_json::to_string_pretty(value).map_err(|source| SynthError::Serialize {
      what: what.to_string(),
      source,
    })?;
    fs::write(&path, content).map_err(|source| SynthError::Write {
      path: path.clone(),
      source,
    })?;
    Ok(path)
  }

  /// Read a file previously written into the assembly.
  pub fn read_file(&self, file_name: &str) -> Result<Vec<u8>, SynthError> {
    let path = self.outdir.join(file_name);
    fs::read(&path).map_err(|source| SynthError::Read { path, source })
  }

  /// Write `manifest.json` and return the manifest.
  pub fn build(mut self) -> Result<AssemblyManifest, SynthError> {
    let manifest = AssemblyManifest {
      version: MANIFEST_SCHEMA_VERSION.to_string(),
      artifacts: std::mem::take(&mut self.artifacts),
    };
    let path = self.write_json(ASSEMBLY_MANIFEST_FILENAME, "assembly manifest", &manifest)?;

    info!(
      path = %path.display(),
      artifacts = manifest.artifacts.len(),
      "wrote cloud assembly"
    );
    Ok(manifest)
  }
}
