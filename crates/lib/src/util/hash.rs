//! Content fingerprints for assets and generated identifiers.
//!
//! An asset's source hash decides where it is published, so two runs over the
//! same files must agree on it. Directory fingerprints cover relative paths,
//! file contents and symlink targets; timestamps and permissions are ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Lowercase hex SHA-256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("cannot read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot walk asset directory: {0}")]
  Walk(#[from] walkdir::Error),
}

impl HashError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> HashError + '_ {
    move |source| HashError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Incremental fingerprint over a sequence of tagged records.
struct Fingerprint(Sha256);

impl Fingerprint {
  fn new() -> Self {
    Self(Sha256::new())
  }

  /// Each record is `tag`, the relative path and an optional digest,
  /// NUL-separated so a path can never run into the next field.
  fn record(&mut self, tag: u8, rel_path: &str, digest: Option<&ContentHash>) {
    self.0.update([tag, 0]);
    self.0.update(rel_path.as_bytes());
    self.0.update([0]);
    if let Some(digest) = digest {
      self.0.update(digest.0.as_bytes());
    }
    self.0.update(b"\n");
  }

  fn finish(self) -> ContentHash {
    ContentHash(hex::encode(self.0.finalize()))
  }
}

/// Fingerprint a directory tree.
///
/// Entries whose file name appears in `exclude` are skipped together with
/// everything below them. Sockets and devices do not contribute.
pub fn hash_directory(root: &Path, exclude: &[&str]) -> Result<ContentHash, HashError> {
  let mut fingerprint = Fingerprint::new();

  let walker = WalkDir::new(root)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| match entry.file_name().to_str() {
      Some(name) => !exclude.contains(&name),
      None => true,
    });

  for entry in walker {
    let entry = entry?;
    let rel_path = match entry.path().strip_prefix(root) {
      Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
      Err(_) => continue,
    };

    let file_type = entry.file_type();
    if file_type.is_dir() {
      fingerprint.record(b'D', &rel_path, None);
    } else if file_type.is_file() {
      fingerprint.record(b'F', &rel_path, Some(&hash_file(entry.path())?));
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(HashError::io(entry.path()))?;
      let target = hash_bytes(target.to_string_lossy().as_bytes());
      fingerprint.record(b'L', &rel_path, Some(&target));
    }
  }

  Ok(fingerprint.finish())
}

/// Digest of a single file's bytes.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let mut file = fs::File::open(path).map_err(HashError::io(path))?;
  let mut hasher = Sha256::new();
  io::copy(&mut file, &mut hasher).map_err(HashError::io(path))?;
  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Fingerprint whatever `path` points at: a directory tree or a single file.
pub fn hash_path(path: &Path, exclude: &[&str]) -> Result<ContentHash, HashError> {
  let metadata = fs::metadata(path).map_err(HashError::io(path))?;
  if metadata.is_dir() {
    hash_directory(path, exclude)
  } else {
    hash_file(path)
  }
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}

/// First `len` hex characters of the SHA-256 of `data`, upper-cased.
pub fn short_digest(data: &str, len: usize) -> String {
  let mut digest = hash_bytes(data.as_bytes()).0;
  digest.truncate(len);
  digest.make_ascii_uppercase();
  digest
}
