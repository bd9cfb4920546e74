//! Errors raised while registering assets and writing the cloud assembly.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::placeholder::PlaceholderError;

/// Errors that can occur during synthesis.
#[derive(Debug, Error)]
pub enum SynthError {
  /// An asset or artifact operation ran before `bind`.
  #[error("synthesizer is not bound to a stack; call bind() first")]
  NotBound,

  /// `bind` was called a second time.
  #[error("a synthesizer can only be bound to one stack (already bound to '{0}')")]
  AlreadyBound(String),

  /// The node passed where a stack was expected is not a stack.
  #[error("construct '{0}' is not a stack")]
  NotAStack(String),

  /// A construct the synthesizer created earlier is missing or has the wrong kind.
  #[error("expected construct '{0}' was not found")]
  UnknownNode(String),

  /// A legacy file asset name contains the key prefix separator.
  #[error("asset file name '{0}' must not contain '||'")]
  InvalidAssetFileName(String),

  /// A construct with the same id already exists under the parent.
  #[error("construct '{parent}' already has a child named '{id}'")]
  DuplicateId { parent: String, id: String },

  /// The synthesizer was entered again while a registration on it was in flight.
  #[error("synthesizer re-entered while an asset registration was in progress")]
  Reentrant,

  /// A configuration string contained an invalid placeholder.
  #[error("placeholder error: {0}")]
  Placeholder(#[from] PlaceholderError),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize {what}: {source}")]
  Serialize {
    what: String,
    #[source]
    source: serde_json::Error,
  },
}
