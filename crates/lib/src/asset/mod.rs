//! File and container image assets.
//!
//! # Submodules
//!
//! - [`manifest`] - content-addressed asset manifest and its builder

pub mod manifest;
mod types;

pub use manifest::{AssetManifest, AssetManifestBuilder, environment_key};
pub use types::*;
