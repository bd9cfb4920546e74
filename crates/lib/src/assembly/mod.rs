//! Cloud assembly output.
//!
//! # Submodules
//!
//! - [`builder`] - accumulates artifacts and writes `manifest.json`
//! - [`metadata`] - per-stack construct metadata collection
//! - [`writer`] - the stack artifact record shared by all synthesizers

pub mod builder;
pub mod metadata;
mod types;
pub mod writer;

pub use builder::CloudAssemblyBuilder;
pub use metadata::collect_stack_metadata;
pub use types::*;
pub use writer::add_stack_artifact_to_assembly;
