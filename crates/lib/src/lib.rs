//! stacksynth-lib: stack synthesis for infrastructure-as-code applications.
//!
//! Turns a construct tree into a cloud assembly:
//! - `tree`: arena construct tree with stacks, parameters, metadata and context
//! - `synthesizer`: where assets are published (default, legacy, nested)
//! - `asset`: asset sources, locations and the per-stack asset manifest
//! - `assembly`: stack artifacts and the assembly `manifest.json`
//! - `synth`: the driver that renders templates and writes everything out
//! - `app`: the JSON application description consumed by the CLI

pub mod app;
pub mod assembly;
pub mod asset;
pub mod consts;
pub mod error;
pub mod expr;
pub mod placeholder;
pub mod synth;
pub mod synthesizer;
pub mod tree;
pub mod util;

pub use error::SynthError;
pub use synth::synthesize;
