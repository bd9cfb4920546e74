mod list;
mod synth;

pub use list::cmd_list;
pub use synth::cmd_synth;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use stacksynth_lib::app::{build_tree, load_app};
use stacksynth_lib::tree::ConstructTree;

/// Load the description at `app` and build its construct tree.
///
/// Asset paths resolve relative to the description's directory.
fn load_tree(app: &Path, context: Vec<(String, Value)>) -> Result<ConstructTree> {
  let description = load_app(app).with_context(|| format!("Failed to load app: {}", app.display()))?;
  let base_dir = app.parent().unwrap_or_else(|| Path::new("."));
  debug!(app = %app.display(), stacks = description.stacks.len(), "loaded app description");
  let context: BTreeMap<String, Value> = context.into_iter().collect();
  build_tree(&description, base_dir, &context).with_context(|| format!("Failed to build app: {}", app.display()))
}
