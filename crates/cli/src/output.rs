//! Terminal rendering for `synth` results.
//!
//! Text output is a heading per stack or artifact followed by indented
//! fields. `--format json` prints the underlying value instead.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const STACK: &str = "▸";
}

/// Heading line: a colored kind tag followed by the name.
///
/// ```text
/// ▸ stack Api
/// ```
pub fn print_heading(kind: &str, name: &str) {
  println!(
    "{} {} {}",
    symbols::STACK.if_supports_color(Stream::Stdout, |s| s.cyan()),
    kind.if_supports_color(Stream::Stdout, |s| s.bold()),
    name
  );
}

pub fn print_field(label: &str, value: &str) {
  println!(
    "    {:<12} {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_done(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message.if_supports_color(Stream::Stdout, |s| s.bold())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")?;
  println!("{json}");
  Ok(())
}
