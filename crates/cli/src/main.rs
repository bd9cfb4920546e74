mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// synth - write cloud assemblies from application descriptions
#[derive(Parser)]
#[command(name = "synth")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Synthesize every stack into a cloud assembly directory
  Synth {
    /// Path to the application description
    #[arg(env = "SYNTH_APP", default_value = "app.json")]
    app: PathBuf,

    /// Output directory for the cloud assembly
    #[arg(short, long, env = "SYNTH_OUTDIR", default_value = "cdk.out")]
    output: PathBuf,

    /// Context value, may be repeated (values are parsed as JSON when possible)
    #[arg(short, long = "context", value_name = "KEY=VALUE", value_parser = parse_context)]
    context: Vec<(String, Value)>,
  },

  /// List the stacks an application description defines
  List {
    /// Path to the application description
    #[arg(env = "SYNTH_APP", default_value = "app.json")]
    app: PathBuf,

    /// Context value, may be repeated (values are parsed as JSON when possible)
    #[arg(short, long = "context", value_name = "KEY=VALUE", value_parser = parse_context)]
    context: Vec<(String, Value)>,
  },
}

/// Parse `KEY=VALUE`; the value is JSON if it parses as JSON, else a string.
fn parse_context(raw: &str) -> Result<(String, Value), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
  if key.is_empty() {
    return Err(format!("empty context key in '{raw}'"));
  }
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((key.to_string(), value))
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Synth { app, output, context } => cmd::cmd_synth(&app, &output, context, cli.format),
    Commands::List { app, context } => cmd::cmd_list(&app, context, cli.format),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn context_values_parse_as_json_when_possible() {
    assert_eq!(parse_context("retries=3").unwrap(), ("retries".to_string(), json!(3)));
    assert_eq!(parse_context("flag=true").unwrap(), ("flag".to_string(), json!(true)));
    assert_eq!(
      parse_context("@aws-cdk/core:bootstrapQualifier=abc").unwrap(),
      ("@aws-cdk/core:bootstrapQualifier".to_string(), json!("abc"))
    );
    assert_eq!(parse_context("url=a=b").unwrap(), ("url".to_string(), json!("a=b")));
  }

  #[test]
  fn context_requires_key_and_separator() {
    assert!(parse_context("novalue").is_err());
    assert!(parse_context("=x").is_err());
  }

  #[test]
  fn cli_definition_is_valid() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
  }
}
