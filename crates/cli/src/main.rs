mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use binsmith_lib::config::CONFIG_FILENAME;

use crate::cmd::BuildArgs;
use crate::output::OutputFormat;

/// binsmith - build multi-platform binaries from a declarative project file
#[derive(Parser)]
#[command(name = "binsmith")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every configured target
  Build {
    /// Path to the project file
    #[arg(short = 'f', long = "config", default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Maximum number of targets built at the same time (default: CPU count)
    #[arg(short, long)]
    parallelism: Option<usize>,

    /// Skip post-build hooks
    #[arg(long)]
    skip_post_hooks: bool,

    /// Build only for the host platform
    #[arg(long)]
    single_target: bool,

    /// Only run builds with these IDs
    #[arg(long = "id")]
    ids: Vec<String>,

    /// Version exposed to templates as `.Version`
    #[arg(long)]
    version: Option<String>,

    /// Commit exposed to templates as `.Commit`
    #[arg(long)]
    commit: Option<String>,

    /// Cancel the run after this long (e.g. "30m", "1h 30m")
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30m")]
    timeout: Duration,
  },

  /// Validate the project file and apply defaults without building
  Check {
    /// Path to the project file
    #[arg(short = 'f', long = "config", default_value = CONFIG_FILENAME)]
    config: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      config,
      parallelism,
      skip_post_hooks,
      single_target,
      ids,
      version,
      commit,
      timeout,
    } => cmd::cmd_build(
      &BuildArgs {
        config,
        parallelism,
        skip_post_hooks,
        single_target,
        ids,
        version,
        commit,
        timeout,
      },
      cli.format,
    ),
    Commands::Check { config } => cmd::cmd_check(&config, cli.format),
  }
}
