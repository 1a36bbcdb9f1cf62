mod cmd;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, cmd_build, cmd_grants};
use output::print_error;

/// usbuild - build userscripts and install them through the browser
#[derive(Parser)]
#[command(name = "usbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a userscript once and hand it to the browser for installation
  Build {
    #[command(flatten)]
    args: BuildArgs,

    /// Start a development session instead (same as `usbuild dev`)
    #[arg(long)]
    dev: bool,
  },

  /// Watch, serve and live-reload a userscript through an installed bridge script
  Dev {
    #[command(flatten)]
    args: BuildArgs,
  },

  /// Print the capabilities a compiled script uses
  Grants {
    /// Compiled script to analyze
    file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli.command) {
    print_error(&format!("{e:#}"));
    std::process::exit(1);
  }
}

fn run(command: Commands) -> Result<()> {
  match command {
    Commands::Build { args, dev } => cmd_build(args, dev),
    Commands::Dev { args } => cmd_build(args, true),
    Commands::Grants { file, json } => cmd_grants(&file, json),
  }
}
