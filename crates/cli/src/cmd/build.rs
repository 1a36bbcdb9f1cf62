//! Implementation of the `usbuild build` and `usbuild dev` commands.
//!
//! Both resolve options from the config file and flags, then drive the
//! orchestrator with the esbuild engine and a browser launcher. `build` exits
//! after the install handoff; `dev` keeps watching and serving until
//! interrupted.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use usbuild_lib::bundle::Esbuild;
use usbuild_lib::launch::{Launcher, LogOnly, SystemBrowser};
use usbuild_lib::options::{BuildOptions, PartialOptions, ReloadMode};
use usbuild_lib::{BuildRequest, Launched, Orchestrator};

use crate::config;
use crate::output::{
  format_bytes, format_duration, port_notice, print_info, print_stat, print_success, print_url, print_warning,
};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Entry module of the userscript
  pub entry: PathBuf,

  /// Config file (default: usbuild.toml next to the entry module)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Output directory, relative to the entry module
  #[arg(short, long)]
  pub outdir: Option<PathBuf>,

  /// Host to serve the output directory on
  #[arg(long)]
  pub host: Option<String>,

  /// Preferred port; the next free one is used if it is taken
  #[arg(short, long)]
  pub port: Option<u16>,

  /// Do not reload the page when the bundle changes
  #[arg(long)]
  pub no_auto_reload: bool,

  /// What to do when the bundle changes: refresh or reinstall
  #[arg(long, value_name = "MODE")]
  pub reload_mode: Option<ReloadMode>,

  /// Debounce delay before reloading, in milliseconds
  #[arg(long, value_name = "MS")]
  pub reload_delay: Option<u64>,

  /// Load the development bundle through @require file:// instead of the local server
  #[arg(long)]
  pub local_file_require: bool,

  /// Browser command to open the install page with
  #[arg(long, value_name = "CMD", conflicts_with = "no_open")]
  pub browser: Option<String>,

  /// Do not open a browser; print the install address instead
  #[arg(long)]
  pub no_open: bool,
}

impl BuildArgs {
  /// Options given on the command line, layered over the config file.
  fn overrides(&self, dev: bool) -> PartialOptions {
    PartialOptions {
      dev: dev.then_some(true),
      outdir: self.outdir.clone(),
      host: self.host.clone(),
      port: self.port,
      auto_reload: self.no_auto_reload.then_some(false),
      auto_reload_mode: self.reload_mode,
      auto_reload_delay: self.reload_delay,
      enable_local_file_require_in_dev: self.local_file_require.then_some(true),
    }
  }
}

/// Execute the build command.
///
/// `dev` forces development mode; otherwise the config file decides.
pub fn cmd_build(args: BuildArgs, dev: bool) -> Result<()> {
  let file = config::load(args.config.as_deref(), &args.entry)?;
  let options = file
    .options
    .merge(args.overrides(dev))
    .resolve()
    .context("Invalid options")?;

  let request = BuildRequest {
    entry: args.entry.clone(),
    config: file.userscript,
    options,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let bundler = Esbuild::from_env();
    if args.no_open {
      run(Orchestrator::new(bundler, LogOnly), request).await
    } else {
      let browser = match &args.browser {
        Some(command) => SystemBrowser::with_command(command.as_str()),
        None => SystemBrowser::new(),
      };
      run(Orchestrator::new(bundler, browser), request).await
    }
  })
}

async fn run<L: Launcher>(orchestrator: Orchestrator<Esbuild, L>, request: BuildRequest) -> Result<()> {
  let started = Instant::now();
  let options = request.options.clone();

  let launched = orchestrator.launch(request).await.context("Build failed")?;
  report(&launched, &options, started);

  tokio::select! {
    result = launched.settle() => result.context("Build failed")?,
    _ = tokio::signal::ctrl_c() => print_info("Stopped"),
  }

  if !options.is_dev() {
    print_success("Done");
  }
  Ok(())
}

fn report(launched: &Launched, options: &BuildOptions, started: Instant) {
  let endpoint = launched.endpoint();
  if let Some(notice) = port_notice(options.port, endpoint.port) {
    print_warning(&notice);
  }

  let size = std::fs::metadata(&launched.artifact)
    .map(|m| format_bytes(m.len()))
    .unwrap_or_else(|_| "unknown".to_string());

  if options.is_dev() {
    print_success(&format!("Bridge written to {}", launched.artifact.display()));
  } else {
    print_success(&format!("Built {}", launched.artifact.display()));
  }
  print_stat("Size", &size);
  print_url("Serving", &endpoint.base_url());
  print_url("Install", &launched.artifact_url);
  print_stat("Time", &format_duration(started.elapsed()));

  if options.is_dev() {
    println!();
    print_info("Watching for changes, press Ctrl-C to stop");
  }
}
