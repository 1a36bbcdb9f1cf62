//! Build orchestration.
//!
//! One run resolves the entry module, binds a port, compiles (once, or as a
//! watch session), writes the artifact, serves the output directory and hands
//! the artifact's address to the browser:
//!
//! - one-shot: the bundle is compiled, its capabilities detected and the final
//!   artifact (manifest + bundle) written.
//! - development: a watch session keeps `<stem>.user.js` current, and a bridge
//!   artifact that loads it from the server is written and installed instead.
//!   Its manifest grants the whole catalog, since the bundle's needs can change
//!   on every edit.
//!
//! Compilation precedes writing, writing precedes serving, and serving
//! precedes the handoff.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};
use url::Url;

use crate::bridge::{handoff_url, synthesize};
use crate::bundle::{Bundler, SessionConfig, WatchSession};
use crate::error::BuildError;
use crate::grants::{self, CATALOG};
use crate::manifest::{BuildConfiguration, GRANT_FIELD, REQUIRE_FIELD, render};
use crate::options::{BuildOptions, Mode};
use crate::serve::{ServingEndpoint, bind_free_port};

/// How long to wait after the handoff before finishing.
///
/// The browser gives no completion signal, so this is a guess at how long the
/// host needs to fetch the artifact.
pub const HANDOFF_DELAY: Duration = Duration::from_secs(2);

/// File name suffix of the bundle and of the final artifact.
pub const BUNDLE_SUFFIX: &str = ".user.js";
/// File name suffix of the development bridge artifact.
pub const BRIDGE_SUFFIX: &str = ".proxy.user.js";

/// Everything needed for one run.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  /// The source module to build.
  pub entry: PathBuf,
  /// Manifest fields as the user wrote them.
  pub config: BuildConfiguration,
  pub options: BuildOptions,
}

/// Drives a [`Bundler`] and a [`Launcher`](crate::launch::Launcher) through one run.
pub struct Orchestrator<B, L> {
  bundler: B,
  launcher: L,
  handoff_delay: Duration,
}

impl<B, L> Orchestrator<B, L>
where
  B: Bundler,
  L: crate::launch::Launcher,
{
  pub fn new(bundler: B, launcher: L) -> Self {
    Self {
      bundler,
      launcher,
      handoff_delay: HANDOFF_DELAY,
    }
  }

  pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
    self.handoff_delay = delay;
    self
  }

  /// Launch and settle.
  ///
  /// In one-shot mode this returns after the handoff delay. In development
  /// mode it never returns; the process is stopped from outside.
  pub async fn run(&self, request: BuildRequest) -> Result<(), BuildError> {
    self.launch(request).await?.settle().await
  }

  /// Everything up to and including the browser handoff.
  pub async fn launch(&self, request: BuildRequest) -> Result<Launched, BuildError> {
    let BuildRequest { entry, config, options } = request;

    let ResolvedEntry { source, dir, stem } = resolve_entry(&entry).await?;

    let config = config.with_defaults(&stem);
    let outdir = dir.join(&options.outdir);
    tokio::fs::create_dir_all(&outdir)
      .await
      .map_err(BuildError::io(&outdir))?;

    let bound = bind_free_port(&options.host, options.port).await?;
    if bound.port() != options.port {
      info!(preferred = options.port, port = bound.port(), "preferred port busy");
    }

    let bundle_name = format!("{stem}{BUNDLE_SUFFIX}");
    let bundle_path = outdir.join(&bundle_name);
    let bundle_url = bound.url_for(&bundle_name);

    let session = SessionConfig {
      entry: source.clone(),
      outfile: bundle_path.clone(),
      drop_guards: !options.is_dev(),
    };

    let (changes, _) = broadcast::channel(16);

    let (artifact, artifact_url, watch) = match options.mode {
      Mode::Development => {
        let watch = self.bundler.watch(&session, changes.clone()).await?;

        let manifest = bridge_manifest(&config, &options, &bundle_path);
        let body = synthesize(&bundle_url, &bound.events_url(), &options);

        let bridge_name = format!("{stem}{BRIDGE_SUFFIX}");
        let bridge_path = outdir.join(&bridge_name);
        write_artifact(&bridge_path, &render(&manifest), &body).await?;
        info!(path = %bridge_path.display(), "bridge written");

        (bridge_path, bound.url_for(&bridge_name), Some(watch))
      }
      Mode::OneShot => {
        info!(entry = %source.display(), "building");
        let compiled = self.bundler.compile_once(&session).await?;

        let detected = grants::detect(&compiled.body, CATALOG)?;
        info!(grants = ?detected, "detected capabilities");
        let manifest = config.merged_list(GRANT_FIELD, detected);

        write_artifact(&bundle_path, &render(&manifest), &compiled.body).await?;
        info!(path = %bundle_path.display(), "artifact written");

        (bundle_path, bundle_url, None)
      }
    };

    let endpoint = bound.serve(outdir, options.live_reload().then(|| changes.clone()));

    self.launcher.open(&handoff_url(&artifact_url)).await?;
    info!(url = %artifact_url, "install handoff started");

    Ok(Launched {
      mode: options.mode,
      artifact,
      artifact_url,
      endpoint,
      watch,
      handoff_delay: self.handoff_delay,
    })
  }
}

/// A run that has been handed off to the browser.
#[derive(Debug)]
pub struct Launched {
  pub mode: Mode,
  /// The file the browser was pointed at (final artifact or bridge).
  pub artifact: PathBuf,
  pub artifact_url: String,
  endpoint: ServingEndpoint,
  watch: Option<WatchSession>,
  handoff_delay: Duration,
}

impl Launched {
  pub fn endpoint(&self) -> &ServingEndpoint {
    &self.endpoint
  }

  /// Wait out the handoff delay, then finish.
  ///
  /// One-shot runs return. Development runs delete the bridge file (the host
  /// has fetched it by now) and keep serving and watching forever.
  pub async fn settle(self) -> Result<(), BuildError> {
    tokio::time::sleep(self.handoff_delay).await;

    match self.mode {
      Mode::OneShot => {
        info!("build done");
        Ok(())
      }
      Mode::Development => {
        if let Err(e) = tokio::fs::remove_file(&self.artifact).await {
          warn!(path = %self.artifact.display(), error = %e, "failed to remove bridge");
        }
        if let Some(watch) = &self.watch
          && watch.is_finished()
        {
          warn!("watch session has already stopped");
        }

        std::future::pending::<()>().await;
        Ok(())
      }
    }
  }
}

/// The bridge's manifest: every catalog capability, plus a `file://` require
/// of the live bundle when local file loading is enabled.
fn bridge_manifest(config: &BuildConfiguration, options: &BuildOptions, bundle_path: &Path) -> BuildConfiguration {
  let manifest = config.merged_list(GRANT_FIELD, CATALOG.iter().copied());
  if options.local_file_require {
    manifest.merged_list(REQUIRE_FIELD, [file_url(bundle_path)])
  } else {
    manifest
  }
}

/// `file://` URL of an absolute path, percent-encoded.
pub fn file_url(path: &Path) -> String {
  match Url::from_file_path(path) {
    Ok(url) => url.into(),
    // only absolute paths convert; launch always passes one
    Err(()) => format!("file://{}", path.display()),
  }
}

/// An entry module as the run sees it.
#[derive(Debug)]
struct ResolvedEntry {
  /// Fully resolved path handed to the bundler.
  source: PathBuf,
  /// Canonical directory the entry was named in; output goes below it.
  dir: PathBuf,
  /// File stem of the path as given, before following symlinks.
  stem: String,
}

async fn resolve_entry(entry: &Path) -> Result<ResolvedEntry, BuildError> {
  let entry_error = |reason: &str| BuildError::Entry {
    path: entry.to_path_buf(),
    reason: reason.to_string(),
  };

  let metadata = tokio::fs::metadata(entry)
    .await
    .map_err(|_| entry_error("not found"))?;
  if !metadata.is_file() {
    return Err(entry_error("is not a file"));
  }

  let stem = entry
    .file_stem()
    .and_then(|s| s.to_str())
    .filter(|s| !s.is_empty())
    .ok_or_else(|| entry_error("has no usable file name"))?
    .to_string();

  let given_dir = entry
    .parent()
    .filter(|dir| !dir.as_os_str().is_empty())
    .unwrap_or(Path::new("."));
  let dir = dunce::canonicalize(given_dir).map_err(|e| entry_error(&e.to_string()))?;
  let source = dunce::canonicalize(entry).map_err(|e| entry_error(&e.to_string()))?;

  Ok(ResolvedEntry { source, dir, stem })
}

async fn write_artifact(path: &Path, header: &str, body: &str) -> Result<(), BuildError> {
  let mut content = String::with_capacity(header.len() + body.len());
  content.push_str(header);
  content.push_str(body);
  tokio::fs::write(path, content).await.map_err(BuildError::io(path))
}
