//! esbuild as the compiling engine.
//!
//! The engine runs as a child process. One-shot builds write into a private
//! scratch directory and read the result back; watch sessions write straight
//! into the output directory and report rebuilds on stderr.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, error, info, warn};

use super::types::{ChangeSender, CompileError, CompiledArtifact, SessionConfig, WatchSession};
use super::{BANNER, Bundler, FOOTER, GUARD_LABEL, GUARD_MODULE, GUARD_STUB};

/// Environment variable naming the esbuild executable.
pub const ESBUILD_ENV: &str = "USBUILD_ESBUILD";

const STUB_FILE: &str = "usbuild-guard.js";

/// esbuild invoked through its command line interface.
#[derive(Debug, Clone)]
pub struct Esbuild {
  program: PathBuf,
}

impl Default for Esbuild {
  fn default() -> Self {
    Self::from_env()
  }
}

impl Esbuild {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self { program: program.into() }
  }

  /// Use `$USBUILD_ESBUILD`, or `esbuild` from `PATH`.
  pub fn from_env() -> Self {
    match std::env::var_os(ESBUILD_ENV) {
      Some(program) if !program.is_empty() => Self::new(program),
      _ => Self::new("esbuild"),
    }
  }

  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Arguments shared by one-shot and watch builds.
  pub fn base_args(config: &SessionConfig, stub: &Path, outfile: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
      config.entry.clone().into_os_string(),
      "--bundle".into(),
      "--format=esm".into(),
      "--charset=utf8".into(),
      format!("--banner:js={BANNER}").into(),
      format!("--footer:js={FOOTER}").into(),
    ];

    let mut alias = OsString::from(format!("--alias:{GUARD_MODULE}="));
    alias.push(stub.as_os_str());
    args.push(alias);

    if config.drop_guards {
      args.push(format!("--drop-labels={GUARD_LABEL}").into());
    }

    let mut out = OsString::from("--outfile=");
    out.push(outfile.as_os_str());
    args.push(out);

    args
  }

  fn command(&self, config: &SessionConfig, args: Vec<OsString>) -> Command {
    let mut command = Command::new(&self.program);
    command.args(args);
    if let Some(dir) = config.entry.parent().filter(|dir| !dir.as_os_str().is_empty()) {
      command.current_dir(dir);
    }
    command
  }

  fn spawn_error(&self, source: std::io::Error) -> CompileError {
    CompileError::Spawn {
      program: self.program.clone(),
      source,
    }
  }
}

impl Bundler for Esbuild {
  async fn compile_once(&self, config: &SessionConfig) -> Result<CompiledArtifact, CompileError> {
    let scratch = scratch_dir()?;
    let stub = write_stub(scratch.path()).await?;
    let outfile = scratch.path().join("out.js");
    let metafile = scratch.path().join("meta.json");

    let mut args = Self::base_args(config, &stub, &outfile);
    let mut meta_arg = OsString::from("--metafile=");
    meta_arg.push(metafile.as_os_str());
    args.push(meta_arg);
    args.push("--log-level=warning".into());

    debug!(program = %self.program.display(), entry = %config.entry.display(), "compiling once");
    let output = self
      .command(config, args)
      .stdin(Stdio::null())
      .output()
      .await
      .map_err(|e| self.spawn_error(e))?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
      return Err(CompileError::Failed {
        code: output.status.code(),
        stderr,
      });
    }

    let warnings: Vec<String> = stderr.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect();
    for line in &warnings {
      warn!("{}", line);
    }

    let body = tokio::fs::read_to_string(&outfile).await.map_err(|source| CompileError::Io {
      path: outfile.clone(),
      source,
    })?;
    let meta = tokio::fs::read_to_string(&metafile).await.map_err(|source| CompileError::Io {
      path: metafile.clone(),
      source,
    })?;

    let base = config.entry.parent().unwrap_or(Path::new("."));
    let watched = watched_inputs(&meta, base)?;

    Ok(CompiledArtifact { body, watched, warnings })
  }

  async fn watch(&self, config: &SessionConfig, changes: ChangeSender) -> Result<WatchSession, CompileError> {
    let scratch = scratch_dir()?;
    let stub = write_stub(scratch.path()).await?;

    let mut args = Self::base_args(config, &stub, &config.outfile);
    args.push("--watch=forever".into());
    args.push("--log-level=info".into());

    let mut child = self
      .command(config, args)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| self.spawn_error(e))?;

    let stderr = child.stderr.take().ok_or_else(|| CompileError::Io {
      path: self.program.clone(),
      source: std::io::Error::other("bundler stderr was not captured"),
    })?;

    info!(outfile = %config.outfile.display(), "watching for changes");
    let task = tokio::spawn(follow_watch_log(child, stderr, changes));

    Ok(WatchSession::new(task).with_scratch(scratch))
  }
}

/// What a line of watch-mode output means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchLine {
  Started,
  Finished,
  Error,
  Other,
}

/// Classify one stderr line of `esbuild --watch`.
pub fn classify_watch_line(line: &str) -> WatchLine {
  if line.contains("[ERROR]") {
    WatchLine::Error
  } else if line.contains("[watch] build started") {
    WatchLine::Started
  } else if line.contains("[watch] build finished") {
    WatchLine::Finished
  } else {
    WatchLine::Other
  }
}

async fn follow_watch_log(mut child: Child, stderr: ChildStderr, changes: ChangeSender) {
  let mut lines = BufReader::new(stderr).lines();
  let mut failed = false;

  loop {
    match lines.next_line().await {
      Ok(Some(line)) => match classify_watch_line(&line) {
        WatchLine::Started => {
          failed = false;
          debug!("{}", line.trim());
        }
        WatchLine::Error => {
          failed = true;
          warn!("{}", line.trim());
        }
        WatchLine::Finished => {
          if failed {
            warn!("rebuild failed, keeping the last successful bundle");
          } else {
            info!("rebuilt");
            // no subscribers yet is fine
            let _ = changes.send(());
          }
          failed = false;
        }
        WatchLine::Other => {
          if failed {
            warn!("{}", line.trim_end());
          } else if !line.trim().is_empty() {
            debug!("{}", line.trim_end());
          }
        }
      },
      Ok(None) => break,
      Err(e) => {
        warn!(error = %e, "failed to read bundler output");
        break;
      }
    }
  }

  match child.wait().await {
    Ok(status) => error!(%status, "bundler watch process exited"),
    Err(e) => error!(error = %e, "bundler watch process lost"),
  }
}

fn scratch_dir() -> Result<tempfile::TempDir, CompileError> {
  tempfile::Builder::new()
    .prefix("usbuild-")
    .tempdir()
    .map_err(|source| CompileError::Io {
      path: std::env::temp_dir(),
      source,
    })
}

async fn write_stub(dir: &Path) -> Result<PathBuf, CompileError> {
  let path = dir.join(STUB_FILE);
  tokio::fs::write(&path, GUARD_STUB)
    .await
    .map_err(|source| CompileError::Io {
      path: path.clone(),
      source,
    })?;
  Ok(path)
}

#[derive(Debug, Deserialize)]
struct Metafile {
  #[serde(default)]
  inputs: BTreeMap<String, serde_json::Value>,
}

/// Source paths listed in an esbuild metafile, resolved against `base`.
///
/// The guard stub is not a user source and is left out.
fn watched_inputs(meta: &str, base: &Path) -> Result<Vec<PathBuf>, CompileError> {
  let meta: Metafile = serde_json::from_str(meta)?;
  Ok(
    meta
      .inputs
      .keys()
      .filter(|input| !input.ends_with(STUB_FILE))
      .map(|input| base.join(input))
      .collect(),
  )
}
