//! Types shared by bundler implementations.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Publishes one message per successful rebuild.
pub type ChangeSender = broadcast::Sender<()>;

/// Errors raised by the compiling engine.
#[derive(Debug, Error)]
pub enum CompileError {
  #[error("failed to start bundler `{}`: {source}", program.display())]
  Spawn { program: PathBuf, source: std::io::Error },

  #[error("bundler exited with code {code:?}:\n{stderr}")]
  Failed { code: Option<i32>, stderr: String },

  #[error("bundler io error at {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },

  #[error("failed to read bundler metafile: {0}")]
  Metafile(#[from] serde_json::Error),
}

/// What to compile and where a watch session writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
  /// The entry module.
  pub entry: PathBuf,
  /// Output file written by watch sessions (one-shot builds return the body instead).
  pub outfile: PathBuf,
  /// Drop statements labelled with the guard marker.
  pub drop_guards: bool,
}

/// The result of one full compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
  /// The bundled script.
  pub body: String,
  /// Source files that went into the bundle.
  pub watched: Vec<PathBuf>,
  /// Warnings reported by the engine.
  pub warnings: Vec<String>,
}

/// A running watch session.
///
/// Dropping the session stops the engine.
#[derive(Debug)]
pub struct WatchSession {
  task: JoinHandle<()>,
  _scratch: Option<tempfile::TempDir>,
}

impl WatchSession {
  pub fn new(task: JoinHandle<()>) -> Self {
    Self { task, _scratch: None }
  }

  /// Keep `dir` alive for as long as the session runs.
  pub fn with_scratch(mut self, dir: tempfile::TempDir) -> Self {
    self._scratch = Some(dir);
    self
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }
}

impl Drop for WatchSession {
  fn drop(&mut self) {
    self.task.abort();
  }
}
