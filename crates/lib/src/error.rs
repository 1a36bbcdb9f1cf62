//! Top-level build errors.
//!
//! Each component reports its own error type; [`BuildError`] gathers them so
//! callers can tell the failure kinds apart.

use std::path::PathBuf;

use thiserror::Error;

use crate::bundle::CompileError;
use crate::grants::DetectError;
use crate::launch::LaunchError;
use crate::options::ConfigError;
use crate::serve::ServeError;

#[derive(Debug, Error)]
pub enum BuildError {
  /// The entry module could not be used.
  #[error("entry module {}: {reason}", path.display())]
  Entry { path: PathBuf, reason: String },

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("compile failed: {0}")]
  Compile(#[from] CompileError),

  #[error(transparent)]
  Detect(#[from] DetectError),

  /// Includes an exhausted port search.
  #[error(transparent)]
  Serve(#[from] ServeError),

  #[error("failed to write {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },

  #[error(transparent)]
  Launch(#[from] LaunchError),
}

impl BuildError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> BuildError {
    let path = path.into();
    move |source| BuildError::Io { path, source }
  }
}
