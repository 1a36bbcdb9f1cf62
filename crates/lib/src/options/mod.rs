//! Build options.
//!
//! Options arrive in layers (config file, then command line) as
//! [`PartialOptions`] and are merged once into an immutable [`BuildOptions`].
//! Nothing fills defaults in place after that point.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_OUTDIR: &str = "dist";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7100;
pub const DEFAULT_RELOAD_DELAY_MS: u64 = 1000;

/// Errors raised while resolving options.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid option `{name}`: {reason}")]
  Invalid { name: &'static str, reason: String },

  #[error("unknown reload mode `{0}` (expected `refresh` or `reinstall`)")]
  UnknownReloadMode(String),
}

/// Whether to build once or keep a development session running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
  #[default]
  OneShot,
  Development,
}

/// What the bridge does when the bundle changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
  /// Reload the whole page.
  #[default]
  Refresh,
  /// Remove the loader element and insert a fresh one. Only the injected
  /// script reruns; page scripts that are not idempotent are left alone.
  Reinstall,
}

impl fmt::Display for ReloadMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReloadMode::Refresh => write!(f, "refresh"),
      ReloadMode::Reinstall => write!(f, "reinstall"),
    }
  }
}

impl FromStr for ReloadMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "refresh" => Ok(ReloadMode::Refresh),
      "reinstall" => Ok(ReloadMode::Reinstall),
      _ => Err(ConfigError::UnknownReloadMode(s.to_string())),
    }
  }
}

/// Fully resolved options for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
  pub mode: Mode,
  /// Output directory, relative to the entry module's directory unless absolute.
  pub outdir: PathBuf,
  pub host: String,
  /// Preferred port; the next free port at or above it is used.
  pub port: u16,
  pub auto_reload: bool,
  pub auto_reload_mode: ReloadMode,
  pub auto_reload_delay_ms: u64,
  /// Load the bundle through `@require file://` instead of a loader element.
  pub local_file_require: bool,
}

impl Default for BuildOptions {
  fn default() -> Self {
    Self {
      mode: Mode::OneShot,
      outdir: PathBuf::from(DEFAULT_OUTDIR),
      host: DEFAULT_HOST.to_string(),
      port: DEFAULT_PORT,
      auto_reload: true,
      auto_reload_mode: ReloadMode::Refresh,
      auto_reload_delay_ms: DEFAULT_RELOAD_DELAY_MS,
      local_file_require: false,
    }
  }
}

impl BuildOptions {
  pub fn is_dev(&self) -> bool {
    self.mode == Mode::Development
  }

  /// Whether the server should expose the change stream.
  pub fn live_reload(&self) -> bool {
    self.is_dev() && self.auto_reload
  }
}

/// One layer of user-supplied options. Field names follow the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialOptions {
  pub dev: Option<bool>,
  pub outdir: Option<PathBuf>,
  pub host: Option<String>,
  pub port: Option<u16>,
  #[serde(rename = "autoReload")]
  pub auto_reload: Option<bool>,
  #[serde(rename = "autoReloadMode")]
  pub auto_reload_mode: Option<ReloadMode>,
  #[serde(rename = "autoReloadDelay")]
  pub auto_reload_delay: Option<u64>,
  #[serde(rename = "enableLocalFileRequireInDev")]
  pub enable_local_file_require_in_dev: Option<bool>,
}

impl PartialOptions {
  /// Layer `over` on top of `self`; values set in `over` win.
  pub fn merge(self, over: PartialOptions) -> PartialOptions {
    PartialOptions {
      dev: over.dev.or(self.dev),
      outdir: over.outdir.or(self.outdir),
      host: over.host.or(self.host),
      port: over.port.or(self.port),
      auto_reload: over.auto_reload.or(self.auto_reload),
      auto_reload_mode: over.auto_reload_mode.or(self.auto_reload_mode),
      auto_reload_delay: over.auto_reload_delay.or(self.auto_reload_delay),
      enable_local_file_require_in_dev: over
        .enable_local_file_require_in_dev
        .or(self.enable_local_file_require_in_dev),
    }
  }

  /// Fill unset values with defaults and validate the result.
  pub fn resolve(self) -> Result<BuildOptions, ConfigError> {
    let defaults = BuildOptions::default();

    let options = BuildOptions {
      mode: match self.dev {
        Some(true) => Mode::Development,
        _ => Mode::OneShot,
      },
      outdir: self.outdir.unwrap_or(defaults.outdir),
      host: self.host.unwrap_or(defaults.host),
      port: self.port.unwrap_or(defaults.port),
      auto_reload: self.auto_reload.unwrap_or(defaults.auto_reload),
      auto_reload_mode: self.auto_reload_mode.unwrap_or(defaults.auto_reload_mode),
      auto_reload_delay_ms: self.auto_reload_delay.unwrap_or(defaults.auto_reload_delay_ms),
      local_file_require: self
        .enable_local_file_require_in_dev
        .unwrap_or(defaults.local_file_require),
    };

    if options.host.trim().is_empty() {
      return Err(ConfigError::Invalid {
        name: "host",
        reason: "must not be empty".to_string(),
      });
    }
    if options.port == 0 {
      return Err(ConfigError::Invalid {
        name: "port",
        reason: "must be between 1 and 65535".to_string(),
      });
    }
    if options.outdir.as_os_str().is_empty() {
      return Err(ConfigError::Invalid {
        name: "outdir",
        reason: "must not be empty".to_string(),
      });
    }

    if options.is_dev()
      && options.local_file_require
      && options.auto_reload
      && options.auto_reload_mode == ReloadMode::Reinstall
    {
      warn!("`reinstall` reload needs the loader element; falling back to `refresh` with local file require");
    }

    Ok(options)
  }
}
