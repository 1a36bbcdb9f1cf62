//! Config file loading.
//!
//! The config file is TOML with two optional tables: `[userscript]` holds the
//! manifest fields in the order they should be rendered, `[options]` holds
//! build options under their camelCase names.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use usbuild_lib::manifest::BuildConfiguration;
use usbuild_lib::options::PartialOptions;

/// Looked up next to the entry module when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "usbuild.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
  #[serde(default)]
  pub userscript: BuildConfiguration,
  #[serde(default)]
  pub options: PartialOptions,
}

/// Load the explicit config file, or the one next to `entry` if it exists.
pub fn load(explicit: Option<&Path>, entry: &Path) -> Result<ConfigFile> {
  let path = match explicit {
    Some(path) => path.to_path_buf(),
    None => {
      let beside = beside_entry(entry);
      if !beside.is_file() {
        debug!(path = %beside.display(), "no config file");
        return Ok(ConfigFile::default());
      }
      beside
    }
  };

  let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read config: {}", path.display()))?;
  let config = parse(&text).with_context(|| format!("Failed to parse config: {}", path.display()))?;
  debug!(path = %path.display(), fields = config.userscript.len(), "loaded config");
  Ok(config)
}

fn beside_entry(entry: &Path) -> PathBuf {
  entry
    .parent()
    .map(|dir| dir.join(CONFIG_FILE_NAME))
    .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

pub fn parse(text: &str) -> Result<ConfigFile> {
  Ok(toml::from_str(text)?)
}
