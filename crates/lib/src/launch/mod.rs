//! Opening URLs in a browser.
//!
//! The install handoff is fire-and-forget: once the opener has been started
//! there is no signal telling whether the host actually installed anything.

use std::future::Future;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors raised while starting a browser.
#[derive(Debug, Error)]
pub enum LaunchError {
  #[error("failed to start browser `{program}`: {source}")]
  Spawn { program: String, source: std::io::Error },

  #[error("browser command is empty")]
  EmptyCommand,
}

/// Something that can open a URL.
pub trait Launcher {
  fn open(&self, url: &str) -> impl Future<Output = Result<(), LaunchError>> + Send;
}

/// The system's default browser, or an explicit browser command.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
  command: Option<String>,
}

impl SystemBrowser {
  /// Use the platform opener.
  pub fn new() -> Self {
    Self::default()
  }

  /// Use `command` instead, e.g. `firefox` or `chromium --new-window`.
  /// The URL is passed as the last argument.
  pub fn with_command(command: impl Into<String>) -> Self {
    Self {
      command: Some(command.into()),
    }
  }

  fn argv(&self, url: &str) -> Result<(String, Vec<String>), LaunchError> {
    match &self.command {
      Some(command) => {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(LaunchError::EmptyCommand)?;
        let mut args: Vec<String> = parts.collect();
        args.push(url.to_string());
        Ok((program, args))
      }
      None => Ok(platform_opener(url)),
    }
  }
}

#[cfg(target_os = "macos")]
fn platform_opener(url: &str) -> (String, Vec<String>) {
  ("open".to_string(), vec![url.to_string()])
}

#[cfg(windows)]
fn platform_opener(url: &str) -> (String, Vec<String>) {
  // the empty string is the window title `start` expects first
  (
    "cmd".to_string(),
    vec!["/C".to_string(), "start".to_string(), String::new(), url.to_string()],
  )
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_opener(url: &str) -> (String, Vec<String>) {
  ("xdg-open".to_string(), vec![url.to_string()])
}

impl Launcher for SystemBrowser {
  async fn open(&self, url: &str) -> Result<(), LaunchError> {
    let (program, args) = self.argv(url)?;
    debug!(program = %program, "opening browser");

    Command::new(&program)
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .map_err(|source| LaunchError::Spawn { program, source })?;

    Ok(())
  }
}

/// Log the URL instead of opening it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnly;

impl Launcher for LogOnly {
  async fn open(&self, url: &str) -> Result<(), LaunchError> {
    info!(url = %url, "browser launch disabled, open this address to install");
    Ok(())
  }
}
