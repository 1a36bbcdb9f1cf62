//! Implementation of the `usbuild grants` command.
//!
//! Runs capability detection over an already compiled script and prints the
//! catalog entries it references, in order of first use.

use std::path::Path;

use anyhow::{Context, Result};

use usbuild_lib::grants::{CATALOG, detect};

use crate::output::{print_info, print_json, print_success, symbols};

pub fn cmd_grants(file: &Path, json: bool) -> Result<()> {
  let code = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
  let found = detect(&code, CATALOG).with_context(|| format!("Failed to analyze {}", file.display()))?;
  let grants: Vec<&str> = found.iter().map(String::as_str).collect();

  if json {
    let json_output = serde_json::json!({ "file": file.display().to_string(), "grants": grants });
    print_json(&json_output)?;
    return Ok(());
  }

  if grants.is_empty() {
    print_info(&format!("{} uses no privileged capabilities", file.display()));
    return Ok(());
  }

  print_success(&format!("{} uses {} capability(ies)", file.display(), grants.len()));
  for grant in grants {
    println!("  {} {}", symbols::PLUS, grant);
  }
  Ok(())
}
