//! Userscript manifest rendering.
//!
//! The manifest is the metadata block at the top of an installable artifact:
//!
//! ```text
//! // ==UserScript==
//! // @name     hello world
//! // @version  0.1.0
//! // @grant    GM_setValue
//! // ==/UserScript==
//! ```
//!
//! Keys are right-padded so every value starts in the same column. Hosts reject
//! manifests whose first field is not `name`, so `name` is always moved first.

mod types;

pub use types::*;

/// First line of a manifest block.
pub const HEADER: &str = "// ==UserScript==";
/// Last line of a manifest block.
pub const FOOTER: &str = "// ==/UserScript==";

/// Spaces between the longest key and its value.
const KEY_PADDING: usize = 2;

/// Render the manifest block for `config`.
///
/// Pure and deterministic. The value column is `4 + longest key + 2` for every
/// field line, including keys whose sequence is empty (they render no lines but
/// still count toward the alignment). The block is followed by an empty line.
pub fn render(config: &BuildConfiguration) -> String {
  let ordered = name_first(config);

  let max_len = ordered.iter().map(|(key, _)| key.len()).max().unwrap_or(0);

  let mut lines = vec![HEADER.to_string()];
  for (key, value) in &ordered {
    let space = " ".repeat(max_len - key.len() + KEY_PADDING);
    let prefix = format!("// @{key}{space}");
    for element in value.elements() {
      lines.push(format!("{prefix}{element}"));
    }
  }
  lines.push(FOOTER.to_string());
  lines.push("\n".to_string());

  lines.join("\n")
}

fn name_first(config: &BuildConfiguration) -> Vec<(&str, &FieldValue)> {
  let mut ordered = Vec::with_capacity(config.len());
  if let Some(name) = config.get(NAME_FIELD) {
    ordered.push((NAME_FIELD, name));
  }
  ordered.extend(config.iter().filter(|(key, _)| *key != NAME_FIELD));
  ordered
}
