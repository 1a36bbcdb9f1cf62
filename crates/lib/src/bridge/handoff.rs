//! Install handoff page.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Build a self-contained `data:` URL for a page that navigates to
/// `artifact_url` and then closes itself.
///
/// Navigating to a `.user.js` address is what prompts the userscript host to
/// offer installation.
pub fn handoff_url(artifact_url: &str) -> String {
  let target = serde_json::Value::String(artifact_url.to_string()).to_string();
  let page = format!("<script>location.href = {target}; window.close()</script>");
  format!("data:text/html;base64,{}", STANDARD.encode(page))
}
