//! Development bridge ("proxy") script synthesis.
//!
//! In development mode the browser installs a tiny loader once. The loader
//! pulls the live bundle from the local server on every page load, so edits
//! show up without reinstalling. When live reload is on, it also subscribes
//! to the server's change stream.

mod handoff;

pub use handoff::handoff_url;

use crate::grants::{GM_NAMESPACE, global_names};
use crate::options::{BuildOptions, ReloadMode};

/// Generate the bridge script body for the bundle served at `bundle_url`.
///
/// `events_url` is the change-event stream; it is only used when live reload
/// is enabled. The manifest header is rendered separately.
///
/// With `local_file_require` set the host loads the bundle through an
/// `@require file://` line instead, so no loader element is inserted and
/// live reload falls back to a full page refresh.
pub fn synthesize(bundle_url: &str, events_url: &str, options: &BuildOptions) -> String {
  let mut parts = Vec::new();
  let inserts_loader = !options.local_file_require;

  if inserts_loader {
    parts.push(insert_script(bundle_url));
    parts.push(expose_capabilities());
  }

  if options.auto_reload {
    let mode = if inserts_loader {
      options.auto_reload_mode
    } else {
      ReloadMode::Refresh
    };
    parts.push(auto_reload(events_url, mode, options.auto_reload_delay_ms, inserts_loader));
  }

  parts.join("\n")
}

fn js_string(value: &str) -> String {
  // A JSON string literal is a valid JavaScript string literal.
  serde_json::Value::String(value.to_string()).to_string()
}

fn insert_script(src: &str) -> String {
  format!(
    r#"
function insertScript() {{
    const script = document.createElement('script');
    script.src = {src};
    const head = document.head;
    head.insertBefore(script, head.firstChild);
    return () => head.removeChild(script);
}}
"#,
    src = js_string(src)
  )
}

/// Copy host-provided functions onto the page global so the inserted script,
/// which runs in page context, can reach them.
fn expose_capabilities() -> String {
  global_names()
    .chain(std::iter::once(GM_NAMESPACE))
    .map(|name| format!("if (typeof {name} !== 'undefined') unsafeWindow.{name} = {name};"))
    .collect::<Vec<_>>()
    .join("\n")
}

fn auto_reload(events_url: &str, mode: ReloadMode, delay_ms: u64, inserts_loader: bool) -> String {
  let action = match mode {
    ReloadMode::Refresh => "location.reload();",
    ReloadMode::Reinstall => "remove(); remove = insertScript();",
  };
  let init = if inserts_loader {
    "let remove = insertScript();"
  } else {
    ""
  };

  format!(
    r#"
{init}
let debounceTimer;
new EventSource({url}).addEventListener('change', () => {{
    clearTimeout(debounceTimer);
    debounceTimer = setTimeout(() => {{ {action} }}, {delay_ms});
}});
"#,
    url = js_string(events_url)
  )
}
