//! Capability ("grant") inference.
//!
//! A userscript may only call the privileged host functions its manifest lists
//! under `@grant`. Rather than asking users to keep that list in sync by hand,
//! the compiled bundle is parsed and every reference to a catalog entry is
//! collected. This is a convenience heuristic, not a security boundary.

mod detect;

pub use detect::{DetectError, detect};

/// Privileged symbols a userscript host can provide.
///
/// Dotted entries match `object.property` member accesses; the rest match bare
/// identifiers.
pub const CATALOG: &[&str] = &[
  "unsafeWindow",
  "window.close",
  "window.focus",
  "window.onurlchange",
  "GM_addStyle",
  "GM_addElement",
  "GM_deleteValue",
  "GM_listValues",
  "GM_addValueChangeListener",
  "GM_removeValueChangeListener",
  "GM_setValue",
  "GM_getValue",
  "GM_log",
  "GM_getResourceText",
  "GM_getResourceURL",
  "GM_registerMenuCommand",
  "GM_unregisterMenuCommand",
  "GM_openInTab",
  "GM_xmlhttpRequest",
  "GM_download",
  "GM_getTab",
  "GM_saveTab",
  "GM_getTabs",
  "GM_notification",
  "GM_setClipboard",
  "GM_info",
  "GM_cookie",
  "GM_webRequest",
];

/// Name of the namespaced API object, exposed alongside the catalog functions.
pub const GM_NAMESPACE: &str = "GM";

/// Catalog entries that are plain global names (no member access).
pub fn global_names() -> impl Iterator<Item = &'static str> {
  CATALOG.iter().copied().filter(|name| !name.contains('.'))
}
