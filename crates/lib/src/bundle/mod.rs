//! Build session management.
//!
//! Bundling is delegated to a compiling engine behind the [`Bundler`] trait.
//! A session either compiles once and hands back the body, or keeps watching
//! the module graph and rewrites the output file on every change.

mod esbuild;
mod types;

use std::future::Future;

pub use esbuild::{ESBUILD_ENV, Esbuild, WatchLine, classify_watch_line};
pub use types::*;

/// Module specifier of the guard marker. Imports of it resolve to a no-op stub.
pub const GUARD_MODULE: &str = "usbuild";
/// Statement label whose blocks are removed from production builds.
pub const GUARD_LABEL: &str = "usbuild";

/// Source of the stub module that guard marker imports resolve to. Its only
/// export is `build`, a no-op; code to elide goes in `usbuild:` labelled blocks.
pub const GUARD_STUB: &str = "function __usbuild() {}\nexport { __usbuild as build };\n";

/// Prepended to every bundle. The bundle runs inside an async IIFE so top-level
/// `await` works in hosts that load scripts as classic scripts.
pub const BANNER: &str = "\n;(async function () {";
/// Appended to every bundle.
pub const FOOTER: &str = "\n})();";

/// A compiling engine.
pub trait Bundler {
  /// Compile the module graph once and return the bundle.
  fn compile_once(&self, config: &SessionConfig) -> impl Future<Output = Result<CompiledArtifact, CompileError>> + Send;

  /// Start recompiling on every source change.
  ///
  /// Returns once the first compile is scheduled. Each successful rebuild
  /// sends one message on `changes`; failed rebuilds are logged and the last
  /// good output stays in place.
  fn watch(
    &self,
    config: &SessionConfig,
    changes: ChangeSender,
  ) -> impl Future<Output = Result<WatchSession, CompileError>> + Send;
}
