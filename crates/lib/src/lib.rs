//! usbuild-lib: build userscripts and keep them live during development.
//!
//! - [`manifest`]: renders the `// ==UserScript==` metadata block
//! - [`grants`]: infers the `@grant` list from compiled output
//! - [`bridge`]: synthesizes the development loader and the install handoff page
//! - [`bundle`]: compile sessions over a delegated bundler
//! - [`serve`]: serves the output directory and the change stream
//! - [`orchestrate`]: ties a whole run together

pub mod bridge;
pub mod bundle;
pub mod error;
pub mod grants;
pub mod launch;
pub mod manifest;
pub mod options;
pub mod orchestrate;
pub mod serve;

pub use error::BuildError;
pub use orchestrate::{BuildRequest, Launched, Orchestrator};
