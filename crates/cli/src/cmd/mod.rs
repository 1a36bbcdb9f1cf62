mod build;
mod grants;

pub use build::{BuildArgs, cmd_build};
pub use grants::cmd_grants;
