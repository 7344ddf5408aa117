//! External-process adapters.
//!
//! [`GitCli`] implements [`pipeline::SourceControl`] by shelling out to `git`;
//! [`CliPatchAgent`] implements [`pipeline::PatchAgent`] by running a
//! code-editing CLI inside the working tree. Both go through the same process
//! runner, which captures stdout then stderr and scrubs credentials
//! from everything it logs or returns.

mod git;
mod patch;
mod process;

pub use git::GitCli;
pub use patch::{CliPatchAgent, DEFAULT_PATCH_ARGS, DEFAULT_PATCH_PROGRAM};
pub use process::{redact, CommandLine, REDACTED};
