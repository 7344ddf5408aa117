//! [`PatchAgent`] that delegates the edit to a code-editing CLI.

use std::path::Path;

use async_trait::async_trait;
use pipeline::{PatchAgent, ProcessError, RepoFilePath};
use tracing::info;

use crate::CommandLine;

pub const DEFAULT_PATCH_PROGRAM: &str = "gemini";
/// Non-interactive mode with every file in the tree available as context.
pub const DEFAULT_PATCH_ARGS: &[&str] = &["-y", "-a"];

/// Runs `program <instruction> <args...> <files...>` inside the working tree.
///
/// Success means exit status zero; what the program changed is left for the
/// commit stage to pick up.
#[derive(Debug, Clone)]
pub struct CliPatchAgent {
    program: String,
    args: Vec<String>,
}

impl Default for CliPatchAgent {
    fn default() -> Self {
        Self::new(
            DEFAULT_PATCH_PROGRAM,
            DEFAULT_PATCH_ARGS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl CliPatchAgent {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl PatchAgent for CliPatchAgent {
    async fn apply_patch(
        &self,
        instruction: &str,
        allowed_files: &[RepoFilePath],
        working_dir: &Path,
    ) -> Result<(), ProcessError> {
        let output = CommandLine::new(&self.program, working_dir)
            .arg(instruction)
            .args(self.args.iter().cloned())
            .args(allowed_files.iter().map(|f| f.as_str().to_string()))
            .run()
            .await?;
        info!(
            program = %self.program,
            files = allowed_files.len(),
            output_chars = output.len(),
            "patch agent finished"
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
#[path = "patch_tests.rs"]
mod tests;
