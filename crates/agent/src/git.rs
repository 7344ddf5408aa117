//! [`SourceControl`] over the `git` command line.

use std::path::Path;

use async_trait::async_trait;
use pipeline::{AuthenticatedRemote, BranchName, CommitIdentity, ProcessError, SourceControl};
use tracing::info;

use crate::CommandLine;

/// Shells out to `git`. Interactive credential prompts are disabled so a bad
/// token fails fast instead of hanging the run.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    /// `-c key=value` overrides passed to every invocation.
    overrides: Vec<(String, String)>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            overrides: Vec::new(),
        }
    }

    /// Adds a configuration override, e.g. a `url.<base>.insteadOf` rewrite
    /// for hosts reached through a mirror.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    fn git(&self, dir: &Path) -> CommandLine {
        let mut line = CommandLine::new(&self.program, dir).env("GIT_TERMINAL_PROMPT", "0");
        for (key, value) in &self.overrides {
            line = line.arg("-c").arg(format!("{key}={value}"));
        }
        line
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn clone_repository(
        &self,
        remote: &AuthenticatedRemote,
        public_url: &str,
        dir: &Path,
    ) -> Result<(), ProcessError> {
        self.git(dir)
            .args(["clone", remote.expose_url(), "."])
            .secrets(remote.secrets())
            .run()
            .await?;
        self.git(dir)
            .args(["remote", "set-url", "origin", public_url])
            .run()
            .await?;
        info!(dir = %dir.display(), url = public_url, "cloned repository");
        Ok(())
    }

    async fn create_branch(&self, dir: &Path, branch: &BranchName) -> Result<(), ProcessError> {
        self.git(dir)
            .args(["checkout", "-b", branch.as_str()])
            .run()
            .await?;
        Ok(())
    }

    async fn commit_all(
        &self,
        dir: &Path,
        identity: &CommitIdentity,
        message: &str,
    ) -> Result<(), ProcessError> {
        self.git(dir)
            .args(["config", "user.name", identity.name.as_str()])
            .run()
            .await?;
        self.git(dir)
            .args(["config", "user.email", identity.email.as_str()])
            .run()
            .await?;
        self.git(dir).args(["add", "."]).run().await?;
        self.git(dir).args(["commit", "-m", message]).run().await?;
        Ok(())
    }

    async fn push_branch(
        &self,
        dir: &Path,
        remote: &AuthenticatedRemote,
        branch: &BranchName,
    ) -> Result<(), ProcessError> {
        self.git(dir)
            .args(["push", remote.expose_url(), branch.as_str()])
            .secrets(remote.secrets())
            .run()
            .await?;
        info!(branch = %branch, "pushed branch");
        Ok(())
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
