//! Port traits: the narrow capability surfaces the engine depends on.
//!
//! Infrastructure crates implement these; the orchestration crate only ever
//! holds `Arc<dyn …>` handles to them, so every external collaborator can be
//! replaced by an in-memory fake in tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    AuthError, AuthenticatedRemote, BranchName, Comment, CommentId, CommitIdentity,
    GenerationError, InstallationId, InstallationToken, IssueNumber, ProcessError, RepoFilePath,
    Repository, TrackerError, Trigger,
};

/// Converts an installation into a short-lived credential.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Fetches a fresh token. Tokens are never cached across runs.
    async fn token_for(&self, installation: InstallationId)
        -> Result<InstallationToken, AuthError>;
}

/// A pull request the bot wants to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub head: BranchName,
    pub base: BranchName,
    pub title: String,
    pub body: String,
}

/// Issue-tracker operations, scoped to one repository and one credential.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Raw contents of a file on the default branch.
    async fn get_repository_file(&self, path: &str) -> Result<Vec<u8>, TrackerError>;

    /// Every comment on the issue, in creation order.
    async fn list_comments(&self, issue: IssueNumber) -> Result<Vec<Comment>, TrackerError>;

    async fn create_comment(
        &self,
        issue: IssueNumber,
        body: &str,
    ) -> Result<CommentId, TrackerError>;

    /// Opens a pull request and returns its web URL.
    async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<String, TrackerError>;
}

/// Builds an [`IssueTracker`] for one installation and repository.
#[async_trait]
pub trait TrackerConnector: Send + Sync {
    async fn connect(
        &self,
        installation: InstallationId,
        repository: &Repository,
    ) -> Result<Arc<dyn IssueTracker>, TrackerError>;
}

/// AI text generation: one prompt in, one text out, no retained state.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Source-control operations on a local working tree.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clones into `dir` (which must be empty) and leaves `origin` pointing at
    /// `public_url`, so no credential remains in the working tree.
    async fn clone_repository(
        &self,
        remote: &AuthenticatedRemote,
        public_url: &str,
        dir: &Path,
    ) -> Result<(), ProcessError>;

    /// Creates `branch` from the current HEAD and checks it out.
    async fn create_branch(&self, dir: &Path, branch: &BranchName) -> Result<(), ProcessError>;

    /// Stages every change and commits it as `identity`.
    async fn commit_all(
        &self,
        dir: &Path,
        identity: &CommitIdentity,
        message: &str,
    ) -> Result<(), ProcessError>;

    async fn push_branch(
        &self,
        dir: &Path,
        remote: &AuthenticatedRemote,
        branch: &BranchName,
    ) -> Result<(), ProcessError>;
}

/// The opaque code-modification capability.
///
/// The engine interprets nothing but success or failure (with captured output).
#[async_trait]
pub trait PatchAgent: Send + Sync {
    async fn apply_patch(
        &self,
        instruction: &str,
        allowed_files: &[RepoFilePath],
        working_dir: &Path,
    ) -> Result<(), ProcessError>;
}

/// Accepts triggers without waiting for the work they cause.
pub trait TriggerSink: Send + Sync {
    fn submit(&self, trigger: Trigger);
}
