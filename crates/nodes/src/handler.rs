//! The contract every command handler implements, and what a run can end in.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{Command, EventContext, GenerationError, IssueNumber, IssueTracker, TrackerError};
use thiserror::Error;
use tracing::{info, warn};

use crate::feature::WorkflowError;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A PRD comment was posted.
    PrdPosted,
    /// A PRD already existed; nothing was generated or posted.
    PrdSkipped,
    /// A sub-task checklist was posted.
    SubtasksPosted,
    /// No PRD was found; the user was told to run `need_prd` first.
    NoPrdFound,
    /// The feature workflow opened a pull request.
    PullRequestOpened { url: String },
}

/// Why a run failed. The user has already been told, where possible.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The registry has no handler for the command.
    #[error("no handler registered for '{0}'")]
    NoHandler(Command),

    /// The dispatcher's worker pool was shut down while the run was waiting.
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// Entry point for one command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        context: &EventContext,
        tracker: Arc<dyn IssueTracker>,
    ) -> Result<RunOutcome, RunError>;
}

/// Posts a comment, logging instead of failing.
///
/// Used for diagnostics and other comments whose failure must not mask the
/// error that caused them.
pub(crate) async fn post_best_effort(tracker: &dyn IssueTracker, issue: IssueNumber, body: &str) {
    match tracker.create_comment(issue, body).await {
        Ok(comment) => info!(%issue, %comment, "posted comment"),
        Err(err) => warn!(%issue, error = %err, "failed to post comment"),
    }
}
