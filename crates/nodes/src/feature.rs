//! The autonomous feature workflow.
//!
//! A strict forward state machine:
//!
//! ```text
//! Parsed → Acknowledged → WorkspaceReady → Cloned → Branched → Patched
//!        → Committed → Pushed → PullRequestOpened
//! ```
//!
//! A failing transition ends the run in the failed state. Whatever the exit
//! path, the run ends with exactly one user-visible comment (the pull request
//! link or a diagnostic naming the failing stage) and the workspace is gone by
//! the time that comment is posted. No stage is retried.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    AuthenticatedRemote, Authenticator, BotConfig, BranchName, EventContext, FeatureRequest,
    IssueNumber, IssueTracker, PatchAgent, ProcessError, PullRequestDraft, SourceControl,
    Timestamp, FILES_PREFIX,
};
use thiserror::Error;
use tracing::{error, info};

use crate::handler::{post_best_effort, CommandHandler, RunError, RunOutcome};
use crate::prompts;
use crate::workspace::Workspace;

/// Captured output longer than this is cut from the front in diagnostics.
const MAX_DIAGNOSTIC_OUTPUT: usize = 3_000;

/// States of the workflow. A failure is attributed to the state being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureStage {
    Parsed,
    Acknowledged,
    WorkspaceReady,
    Cloned,
    Branched,
    Patched,
    Committed,
    Pushed,
    PullRequestOpened,
}

impl FeatureStage {
    /// What the bot was doing when it tried to enter this state.
    pub fn activity(self) -> &'static str {
        match self {
            FeatureStage::Parsed => "reading the file list from the issue",
            FeatureStage::Acknowledged => "acknowledging the request",
            FeatureStage::WorkspaceReady => "creating a temporary workspace",
            FeatureStage::Cloned => "cloning the repository",
            FeatureStage::Branched => "creating the feature branch",
            FeatureStage::Patched => "applying the requested changes",
            FeatureStage::Committed => "committing the changes",
            FeatureStage::Pushed => "pushing the branch",
            FeatureStage::PullRequestOpened => "opening the pull request",
        }
    }
}

impl std::fmt::Display for FeatureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A failed transition.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {reason}")]
pub struct WorkflowError {
    pub stage: FeatureStage,
    pub reason: String,
    /// Captured process output, secrets already scrubbed.
    pub output: Option<String>,
}

impl WorkflowError {
    fn new(stage: FeatureStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
            output: None,
        }
    }

    fn process(stage: FeatureStage, err: ProcessError) -> Self {
        Self {
            stage,
            output: err.output().map(str::to_string),
            reason: err.to_string(),
        }
    }

    /// The diagnostic comment posted for this failure.
    pub fn render(&self, issue: IssueNumber) -> String {
        let mut message = format!(
            "I failed to implement the feature for issue #{issue}.\n\n\
             **Stage:** {} ({})\n**Reason:** {}.",
            self.stage,
            self.stage.activity(),
            self.reason
        );
        if let Some(output) = &self.output {
            message.push_str(&format!(
                "\n\n<details><summary>Output</summary>\n\n```\n{}\n```\n\n</details>",
                tail(output.trim_end(), MAX_DIAGNOSTIC_OUTPUT)
            ));
        }
        message
    }
}

/// Keeps the last `max` bytes of `text`, on a character boundary.
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Clone → branch → patch → commit → push → pull request.
pub struct FeatureWorkflow {
    config: Arc<BotConfig>,
    authenticator: Arc<dyn Authenticator>,
    source_control: Arc<dyn SourceControl>,
    patch_agent: Arc<dyn PatchAgent>,
}

impl FeatureWorkflow {
    pub fn new(
        config: Arc<BotConfig>,
        authenticator: Arc<dyn Authenticator>,
        source_control: Arc<dyn SourceControl>,
        patch_agent: Arc<dyn PatchAgent>,
    ) -> Self {
        Self {
            config,
            authenticator,
            source_control,
            patch_agent,
        }
    }

    /// Runs every transition; the workspace is dropped (and removed) before
    /// this returns, on every path.
    async fn execute(
        &self,
        context: &EventContext,
        tracker: &dyn IssueTracker,
    ) -> Result<String, WorkflowError> {
        let issue = &context.issue;
        let repository = &context.repository;

        let request = FeatureRequest::parse(&issue.body);
        if request.is_empty() {
            return Err(WorkflowError::new(
                FeatureStage::Parsed,
                format!(
                    "No files to modify. Please specify the files in the issue body using the \
                     format `{FILES_PREFIX} file1.go, path/to/file2.go`"
                ),
            ));
        }
        advanced(FeatureStage::Parsed);

        tracker
            .create_comment(
                issue.number,
                &format!(
                    "Alright, I'm on it! I will try to implement the feature for issue #{}. \
                     Give me a few minutes...",
                    issue.number
                ),
            )
            .await
            .map_err(|err| WorkflowError::new(FeatureStage::Acknowledged, err.to_string()))?;
        advanced(FeatureStage::Acknowledged);

        let workspace = Workspace::create(
            self.config.workspace_root().map(|root| root.as_path()),
            issue.number,
        )
        .map_err(|err| WorkflowError::new(FeatureStage::WorkspaceReady, err.to_string()))?;
        advanced(FeatureStage::WorkspaceReady);

        let token = self
            .authenticator
            .token_for(context.installation)
            .await
            .map_err(|err| WorkflowError::new(FeatureStage::Cloned, err.to_string()))?;
        let remote = AuthenticatedRemote::new(&repository.clone_url, token).ok_or_else(|| {
            WorkflowError::new(
                FeatureStage::Cloned,
                format!("unsupported clone URL '{}'", repository.clone_url),
            )
        })?;
        self.source_control
            .clone_repository(&remote, &repository.clone_url, workspace.path())
            .await
            .map_err(|err| WorkflowError::process(FeatureStage::Cloned, err))?;
        advanced(FeatureStage::Cloned);

        let branch = feature_branch(issue.number, Timestamp::now())
            .ok_or_else(|| WorkflowError::new(FeatureStage::Branched, "empty branch name"))?;
        self.source_control
            .create_branch(workspace.path(), &branch)
            .await
            .map_err(|err| WorkflowError::process(FeatureStage::Branched, err))?;
        advanced(FeatureStage::Branched);

        let instruction = prompts::feature_instruction(&issue.title, &issue.body);
        let patch = self
            .patch_agent
            .apply_patch(&instruction, &request.files, workspace.path());
        let patched = match self.config.patch_timeout() {
            Some(limit) => match tokio::time::timeout(limit, patch).await {
                Ok(result) => result,
                Err(_) => Err(ProcessError::TimedOut {
                    program: "patch agent".to_string(),
                    after: limit,
                }),
            },
            None => patch.await,
        };
        patched.map_err(|err| WorkflowError::process(FeatureStage::Patched, err))?;
        advanced(FeatureStage::Patched);

        let message = format!(
            "feat: Implement feature for #{}\n\nThis commit was automatically generated by {} \
             based on the issue.",
            issue.number,
            self.config.mention()
        );
        self.source_control
            .commit_all(workspace.path(), &self.config.commit_identity(), &message)
            .await
            .map_err(|err| WorkflowError::process(FeatureStage::Committed, err))?;
        advanced(FeatureStage::Committed);

        self.source_control
            .push_branch(workspace.path(), &remote, &branch)
            .await
            .map_err(|err| WorkflowError::process(FeatureStage::Pushed, err))?;
        advanced(FeatureStage::Pushed);
        drop(workspace);

        let draft = PullRequestDraft {
            head: branch,
            base: repository.default_branch.clone(),
            title: format!("Implement Feature: {}", issue.title),
            body: format!(
                "This PR implements the feature requested in #{}. It was automatically generated \
                 by {}.",
                issue.number,
                self.config.mention()
            ),
        };
        let url = tracker
            .create_pull_request(&draft)
            .await
            .map_err(|err| WorkflowError::new(FeatureStage::PullRequestOpened, err.to_string()))?;
        advanced(FeatureStage::PullRequestOpened);
        Ok(url)
    }
}

fn advanced(stage: FeatureStage) {
    info!(%stage, "feature workflow advanced");
}

/// `feature/issue-<n>-<unix millis>`; unique per run on the same issue.
pub fn feature_branch(issue: IssueNumber, now: Timestamp) -> Option<BranchName> {
    BranchName::new(format!("feature/issue-{issue}-{}", now.unix_millis()))
}

#[async_trait]
impl CommandHandler for FeatureWorkflow {
    async fn handle(
        &self,
        context: &EventContext,
        tracker: Arc<dyn IssueTracker>,
    ) -> Result<RunOutcome, RunError> {
        let issue = context.issue.number;
        match self.execute(context, tracker.as_ref()).await {
            Ok(url) => {
                let message = format!(
                    "I've created a Pull Request for issue #{issue}. You can review it here: {url}"
                );
                post_best_effort(tracker.as_ref(), issue, &message).await;
                Ok(RunOutcome::PullRequestOpened { url })
            }
            Err(err) => {
                error!(stage = %err.stage, reason = %err.reason, "feature workflow failed");
                post_best_effort(tracker.as_ref(), issue, &err.render(issue)).await;
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;
