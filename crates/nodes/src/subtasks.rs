//! Sub-task generation from the issue's most recent PRD.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    compose_subtasks, BotConfig, Command, ContentGenerator, EventContext, IssueTracker,
    PrdArtifact,
};
use tracing::info;

use crate::handler::{post_best_effort, CommandHandler, RunError, RunOutcome};
use crate::prompts;

pub struct SubtaskPipeline {
    generator: Arc<dyn ContentGenerator>,
    mention: String,
}

impl SubtaskPipeline {
    pub fn new(config: &BotConfig, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            generator,
            mention: config.mention(),
        }
    }

    /// Comment posted when the issue has no PRD yet.
    pub fn no_prd_message(&self) -> String {
        format!(
            "I couldn't find a PRD to generate sub-tasks from. Please run `{} {}` first.",
            self.mention,
            Command::GeneratePrd
        )
    }

    async fn run(
        &self,
        context: &EventContext,
        tracker: &dyn IssueTracker,
    ) -> Result<RunOutcome, RunError> {
        let issue = context.issue.number;
        let comments = tracker.list_comments(issue).await?;

        let Some(prd) = PrdArtifact::find_latest(&comments) else {
            info!("no PRD found, asking for need_prd first");
            tracker.create_comment(issue, &self.no_prd_message()).await?;
            return Ok(RunOutcome::NoPrdFound);
        };

        info!(comment = %prd.comment_id, "generating sub-tasks from PRD");
        let checklist = self.generator.generate(&prompts::subtasks(&prd.body)).await?;
        tracker
            .create_comment(issue, &compose_subtasks(&checklist))
            .await?;
        Ok(RunOutcome::SubtasksPosted)
    }
}

#[async_trait]
impl CommandHandler for SubtaskPipeline {
    async fn handle(
        &self,
        context: &EventContext,
        tracker: Arc<dyn IssueTracker>,
    ) -> Result<RunOutcome, RunError> {
        let result = self.run(context, tracker.as_ref()).await;
        if let Err(err) = &result {
            let message = format!(
                "I couldn't generate sub-tasks for issue #{}. **Reason:** {err}.",
                context.issue.number
            );
            post_best_effort(tracker.as_ref(), context.issue.number, &message).await;
        }
        result
    }
}

#[cfg(test)]
#[path = "subtasks_tests.rs"]
mod tests;
