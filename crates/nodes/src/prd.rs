//! PRD generation: idempotency check, draft, language detection, translation.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    ContentGenerator, EventContext, GenerationError, IssueTracker, PrdArtifact, Translation,
    FALLBACK_LANGUAGE,
};
use tracing::{info, warn};

use crate::handler::{post_best_effort, CommandHandler, RunError, RunOutcome};
use crate::prompts;

/// Repository file used as product context for the draft.
pub const README_PATH: &str = "README.md";

/// Generates a PRD comment for an issue unless one already exists.
pub struct PrdPipeline {
    generator: Arc<dyn ContentGenerator>,
}

impl PrdPipeline {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self { generator }
    }

    /// Runs the three generation stages and composes the comment body.
    ///
    /// Only the draft is fatal. A failed language detection falls back to
    /// [`FALLBACK_LANGUAGE`]; a failed translation yields an English-only PRD.
    pub async fn generate(
        &self,
        title: &str,
        body: &str,
        readme: &str,
    ) -> Result<String, GenerationError> {
        let english = self
            .generator
            .generate(&prompts::draft_prd(title, body, readme))
            .await?;

        let language = match self.generator.generate(&prompts::detect_language(body)).await {
            Ok(language) if !language.trim().is_empty() => language.trim().to_string(),
            Ok(_) => FALLBACK_LANGUAGE.to_string(),
            Err(err) => {
                warn!(error = %err, "language detection failed, using fallback");
                FALLBACK_LANGUAGE.to_string()
            }
        };

        match self
            .generator
            .generate(&prompts::translate_prd(&language, &english))
            .await
        {
            Ok(text) => Ok(PrdArtifact::compose(
                &english,
                Some(&Translation { language, text }),
            )),
            Err(err) => {
                warn!(error = %err, %language, "translation failed, posting English PRD only");
                Ok(PrdArtifact::compose(&english, None))
            }
        }
    }

    async fn run(
        &self,
        context: &EventContext,
        tracker: &dyn IssueTracker,
    ) -> Result<RunOutcome, RunError> {
        let issue = &context.issue;

        let comments = tracker.list_comments(issue.number).await?;
        if let Some(existing) = PrdArtifact::find_latest(&comments) {
            info!(comment = %existing.comment_id, "PRD already exists, skipping generation");
            return Ok(RunOutcome::PrdSkipped);
        }

        let readme = tracker.get_repository_file(README_PATH).await?;
        let readme = String::from_utf8_lossy(&readme);

        let prd = self.generate(&issue.title, &issue.body, &readme).await?;
        tracker.create_comment(issue.number, &prd).await?;
        info!("posted PRD");
        Ok(RunOutcome::PrdPosted)
    }
}

#[async_trait]
impl CommandHandler for PrdPipeline {
    async fn handle(
        &self,
        context: &EventContext,
        tracker: Arc<dyn IssueTracker>,
    ) -> Result<RunOutcome, RunError> {
        let result = self.run(context, tracker.as_ref()).await;
        if let Err(err) = &result {
            let message = format!(
                "I couldn't generate a PRD for issue #{}. **Reason:** {err}.",
                context.issue.number
            );
            post_best_effort(tracker.as_ref(), context.issue.number, &message).await;
        }
        result
    }
}

#[cfg(test)]
#[path = "prd_tests.rs"]
mod tests;
