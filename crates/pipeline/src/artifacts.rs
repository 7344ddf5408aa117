//! Comment artifacts the bot writes and later reads back, and the issue-body
//! convention for feature requests.
//!
//! All persisted state lives in issue comments. The PRD marker is the wire
//! convention that ties the two content pipelines together: the PRD pipeline
//! writes it and both pipelines look for it. It must stay byte-for-byte stable.

use crate::{Comment, CommentId, RepoFilePath};

/// First line of every PRD comment.
pub const PRD_MARKER: &str = "### PRD (Product Requirements Document)";

/// Heading of every sub-task checklist comment.
pub const SUBTASKS_HEADER: &str = "### Generated Sub-tasks";

/// Language label used when language detection fails.
pub const FALLBACK_LANGUAGE: &str = "the original language of the issue";

/// Issue-body line prefix listing the files a feature may touch.
pub const FILES_PREFIX: &str = "Files:";

// ---------------------------------------------------------------------------
// PRD artifact
// ---------------------------------------------------------------------------

/// A PRD found among an issue's comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrdArtifact {
    pub comment_id: CommentId,
    pub body: String,
}

impl PrdArtifact {
    /// Returns the newest comment containing [`PRD_MARKER`].
    ///
    /// `comments` must be in creation order. Earlier PRDs are ignored; there is
    /// no merging.
    pub fn find_latest(comments: &[Comment]) -> Option<Self> {
        comments
            .iter()
            .rev()
            .find(|comment| comment.body.contains(PRD_MARKER))
            .map(|comment| Self {
                comment_id: comment.id,
                body: comment.body.clone(),
            })
    }

    /// Lays out a PRD comment.
    ///
    /// With a translation the result carries both sections; without one it
    /// degrades to the English section alone.
    pub fn compose(english: &str, translation: Option<&Translation>) -> String {
        match translation {
            Some(translation) => format!(
                "{PRD_MARKER}\n\n---\n\n{english}\n\n---\n\n### PRD ({})\n\n{}",
                translation.language.trim(),
                translation.text
            ),
            None => format!("{PRD_MARKER}\n\n---\n\n{english}"),
        }
    }
}

/// A translated PRD section and the language it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub language: String,
    pub text: String,
}

/// Lays out a sub-task checklist comment around raw generator output.
pub fn compose_subtasks(checklist: &str) -> String {
    format!(
        "{SUBTASKS_HEADER}\n\nBased on the PRD, here are the suggested sub-tasks:\n\n{checklist}"
    )
}

// ---------------------------------------------------------------------------
// Feature request
// ---------------------------------------------------------------------------

/// The files an `implement_feature` run is allowed to modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequest {
    pub files: Vec<RepoFilePath>,
}

impl FeatureRequest {
    /// Reads the first line whose trimmed text starts with `Files:`.
    ///
    /// Entries are comma-separated and trimmed; empty entries are dropped.
    /// Lines after the first `Files:` line are not consulted.
    pub fn parse(issue_body: &str) -> Self {
        let files = issue_body
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(FILES_PREFIX))
            .map(|list| {
                list.split(',')
                    .filter_map(|entry| RepoFilePath::new(entry.trim()))
                    .collect()
            })
            .unwrap_or_default();
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
