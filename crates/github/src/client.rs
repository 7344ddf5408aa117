//! REST implementation of [`IssueTracker`] for one repository.

use async_trait::async_trait;
use pipeline::{
    BranchName, Comment, CommentId, InstallationToken, Issue, IssueNumber, IssueTracker,
    PullRequestDraft, Repository, TrackerError,
};
use reqwest::header::{HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::http::{send_with_retry, GithubApiConfig, HttpFailure, Replay};

const PAGE_SIZE: usize = 100;
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

#[derive(Deserialize)]
struct CommentRow {
    id: u64,
    body: Option<String>,
}

#[derive(Deserialize)]
struct CreatedComment {
    id: u64,
}

#[derive(Deserialize)]
struct CreatedPullRequest {
    html_url: String,
}

#[derive(Deserialize)]
struct IssueRow {
    number: u64,
    title: String,
    body: Option<String>,
}

#[derive(Deserialize)]
struct OwnerRow {
    login: String,
}

#[derive(Deserialize)]
struct RepositoryRow {
    name: String,
    owner: OwnerRow,
    default_branch: String,
    clone_url: String,
}

/// Issue tracker bound to one repository and one installation token.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubApiConfig,
    token: InstallationToken,
    owner: String,
    name: String,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_base", &self.config.api_base)
            .field("repository", &format!("{}/{}", self.owner, self.name))
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn new(
        config: GithubApiConfig,
        token: InstallationToken,
        owner: &str,
        name: &str,
    ) -> Result<Self, TrackerError> {
        let http = config.build_client().map_err(|e| TrackerError::Transport {
            operation: "build client".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            http,
            config,
            token,
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Fetches a single issue. Used by one-shot runs that start from an issue
    /// number instead of a webhook payload.
    pub async fn get_issue(&self, issue: IssueNumber) -> Result<Issue, TrackerError> {
        let row: IssueRow = self
            .request_json("get issue", Replay::Safe, || {
                self.http.get(self.repo_url(&format!("/issues/{issue}")))
            })
            .await?;
        Ok(Issue {
            number: IssueNumber::new(row.number),
            title: row.title,
            body: row.body.unwrap_or_default(),
        })
    }

    pub async fn get_repository(&self) -> Result<Repository, TrackerError> {
        let row: RepositoryRow = self
            .request_json("get repository", Replay::Safe, || {
                self.http.get(self.repo_url(""))
            })
            .await?;
        let default_branch =
            BranchName::new(row.default_branch).ok_or_else(|| TrackerError::Decode {
                operation: "get repository".to_string(),
                message: "empty default branch".to_string(),
            })?;
        Ok(Repository {
            owner: row.owner.login,
            name: row.name,
            default_branch,
            clone_url: row.clone_url,
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        self.config
            .url(&format!("/repos/{}/{}{}", self.owner, self.name, suffix))
    }

    async fn send<F>(
        &self,
        operation: &str,
        replay: Replay,
        build: F,
    ) -> Result<reqwest::Response, TrackerError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        send_with_retry(&self.config, operation, replay, || {
            build().bearer_auth(self.token.expose())
        })
        .await
        .map_err(|failure| match failure {
            HttpFailure::Status {
                status,
                message,
                retry_after,
            } => TrackerError::Api {
                operation: operation.to_string(),
                status,
                message,
                retry_after,
            },
            HttpFailure::Transport { message, .. } => TrackerError::Transport {
                operation: operation.to_string(),
                message,
            },
        })
    }

    async fn request_json<T, F>(
        &self,
        operation: &str,
        replay: Replay,
        build: F,
    ) -> Result<T, TrackerError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let response = self.send(operation, replay, build).await?;
        response.json::<T>().await.map_err(|e| TrackerError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    #[instrument(skip(self), fields(owner = %self.owner, name = %self.name))]
    async fn get_repository_file(&self, path: &str) -> Result<Vec<u8>, TrackerError> {
        let url = self.repo_url(&format!("/contents/{}", path.trim_start_matches('/')));
        let response = self
            .send("get repository file", Replay::Safe, || {
                self.http
                    .get(&url)
                    .header(ACCEPT, HeaderValue::from_static(RAW_MEDIA_TYPE))
            })
            .await?;
        let bytes = response.bytes().await.map_err(|e| TrackerError::Decode {
            operation: "get repository file".to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn list_comments(&self, issue: IssueNumber) -> Result<Vec<Comment>, TrackerError> {
        let url = self.repo_url(&format!("/issues/{issue}/comments"));
        let mut page = 1_u32;
        let mut comments = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<CommentRow> = self
                .request_json("list comments", Replay::Safe, || {
                    self.http.get(&url).query(&[
                        ("per_page", "100"),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            comments.extend(chunk.into_iter().map(|row| Comment {
                id: CommentId::new(row.id),
                body: row.body.unwrap_or_default(),
            }));
            if chunk_len < PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        debug!(%issue, count = comments.len(), "listed issue comments");
        Ok(comments)
    }

    async fn create_comment(
        &self,
        issue: IssueNumber,
        body: &str,
    ) -> Result<CommentId, TrackerError> {
        let url = self.repo_url(&format!("/issues/{issue}/comments"));
        let payload = json!({ "body": body });
        let created: CreatedComment = self
            .request_json("create comment", Replay::UnlessProcessed, || {
                self.http.post(&url).json(&payload)
            })
            .await?;
        Ok(CommentId::new(created.id))
    }

    async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<String, TrackerError> {
        let url = self.repo_url("/pulls");
        let payload = json!({
            "title": draft.title,
            "head": draft.head.as_str(),
            "base": draft.base.as_str(),
            "body": draft.body,
        });
        let created: CreatedPullRequest = self
            .request_json("create pull request", Replay::UnlessProcessed, || {
                self.http.post(&url).json(&payload)
            })
            .await?;
        Ok(created.html_url)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
