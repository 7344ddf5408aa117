//! In-memory fakes of every port, shared by the orchestration tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    AuthError, AuthenticatedRemote, Authenticator, BranchName, Comment, CommentId,
    CommitIdentity, ContentGenerator, EventContext, GenerationError, InstallationId,
    InstallationToken, Issue, IssueNumber, IssueTracker, PatchAgent, ProcessError,
    PullRequestDraft, RepoFilePath, Repository, SourceControl, TrackerConnector, TrackerError,
};

pub const PR_URL: &str = "https://github.com/octo/widgets/pull/12";

pub fn context(title: &str, body: &str) -> EventContext {
    context_for_issue(7, title, body)
}

pub fn context_for_issue(number: u64, title: &str, body: &str) -> EventContext {
    EventContext {
        issue: Issue {
            number: IssueNumber::new(number),
            title: title.to_string(),
            body: body.to_string(),
        },
        repository: Repository {
            owner: "octo".into(),
            name: "widgets".into(),
            default_branch: BranchName::new("main").unwrap(),
            clone_url: "https://github.com/octo/widgets.git".into(),
        },
        installation: InstallationId::new(42),
    }
}

fn api_error(operation: &str, status: u16) -> TrackerError {
    TrackerError::Api {
        operation: operation.to_string(),
        status,
        message: "fake failure".to_string(),
        retry_after: None,
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTracker {
    comments: Mutex<Vec<Comment>>,
    posted: Mutex<Vec<String>>,
    pull_requests: Mutex<Vec<PullRequestDraft>>,
    readme: Option<Vec<u8>>,
    fail_list_comments: bool,
    fail_pull_request: bool,
    next_id: AtomicU64,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self {
            readme: Some(b"# Widgets\nA widget library.".to_vec()),
            next_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    pub fn with_comments(self, bodies: &[&str]) -> Self {
        let comments = bodies
            .iter()
            .enumerate()
            .map(|(index, body)| Comment {
                id: CommentId::new(index as u64 + 1),
                body: body.to_string(),
            })
            .collect();
        Self {
            comments: Mutex::new(comments),
            ..self
        }
    }

    pub fn without_readme(self) -> Self {
        Self {
            readme: None,
            ..self
        }
    }

    pub fn failing_list_comments(self) -> Self {
        Self {
            fail_list_comments: true,
            ..self
        }
    }

    pub fn failing_pull_request(self) -> Self {
        Self {
            fail_pull_request: true,
            ..self
        }
    }

    /// Bodies posted through `create_comment`, in order.
    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }

    pub fn pull_requests(&self) -> Vec<PullRequestDraft> {
        self.pull_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn get_repository_file(&self, path: &str) -> Result<Vec<u8>, TrackerError> {
        assert_eq!(path, "README.md");
        self.readme
            .clone()
            .ok_or_else(|| api_error("get repository file", 404))
    }

    async fn list_comments(&self, _issue: IssueNumber) -> Result<Vec<Comment>, TrackerError> {
        if self.fail_list_comments {
            return Err(api_error("list comments", 502));
        }
        Ok(self.comments.lock().unwrap().clone())
    }

    async fn create_comment(
        &self,
        _issue: IssueNumber,
        body: &str,
    ) -> Result<CommentId, TrackerError> {
        let id = CommentId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.posted.lock().unwrap().push(body.to_string());
        self.comments.lock().unwrap().push(Comment {
            id,
            body: body.to_string(),
        });
        Ok(id)
    }

    async fn create_pull_request(&self, draft: &PullRequestDraft) -> Result<String, TrackerError> {
        if self.fail_pull_request {
            return Err(api_error("create pull request", 422));
        }
        self.pull_requests.lock().unwrap().push(draft.clone());
        Ok(PR_URL.to_string())
    }
}

pub struct FakeConnector {
    pub tracker: Arc<FakeTracker>,
}

#[async_trait]
impl TrackerConnector for FakeConnector {
    async fn connect(
        &self,
        _installation: InstallationId,
        _repository: &Repository,
    ) -> Result<Arc<dyn IssueTracker>, TrackerError> {
        Ok(self.tracker.clone())
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Answers prompts from a script, in order; an exhausted script is an error.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

pub fn upstream_failure() -> GenerationError {
    GenerationError::Api {
        status: 500,
        message: "backend unavailable".to_string(),
        retry_after: None,
    }
}

// ---------------------------------------------------------------------------
// Authenticator, source control, patch agent
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeAuthenticator {
    pub fail: bool,
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn token_for(
        &self,
        _installation: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        if self.fail {
            return Err(AuthError::Api {
                status: 401,
                message: "bad credentials".to_string(),
            });
        }
        Ok(InstallationToken::new("ghs_test_token"))
    }
}

fn exited(program: &str, output: &str) -> ProcessError {
    ProcessError::Exited {
        program: program.to_string(),
        status: Some(1),
        output: output.to_string(),
    }
}

/// Records git operations; optionally fails one of them.
#[derive(Default)]
pub struct FakeSourceControl {
    pub fail_at: Option<&'static str>,
    calls: Mutex<Vec<String>>,
    workspace: Mutex<Option<PathBuf>>,
}

impl FakeSourceControl {
    pub fn failing_at(operation: &'static str) -> Self {
        Self {
            fail_at: Some(operation),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// The directory the repository was cloned into.
    pub fn workspace(&self) -> Option<PathBuf> {
        self.workspace.lock().unwrap().clone()
    }

    fn record(&self, call: String, operation: &str) -> Result<(), ProcessError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(operation) {
            return Err(exited("git", &format!("fatal: {operation} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn clone_repository(
        &self,
        remote: &AuthenticatedRemote,
        public_url: &str,
        dir: &Path,
    ) -> Result<(), ProcessError> {
        assert!(dir.is_dir(), "workspace must exist before cloning");
        assert!(remote.expose_url().contains("x-access-token:ghs_test_token@"));
        *self.workspace.lock().unwrap() = Some(dir.to_path_buf());
        self.record(format!("clone {public_url}"), "clone")
    }

    async fn create_branch(&self, _dir: &Path, branch: &BranchName) -> Result<(), ProcessError> {
        self.record(format!("branch {branch}"), "branch")
    }

    async fn commit_all(
        &self,
        _dir: &Path,
        identity: &CommitIdentity,
        message: &str,
    ) -> Result<(), ProcessError> {
        let subject = message.lines().next().unwrap_or_default();
        self.record(format!("commit {} {subject}", identity.name), "commit")
    }

    async fn push_branch(
        &self,
        _dir: &Path,
        _remote: &AuthenticatedRemote,
        branch: &BranchName,
    ) -> Result<(), ProcessError> {
        self.record(format!("push {branch}"), "push")
    }
}

#[derive(Default)]
pub struct FakePatchAgent {
    pub fail: bool,
    pub delay: Option<Duration>,
    calls: Mutex<Vec<(String, Vec<String>, PathBuf)>>,
}

impl FakePatchAgent {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// `(instruction, allowed files, working dir)` per invocation.
    pub fn calls(&self) -> Vec<(String, Vec<String>, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PatchAgent for FakePatchAgent {
    async fn apply_patch(
        &self,
        instruction: &str,
        allowed_files: &[RepoFilePath],
        working_dir: &Path,
    ) -> Result<(), ProcessError> {
        self.calls.lock().unwrap().push((
            instruction.to_string(),
            allowed_files.iter().map(|f| f.as_str().to_string()).collect(),
            working_dir.to_path_buf(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(exited("gemini", "Error: model refused to edit ui/theme.ts"));
        }
        Ok(())
    }
}
