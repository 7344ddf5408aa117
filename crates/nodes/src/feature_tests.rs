use std::sync::Arc;
use std::time::Duration;

use pipeline::Timestamp;

use super::*;
use crate::testing::{
    context, FakeAuthenticator, FakePatchAgent, FakeSourceControl, FakeTracker, PR_URL,
};

const DARK_MODE_BODY: &str = "Files: ui/theme.ts\nPlease add a dark theme toggle.";

struct Harness {
    root: tempfile::TempDir,
    tracker: Arc<FakeTracker>,
    source_control: Arc<FakeSourceControl>,
    patch_agent: Arc<FakePatchAgent>,
    workflow: FeatureWorkflow,
}

fn harness_with(
    config: BotConfig,
    authenticator: FakeAuthenticator,
    source_control: FakeSourceControl,
    patch_agent: FakePatchAgent,
    tracker: FakeTracker,
) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let config = config.with_workspace_root(Some(root.path().to_path_buf()));
    let source_control = Arc::new(source_control);
    let patch_agent = Arc::new(patch_agent);
    let workflow = FeatureWorkflow::new(
        Arc::new(config),
        Arc::new(authenticator),
        source_control.clone(),
        patch_agent.clone(),
    );
    Harness {
        root,
        tracker: Arc::new(tracker),
        source_control,
        patch_agent,
        workflow,
    }
}

fn harness(source_control: FakeSourceControl, patch_agent: FakePatchAgent) -> Harness {
    harness_with(
        BotConfig::new("bot").unwrap(),
        FakeAuthenticator::default(),
        source_control,
        patch_agent,
        FakeTracker::new(),
    )
}

impl Harness {
    async fn run(&self, body: &str) -> Result<RunOutcome, RunError> {
        self.workflow
            .handle(&context("Add dark mode", body), self.tracker.clone())
            .await
    }

    fn workspace_root_is_empty(&self) -> bool {
        std::fs::read_dir(self.root.path()).unwrap().next().is_none()
    }
}

fn failed_stage(result: Result<RunOutcome, RunError>) -> FeatureStage {
    match result {
        Err(RunError::Workflow(err)) => err.stage,
        other => panic!("expected workflow failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dark_mode_request_opens_pull_request() {
    let h = harness(FakeSourceControl::default(), FakePatchAgent::default());

    let outcome = h.run(DARK_MODE_BODY).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::PullRequestOpened {
            url: PR_URL.to_string()
        }
    );

    let posted = h.tracker.posted();
    assert_eq!(posted.len(), 2);
    assert!(posted[0].starts_with("Alright, I'm on it!"));
    assert!(posted[1].contains(PR_URL));

    // Every step ran exactly once, in order.
    let calls = h.source_control.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], "clone https://github.com/octo/widgets.git");
    assert!(calls[1].starts_with("branch feature/issue-7-"));
    assert_eq!(calls[2], "commit bot feat: Implement feature for #7");
    assert!(calls[3].starts_with("push feature/issue-7-"));

    let patches = h.patch_agent.calls();
    assert_eq!(patches.len(), 1);
    assert!(patches[0].0.contains("Add dark mode"));
    assert!(patches[0].0.contains("Please add a dark theme toggle."));
    assert_eq!(patches[0].1, vec!["ui/theme.ts".to_string()]);

    let prs = h.tracker.pull_requests();
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].base.as_str(), "main");
    assert!(prs[0].head.as_str().starts_with("feature/issue-7-"));
    assert_eq!(prs[0].title, "Implement Feature: Add dark mode");
    assert!(prs[0].body.contains("#7"));

    assert!(h.workspace_root_is_empty());
}

#[tokio::test]
async fn test_missing_file_list_fails_at_parsed_without_workspace() {
    let h = harness(FakeSourceControl::default(), FakePatchAgent::default());

    let result = h.run("Please add a dark theme toggle.").await;

    assert_eq!(failed_stage(result), FeatureStage::Parsed);
    let posted = h.tracker.posted();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].contains("**Stage:** Parsed"));
    assert!(posted[0].contains("Files: file1.go, path/to/file2.go"));
    assert!(h.source_control.calls().is_empty());
    assert!(h.patch_agent.calls().is_empty());
    assert!(h.workspace_root_is_empty());
}

#[tokio::test]
async fn test_patch_failure_removes_workspace_and_reports_stage() {
    let h = harness(FakeSourceControl::default(), FakePatchAgent::failing());

    let result = h.run(DARK_MODE_BODY).await;

    assert_eq!(failed_stage(result), FeatureStage::Patched);
    let workspace = h.source_control.workspace().unwrap();
    assert_eq!(h.patch_agent.calls()[0].2, workspace);
    assert!(!workspace.exists());
    assert!(h.workspace_root_is_empty());

    let posted = h.tracker.posted();
    assert_eq!(posted.len(), 2, "acknowledgement plus one diagnostic");
    let diagnostic = &posted[1];
    assert!(diagnostic.contains("**Stage:** Patched (applying the requested changes)"));
    assert!(diagnostic.contains("`gemini` exited with status 1"));
    assert!(diagnostic.contains("model refused to edit ui/theme.ts"));

    // Nothing after the failing stage ran.
    let calls = h.source_control.calls();
    assert_eq!(calls.len(), 2);
    assert!(h.tracker.pull_requests().is_empty());
}

#[tokio::test]
async fn test_each_git_failure_is_attributed_to_its_stage() {
    for (operation, stage) in [
        ("clone", FeatureStage::Cloned),
        ("branch", FeatureStage::Branched),
        ("commit", FeatureStage::Committed),
        ("push", FeatureStage::Pushed),
    ] {
        let h = harness(
            FakeSourceControl::failing_at(operation),
            FakePatchAgent::default(),
        );

        let result = h.run(DARK_MODE_BODY).await;

        assert_eq!(failed_stage(result), stage, "operation {operation}");
        assert!(h.workspace_root_is_empty(), "operation {operation}");
        let posted = h.tracker.posted();
        assert_eq!(posted.len(), 2, "operation {operation}");
        assert!(posted[1].contains(&format!("**Stage:** {stage}")));
        assert!(posted[1].contains(&format!("fatal: {operation} failed")));
    }
}

#[tokio::test]
async fn test_credential_failure_fails_clone_stage() {
    let h = harness_with(
        BotConfig::new("bot").unwrap(),
        FakeAuthenticator { fail: true },
        FakeSourceControl::default(),
        FakePatchAgent::default(),
        FakeTracker::new(),
    );

    let result = h.run(DARK_MODE_BODY).await;

    assert_eq!(failed_stage(result), FeatureStage::Cloned);
    assert!(h.source_control.calls().is_empty());
    assert!(h.workspace_root_is_empty());
}

#[tokio::test]
async fn test_pull_request_failure_is_reported_once() {
    let h = harness_with(
        BotConfig::new("bot").unwrap(),
        FakeAuthenticator::default(),
        FakeSourceControl::default(),
        FakePatchAgent::default(),
        FakeTracker::new().failing_pull_request(),
    );

    let result = h.run(DARK_MODE_BODY).await;

    assert_eq!(failed_stage(result), FeatureStage::PullRequestOpened);
    let posted = h.tracker.posted();
    assert_eq!(posted.len(), 2);
    assert!(posted[1].contains("**Stage:** PullRequestOpened"));
    assert!(h.workspace_root_is_empty());
}

#[tokio::test]
async fn test_patch_timeout_fails_patched_stage() {
    let h = harness_with(
        BotConfig::new("bot")
            .unwrap()
            .with_patch_timeout(Some(Duration::from_millis(20))),
        FakeAuthenticator::default(),
        FakeSourceControl::default(),
        FakePatchAgent::slow(Duration::from_secs(5)),
        FakeTracker::new(),
    );

    let result = h.run(DARK_MODE_BODY).await;

    assert_eq!(failed_stage(result), FeatureStage::Patched);
    assert!(h.tracker.posted()[1].contains("timed out"));
    assert!(h.workspace_root_is_empty());
}

#[test]
fn test_feature_branch_name_uses_issue_and_millis() {
    let now = Timestamp::now();
    let branch = feature_branch(IssueNumber::new(7), now).unwrap();
    assert_eq!(
        branch.as_str(),
        format!("feature/issue-7-{}", now.unix_millis())
    );
}

#[test]
fn test_render_truncates_long_output_from_the_front() {
    let err = WorkflowError {
        stage: FeatureStage::Cloned,
        reason: "`git` exited with status 128".to_string(),
        output: Some(format!("{}END", "x".repeat(10_000))),
    };

    let rendered = err.render(IssueNumber::new(3));

    assert!(rendered.starts_with("I failed to implement the feature for issue #3."));
    assert!(rendered.contains("END\n```"));
    assert!(rendered.len() < 3_500);
}
