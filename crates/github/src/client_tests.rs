use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use super::*;

fn client(server: &MockServer) -> GithubClient {
    let config = GithubApiConfig::default()
        .with_api_base(server.base_url())
        .with_retry(2, Duration::from_millis(1));
    GithubClient::new(config, InstallationToken::new("ghs_test"), "octo", "widgets").unwrap()
}

#[tokio::test]
async fn test_get_repository_file_requests_raw_contents() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/contents/README.md")
            .header("authorization", "Bearer ghs_test")
            .header("accept", RAW_MEDIA_TYPE);
        then.status(200).body("# Widgets\n");
    });

    let bytes = client(&server)
        .get_repository_file("README.md")
        .await
        .unwrap();

    assert_eq!(bytes, b"# Widgets\n");
    mock.assert();
}

#[tokio::test]
async fn test_missing_file_surfaces_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets/contents/README.md");
        then.status(404).json_body(json!({ "message": "Not Found" }));
    });

    let err = client(&server)
        .get_repository_file("README.md")
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_reads_are_retried_on_server_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets/issues/7");
        then.status(502);
    });

    let err = client(&server).get_issue(IssueNumber::new(7)).await.unwrap_err();

    assert!(matches!(err, TrackerError::Api { status: 502, .. }));
    mock.assert_calls(2);
}

#[tokio::test]
async fn test_list_comments_follows_pages() {
    let server = MockServer::start();
    let full_page: Vec<_> = (1..=100)
        .map(|id| json!({ "id": id, "body": format!("comment {id}") }))
        .collect();
    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/issues/7/comments")
            .query_param("page", "1")
            .query_param("per_page", "100");
        then.status(200).json_body(json!(full_page));
    });
    let second = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/issues/7/comments")
            .query_param("page", "2");
        then.status(200)
            .json_body(json!([{ "id": 101, "body": null }]));
    });

    let comments = client(&server)
        .list_comments(IssueNumber::new(7))
        .await
        .unwrap();

    assert_eq!(comments.len(), 101);
    assert_eq!(comments[0].body, "comment 1");
    assert_eq!(comments[100].id, CommentId::new(101));
    assert_eq!(comments[100].body, "");
    first.assert_calls(1);
    second.assert_calls(1);
}

#[tokio::test]
async fn test_create_comment_posts_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/octo/widgets/issues/7/comments")
            .json_body(json!({ "body": "hello" }));
        then.status(201).json_body(json!({ "id": 555, "html_url": "https://x" }));
    });

    let id = client(&server)
        .create_comment(IssueNumber::new(7), "hello")
        .await
        .unwrap();

    assert_eq!(id, CommentId::new(555));
    mock.assert();
}

#[tokio::test]
async fn test_create_pull_request_returns_web_url() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/repos/octo/widgets/pulls").json_body(json!({
            "title": "Implement Feature: Add dark mode",
            "head": "feature/issue-7-1",
            "base": "main",
            "body": "Closes #7",
        }));
        then.status(201).json_body(json!({
            "number": 12,
            "html_url": "https://github.com/octo/widgets/pull/12",
        }));
    });
    let draft = PullRequestDraft {
        head: BranchName::new("feature/issue-7-1").unwrap(),
        base: BranchName::new("main").unwrap(),
        title: "Implement Feature: Add dark mode".to_string(),
        body: "Closes #7".to_string(),
    };

    let url = client(&server).create_pull_request(&draft).await.unwrap();

    assert_eq!(url, "https://github.com/octo/widgets/pull/12");
    mock.assert();
}

#[tokio::test]
async fn test_get_issue_and_repository() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets/issues/7");
        then.status(200).json_body(json!({
            "number": 7,
            "title": "Add dark mode",
            "body": null,
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets");
        then.status(200).json_body(json!({
            "name": "widgets",
            "owner": { "login": "octo" },
            "default_branch": "trunk",
            "clone_url": "https://github.com/octo/widgets.git",
        }));
    });
    let client = client(&server);

    let issue = client.get_issue(IssueNumber::new(7)).await.unwrap();
    let repository = client.get_repository().await.unwrap();

    assert_eq!(issue.title, "Add dark mode");
    assert_eq!(issue.body, "");
    assert_eq!(repository.full_name(), "octo/widgets");
    assert_eq!(repository.default_branch.as_str(), "trunk");
}

#[tokio::test]
async fn test_undecodable_response_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/repos/octo/widgets/issues/7/comments");
        then.status(201).body("not json");
    });

    let err = client(&server)
        .create_comment(IssueNumber::new(7), "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::Decode { .. }));
}

#[tokio::test]
async fn test_create_comment_is_sent_once_on_server_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/repos/octo/widgets/issues/7/comments");
        then.status(502);
    });

    let err = client(&server)
        .create_comment(IssueNumber::new(7), "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::Api { status: 502, .. }));
    mock.assert_calls(1);
}

#[tokio::test]
async fn test_create_comment_is_sent_once_after_timeout() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/repos/octo/widgets/issues/7/comments");
        then.status(201)
            .delay(Duration::from_millis(300))
            .json_body(json!({ "id": 1 }));
    });
    let mut config = GithubApiConfig::default()
        .with_api_base(server.base_url())
        .with_retry(3, Duration::from_millis(1));
    config.request_timeout = Duration::from_millis(100);
    let client =
        GithubClient::new(config, InstallationToken::new("ghs_test"), "octo", "widgets").unwrap();

    let err = client
        .create_comment(IssueNumber::new(7), "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::Transport { .. }));
    mock.assert_calls(1);
}

#[tokio::test]
async fn test_create_pull_request_is_sent_once_on_server_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/repos/octo/widgets/pulls");
        then.status(502);
    });
    let draft = PullRequestDraft {
        head: BranchName::new("feature/issue-7-1").unwrap(),
        base: BranchName::new("main").unwrap(),
        title: "Implement Feature: Add dark mode".to_string(),
        body: "Closes #7".to_string(),
    };

    let err = client(&server).create_pull_request(&draft).await.unwrap_err();

    assert!(matches!(err, TrackerError::Api { status: 502, .. }));
    mock.assert_calls(1);
}

#[tokio::test]
async fn test_create_comment_is_retried_when_rate_limited() {
    let server = MockServer::start();
    let limited = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/octo/widgets/issues/7/comments")
            .header("x-issuebot-retry-attempt", "0");
        then.status(429);
    });
    let accepted = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/octo/widgets/issues/7/comments")
            .header("x-issuebot-retry-attempt", "1");
        then.status(201).json_body(json!({ "id": 9 }));
    });

    let id = client(&server)
        .create_comment(IssueNumber::new(7), "hello")
        .await
        .unwrap();

    assert_eq!(id, CommentId::new(9));
    limited.assert_calls(1);
    accepted.assert_calls(1);
}
