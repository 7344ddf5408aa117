//! Webhook payloads and their conversion to [`Trigger`]s.
//!
//! Only the fields the engine needs are modelled; everything else in the
//! payload is ignored by serde.

use pipeline::{BranchName, EventContext, InstallationId, Issue, IssueNumber, Repository, Trigger};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("missing X-GitHub-Event header")]
    MissingEventType,

    #[error("invalid {event} payload: {message}")]
    Invalid { event: String, message: String },
}

/// What an accepted delivery turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Trigger(Trigger),
    Ping,
    /// Valid, but nothing the bot acts on.
    Ignored { event: String, action: Option<String> },
}

#[derive(Deserialize)]
struct IssuePayload {
    number: u64,
    title: String,
    body: Option<String>,
}

#[derive(Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
    default_branch: String,
    clone_url: String,
}

#[derive(Deserialize)]
struct InstallationPayload {
    id: u64,
}

#[derive(Deserialize)]
struct LabelPayload {
    name: String,
}

#[derive(Deserialize)]
struct CommentPayload {
    body: Option<String>,
}

#[derive(Deserialize)]
struct IssuesEvent {
    action: String,
    issue: IssuePayload,
    repository: RepositoryPayload,
    installation: Option<InstallationPayload>,
    label: Option<LabelPayload>,
}

#[derive(Deserialize)]
struct IssueCommentEvent {
    action: String,
    issue: IssuePayload,
    comment: CommentPayload,
    repository: RepositoryPayload,
    installation: Option<InstallationPayload>,
}

/// Decodes one delivery. `event` is the `X-GitHub-Event` header value.
pub fn parse_delivery(event: Option<&str>, body: &[u8]) -> Result<Delivery, PayloadError> {
    let event = event
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(PayloadError::MissingEventType)?;

    match event {
        "ping" => Ok(Delivery::Ping),
        "issues" => {
            let payload: IssuesEvent = decode(event, body)?;
            let action = payload.action.clone();
            let context = context(event, payload.issue, payload.repository, payload.installation)?;
            match (action.as_str(), payload.label) {
                ("opened", _) => Ok(Delivery::Trigger(Trigger::IssueOpened(context))),
                ("labeled", Some(label)) => Ok(Delivery::Trigger(Trigger::IssueLabeled {
                    context,
                    label: label.name,
                })),
                _ => Ok(ignored(event, action)),
            }
        }
        "issue_comment" => {
            let payload: IssueCommentEvent = decode(event, body)?;
            if payload.action != "created" {
                return Ok(ignored(event, payload.action));
            }
            let context = context(event, payload.issue, payload.repository, payload.installation)?;
            Ok(Delivery::Trigger(Trigger::CommentCreated {
                context,
                body: payload.comment.body.unwrap_or_default(),
            }))
        }
        other => Ok(Delivery::Ignored {
            event: other.to_string(),
            action: None,
        }),
    }
}

fn ignored(event: &str, action: String) -> Delivery {
    Delivery::Ignored {
        event: event.to_string(),
        action: Some(action),
    }
}

fn decode<'a, T: Deserialize<'a>>(event: &str, body: &'a [u8]) -> Result<T, PayloadError> {
    serde_json::from_slice(body).map_err(|e| invalid(event, e.to_string()))
}

fn invalid(event: &str, message: impl Into<String>) -> PayloadError {
    PayloadError::Invalid {
        event: event.to_string(),
        message: message.into(),
    }
}

fn context(
    event: &str,
    issue: IssuePayload,
    repository: RepositoryPayload,
    installation: Option<InstallationPayload>,
) -> Result<EventContext, PayloadError> {
    let installation = installation.ok_or_else(|| invalid(event, "no installation"))?;
    let default_branch = BranchName::new(repository.default_branch)
        .ok_or_else(|| invalid(event, "empty default branch"))?;
    Ok(EventContext {
        issue: Issue {
            number: IssueNumber::new(issue.number),
            title: issue.title,
            body: issue.body.unwrap_or_default(),
        },
        repository: Repository {
            owner: repository.owner.login,
            name: repository.name,
            default_branch,
            clone_url: repository.clone_url,
        },
        installation: InstallationId::new(installation.id),
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
