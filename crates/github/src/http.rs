//! Shared request plumbing: default headers, the retry loop, and error
//! shaping for every call this crate makes to the GitHub REST API.

use std::time::Duration;

use pipeline::RetryPolicy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::warn;

/// Default REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const RETRY_ATTEMPT_HEADER: &str = "x-issuebot-retry-attempt";
const MAX_ERROR_BODY_CHARS: usize = 800;

/// Connection settings shared by the authenticator and the issue tracker.
#[derive(Debug, Clone)]
pub struct GithubApiConfig {
    /// REST endpoint without a trailing slash.
    pub api_base: String,
    pub request_timeout: Duration,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// First back-off step; doubles per attempt.
    pub retry_base_delay: Duration,
}

impl Default for GithubApiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl GithubApiConfig {
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    /// Builds a client carrying the headers every GitHub call needs. The
    /// `Authorization` header is added per request.
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("issuebot/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.request_timeout)
            .build()
    }
}

/// Whether a request may be sent again after a failure that leaves its
/// effect unknown (timeouts, dropped connections, `5xx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    /// Reads, and writes that are harmless to repeat.
    Safe,
    /// Creates something visible. Only re-sent on `429` or a failed connect,
    /// where the server provably did not act on it.
    UnlessProcessed,
}

/// A request that failed after the retry budget was spent.
#[derive(Debug)]
pub(crate) enum HttpFailure {
    Status {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    Transport {
        message: String,
        retryable: bool,
        /// The connection was never established.
        connect: bool,
    },
}

impl HttpFailure {
    fn retry_policy(&self, replay: Replay) -> RetryPolicy {
        match (self, replay) {
            (
                HttpFailure::Status {
                    status: 429,
                    retry_after,
                    ..
                },
                _,
            ) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            (HttpFailure::Transport { connect: true, .. }, _) => {
                RetryPolicy::Retryable { after: None }
            }
            (_, Replay::UnlessProcessed) => RetryPolicy::NonRetryable,
            (
                HttpFailure::Status {
                    status,
                    retry_after,
                    ..
                },
                Replay::Safe,
            ) => RetryPolicy::for_status(*status, *retry_after),
            (
                HttpFailure::Transport {
                    retryable: true, ..
                },
                Replay::Safe,
            ) => RetryPolicy::Retryable { after: None },
            (HttpFailure::Transport { .. }, Replay::Safe) => RetryPolicy::NonRetryable,
        }
    }
}

/// Sends the request built by `build` until it succeeds, fails permanently, or
/// `config.max_attempts` is reached. `replay` limits which failures are
/// retried.
///
/// `build` is called once per attempt because a `RequestBuilder` is consumed
/// by `send`.
pub(crate) async fn send_with_retry<F>(
    config: &GithubApiConfig,
    operation: &str,
    replay: Replay,
    mut build: F,
) -> Result<reqwest::Response, HttpFailure>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0_u32;
    loop {
        attempt = attempt.saturating_add(1);
        let sent = build()
            .header(RETRY_ATTEMPT_HEADER, (attempt - 1).to_string())
            .send()
            .await;

        let failure = match sent {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                HttpFailure::Status {
                    status,
                    message: truncate_for_error(&body, MAX_ERROR_BODY_CHARS),
                    retry_after,
                }
            }
            Err(error) => HttpFailure::Transport {
                retryable: is_retryable_transport_error(&error),
                connect: error.is_connect(),
                message: error.to_string(),
            },
        };

        if attempt < max_attempts {
            let policy = failure.retry_policy(replay);
            if let Some(delay) = policy.delay(config.retry_base_delay, attempt) {
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    failure = ?failure,
                    "retrying GitHub request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        }
        return Err(failure);
    }
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub(crate) fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
