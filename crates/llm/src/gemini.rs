//! Gemini `generateContent` client with retry on rate limits and server errors.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{ContentGenerator, GenerationError, RetryPolicy};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY_CHARS: usize = 800;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("missing Gemini API key")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
    /// Total attempts per prompt, including the first.
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Single-turn Gemini client. Every prompt is an independent request; no
/// conversation state is kept between calls.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, SetupError> {
        if config.api_key.trim().is_empty() {
            return Err(SetupError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate_once(&self, url: &str, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.config.api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let raw = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: truncate(&raw, MAX_ERROR_BODY_CHARS),
                retry_after,
            });
        }

        let raw = response.text().await.map_err(|e| GenerationError::Transport {
            message: e.to_string(),
        })?;
        parse_generate_content_response(&raw)
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.generate_content_url();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let err = match self.generate_once(&url, prompt).await {
                Ok(text) => {
                    debug!(
                        model = %self.config.model,
                        prompt_chars = prompt.len(),
                        response_chars = text.len(),
                        "generated content"
                    );
                    return Ok(text);
                }
                Err(err) => err,
            };

            let policy: RetryPolicy = err.retry_policy();
            match policy.delay(self.config.retry_base_delay, attempt) {
                Some(delay) if attempt < max_attempts => {
                    warn!(
                        model = %self.config.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying content generation"
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(err),
            }
        }
    }
}

/// Concatenates the text of every part of every candidate.
pub(crate) fn parse_generate_content_response(raw: &str) -> Result<String, GenerationError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|e| GenerationError::Decode {
            message: e.to_string(),
        })?;
    let text: String = parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
