//! Error and retry-policy types for the issue bot domain.
//!
//! Each port trait in [`crate::ports`] has its own error type so an adapter
//! failure carries enough context for a user-facing diagnostic. [`BotError`]
//! covers conditions that stop the process itself.
//!
//! [`RetryPolicy`] is a cross-cutting concern: upstream errors produce one so
//! HTTP adapters can decide whether to re-send a request. Workflow stages never
//! retry; the policy only applies inside a single adapter call.

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: transport failures, `429`, and `5xx` responses.
/// - `NonRetryable` errors: everything else (bad credentials, `404`, decode
///   failures, empty model output).
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Classifies an HTTP status code returned by an upstream API.
    pub fn for_status(status: u16, retry_after: Option<Duration>) -> Self {
        if status == 429 || (500..600).contains(&status) {
            RetryPolicy::Retryable { after: retry_after }
        } else {
            RetryPolicy::NonRetryable
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` when the error
    /// must not be retried.
    ///
    /// Exponential from `base`, capped at [`MAX_RETRY_DELAY`]. A server-provided
    /// delay wins but never drops below `base`.
    pub fn delay(&self, base: Duration, attempt: u32) -> Option<Duration> {
        match self {
            RetryPolicy::NonRetryable => None,
            RetryPolicy::Retryable { after: Some(after) } => Some((*after).max(base)),
            RetryPolicy::Retryable { after: None } => {
                let exponent = attempt.saturating_sub(1).min(10);
                let scaled = base.saturating_mul(2_u32.saturating_pow(exponent));
                Some(scaled.min(MAX_RETRY_DELAY))
            }
        }
    }
}

/// Upper bound on computed back-off between attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Process-level errors
// ---------------------------------------------------------------------------

/// Errors that stop the bot process.
///
/// Only produced at startup; once the process is serving, every failure is
/// contained to the run that caused it.
#[derive(Debug, Error)]
pub enum BotError {
    /// Required configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure to obtain an installation credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The App private key could not be parsed or used for signing.
    #[error("invalid app private key: {message}")]
    InvalidKey { message: String },

    /// The token endpoint answered with an error status.
    #[error("token request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// The token endpoint could not be reached or its answer could not be read.
    #[error("token request failed: {message}")]
    Transport { message: String },
}

/// Failure of an issue-tracker operation.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracker answered with an error status.
    #[error("{operation} failed with status {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request could not be sent or no response arrived.
    #[error("{operation} request failed: {message}")]
    Transport { operation: String, message: String },

    /// The response arrived but could not be decoded.
    #[error("failed to decode {operation} response: {message}")]
    Decode { operation: String, message: String },

    /// A client for the installation could not be created.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
}

/// Failure of a content-generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generation backend answered with an error status.
    #[error("generation failed with status {status}: {message}")]
    Api {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request could not be sent or no response arrived.
    #[error("generation request failed: {message}")]
    Transport { message: String },

    /// The response arrived but could not be decoded.
    #[error("failed to decode generation response: {message}")]
    Decode { message: String },

    /// The backend answered successfully but produced no text.
    #[error("generation returned no text")]
    EmptyResponse,
}

impl GenerationError {
    /// Whether re-sending the same prompt may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            GenerationError::Api {
                status,
                retry_after,
                ..
            } => RetryPolicy::for_status(*status, *retry_after),
            GenerationError::Transport { .. } => RetryPolicy::Retryable { after: None },
            GenerationError::Decode { .. } | GenerationError::EmptyResponse => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

/// Failure of an external process (git, the patch agent).
///
/// Non-zero exit status is treated uniformly regardless of which command
/// failed; the captured combined output is kept for the user-facing diagnostic.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("could not start `{program}`: {message}")]
    Spawn { program: String, message: String },

    /// The program ran and exited unsuccessfully.
    #[error("`{program}` exited with {}", describe_status(*.status))]
    Exited {
        program: String,
        /// Exit code, `None` when terminated by a signal.
        status: Option<i32>,
        /// Stdout followed by stderr (not interleaved), secrets already scrubbed.
        output: String,
    },

    /// The program did not finish within its time limit and was killed.
    #[error("`{program}` timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },
}

impl ProcessError {
    /// Captured output, when the process got far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ProcessError::Exited { output, .. } if !output.trim().is_empty() => {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
