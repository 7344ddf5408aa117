//! Shared value types for the issue bot domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types group
//! several values that travel together (an issue, the repository it lives in)
//! or carry an invariant of their own (a credential that must never be printed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BotName, BranchName, CommentId, IssueNumber};

// ---------------------------------------------------------------------------
// Tracker entities
// ---------------------------------------------------------------------------

/// A repository as described by the inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Account login that owns the repository.
    pub owner: String,
    /// Repository name without the owner.
    pub name: String,
    /// Branch pull requests are opened against.
    pub default_branch: BranchName,
    /// Credential-free HTTPS clone URL (e.g. `https://github.com/o/r.git`).
    pub clone_url: String,
}

impl Repository {
    /// Returns `"owner/name"`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// The issue a trigger refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueNumber,
    pub title: String,
    /// Issue body; GitHub sends `null` for an empty body, which maps to `""`.
    pub body: String,
}

/// One issue comment, as returned by the tracker in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Short-lived installation access token.
///
/// Deliberately not `Serialize` and not `Display`; `Debug` is redacted. The raw
/// value is only reachable through [`InstallationToken::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationToken(String);

impl InstallationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InstallationToken(***)")
    }
}

/// A git remote URL that carries an installation credential.
///
/// Built from a repository's credential-free clone URL. Like the token it
/// wraps, it is redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedRemote {
    url: String,
    token: InstallationToken,
}

impl AuthenticatedRemote {
    /// Embeds `token` into an `https://` clone URL.
    ///
    /// Returns `None` for any other scheme; SSH and `git://` remotes cannot carry
    /// an installation token.
    pub fn new(clone_url: &str, token: InstallationToken) -> Option<Self> {
        let rest = clone_url.strip_prefix("https://")?;
        if rest.is_empty() {
            return None;
        }
        let url = format!("https://x-access-token:{}@{}", token.expose(), rest);
        Some(Self { url, token })
    }

    /// The credential-embedded URL. Callers must not log the result.
    pub fn expose_url(&self) -> &str {
        &self.url
    }

    /// Secret substrings that must be scrubbed from anything derived from this remote.
    pub fn secrets(&self) -> Vec<String> {
        vec![self.token.expose().to_string()]
    }
}

impl std::fmt::Debug for AuthenticatedRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthenticatedRemote(***)")
    }
}

/// Author and committer identity used for the bot's commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    /// The identity the bot commits as: its own name and a GitHub no-reply address.
    pub fn for_bot(bot: &BotName) -> Self {
        Self {
            name: bot.as_str().to_string(),
            email: format!("{}@users.noreply.github.com", bot.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Milliseconds since the Unix epoch.
    pub fn unix_millis(self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
