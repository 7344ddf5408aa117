//! Core domain for the issue bot.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used by the dispatch engine, plus the port traits that
//! infrastructure crates implement. It never performs I/O.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`IssueNumber`, `InstallationId`, etc.) |
//! | [`types`] | Shared value types (`Issue`, `Repository`, credentials) |
//! | [`errors`] | Port error types and retry policy |
//! | [`config`] | Immutable engine configuration |
//! | [`trigger`] | Normalized events, commands, and the command router |
//! | [`artifacts`] | PRD marker convention and `Files:` parsing |
//! | [`ports`] | Capability traits for every external collaborator |

pub mod artifacts;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod trigger;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use artifacts::{
    compose_subtasks, FeatureRequest, PrdArtifact, Translation, FALLBACK_LANGUAGE, FILES_PREFIX,
    PRD_MARKER, SUBTASKS_HEADER,
};
pub use config::{BotConfig, DEFAULT_MAX_CONCURRENT_RUNS};
pub use errors::{
    AuthError, BotError, GenerationError, ProcessError, RetryPolicy, TrackerError, MAX_RETRY_DELAY,
};
pub use identifiers::{
    BotName, BranchName, CommentId, InstallationId, IssueNumber, RepoFilePath, RunId,
};
pub use ports::{
    Authenticator, ContentGenerator, IssueTracker, PatchAgent, PullRequestDraft, SourceControl,
    TrackerConnector, TriggerSink,
};
pub use trigger::{Command, CommandRouter, EventContext, IssueKey, Trigger};
pub use types::{
    AuthenticatedRemote, Comment, CommitIdentity, InstallationToken, Issue, Repository, Timestamp,
};
