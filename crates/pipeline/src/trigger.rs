//! Normalized inbound events and the router that maps them to commands.
//!
//! Transport concerns (signatures, payload shapes) end at the listener; the
//! engine only ever sees a [`Trigger`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BotConfig, InstallationId, Issue, Repository};

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Where an event happened: the issue, its repository, and the installation
/// whose credential may act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub issue: Issue,
    pub repository: Repository,
    pub installation: InstallationId,
}

impl EventContext {
    /// Key used to serialize runs that touch the same issue.
    pub fn issue_key(&self) -> IssueKey {
        IssueKey {
            repository: self.repository.full_name(),
            issue: self.issue.number.as_u64(),
        }
    }
}

/// Identity of an issue across repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub repository: String,
    pub issue: u64,
}

impl std::fmt::Display for IssueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repository, self.issue)
    }
}

/// A normalized inbound event. Created once per event, consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// A new issue was opened.
    IssueOpened(EventContext),
    /// A comment was created on an issue.
    CommentCreated { context: EventContext, body: String },
    /// A label was added to an issue.
    IssueLabeled { context: EventContext, label: String },
}

impl Trigger {
    pub fn context(&self) -> &EventContext {
        match self {
            Trigger::IssueOpened(context)
            | Trigger::CommentCreated { context, .. }
            | Trigger::IssueLabeled { context, .. } => context,
        }
    }

    pub fn into_context(self) -> EventContext {
        match self {
            Trigger::IssueOpened(context)
            | Trigger::CommentCreated { context, .. }
            | Trigger::IssueLabeled { context, .. } => context,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::IssueOpened(_) => "issue_opened",
            Trigger::CommentCreated { .. } => "comment_created",
            Trigger::IssueLabeled { .. } => "issue_labeled",
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A recognized verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Generate a PRD comment for the issue.
    GeneratePrd,
    /// Break the issue's PRD down into a checklist.
    GenerateSubTasks,
    /// Implement the issue and open a pull request.
    ImplementFeature,
}

impl Command {
    /// Every command, in registry order.
    pub const ALL: [Command; 3] = [
        Command::GeneratePrd,
        Command::GenerateSubTasks,
        Command::ImplementFeature,
    ];

    /// The verb users type after the mention.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::GeneratePrd => "need_prd",
            Command::GenerateSubTasks => "need_sub_task",
            Command::ImplementFeature => "implement_feature",
        }
    }

    /// Looks up a verb. Matching is exact and case-sensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.as_str() == token)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Maps a [`Trigger`] to the [`Command`] it asks for, if any.
///
/// `None` is the common case and never an error: most comments are not
/// addressed to the bot.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    mention: String,
    auto_prd_on_open: bool,
    label_triggers: bool,
}

impl CommandRouter {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            mention: config.mention(),
            auto_prd_on_open: config.auto_prd_on_open(),
            label_triggers: config.label_triggers(),
        }
    }

    pub fn route(&self, trigger: &Trigger) -> Option<Command> {
        match trigger {
            Trigger::IssueOpened(_) => self.auto_prd_on_open.then_some(Command::GeneratePrd),
            Trigger::CommentCreated { body, .. } => self.parse_comment(body),
            Trigger::IssueLabeled { label, .. } => {
                if self.label_triggers {
                    Command::from_token(label.trim())
                } else {
                    None
                }
            }
        }
    }

    /// Parses `@<bot> <verb> [anything…]`.
    ///
    /// The mention must be the very first whitespace-delimited token of the
    /// trimmed body; only the token after it is significant.
    pub fn parse_comment(&self, body: &str) -> Option<Command> {
        let mut tokens = body.split_whitespace();
        if tokens.next() != Some(self.mention.as_str()) {
            return None;
        }
        let Some(verb) = tokens.next() else {
            debug!(mention = %self.mention, "bot mentioned without a command");
            return None;
        };
        let command = Command::from_token(verb);
        if command.is_none() {
            debug!(verb, "bot mentioned with an unrecognized command");
        }
        command
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
