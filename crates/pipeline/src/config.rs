//! Immutable runtime configuration for the dispatch engine.
//!
//! Built once by the composition root and shared by reference (behind an
//! `Arc`) with every component. Nothing in the engine reads environment
//! variables or other ambient state.

use std::path::PathBuf;
use std::time::Duration;

use crate::{BotError, BotName, CommitIdentity};

/// Default upper bound on concurrently executing runs.
pub const DEFAULT_MAX_CONCURRENT_RUNS: usize = 8;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    bot_name: BotName,
    auto_prd_on_open: bool,
    label_triggers: bool,
    max_concurrent_runs: usize,
    workspace_root: Option<PathBuf>,
    patch_timeout: Option<Duration>,
}

impl BotConfig {
    /// Creates a configuration with defaults for everything but the bot name.
    ///
    /// The name is trimmed; an empty name or one containing whitespace cannot
    /// form a single mention token and is rejected.
    pub fn new(bot_name: &str) -> Result<Self, BotError> {
        let trimmed = bot_name.trim().trim_start_matches('@');
        if trimmed.chars().any(char::is_whitespace) {
            return Err(BotError::ConfigurationError {
                message: format!("bot name '{trimmed}' must not contain whitespace"),
            });
        }
        let bot_name = BotName::new(trimmed).ok_or_else(|| BotError::ConfigurationError {
            message: "bot name must not be empty".to_string(),
        })?;
        Ok(Self {
            bot_name,
            auto_prd_on_open: true,
            label_triggers: false,
            max_concurrent_runs: DEFAULT_MAX_CONCURRENT_RUNS,
            workspace_root: None,
            patch_timeout: None,
        })
    }

    /// Whether opening an issue triggers PRD generation without a mention.
    pub fn with_auto_prd_on_open(mut self, enabled: bool) -> Self {
        self.auto_prd_on_open = enabled;
        self
    }

    /// Whether labelling an issue with a command verb triggers that command.
    pub fn with_label_triggers(mut self, enabled: bool) -> Self {
        self.label_triggers = enabled;
        self
    }

    /// Upper bound on concurrently executing runs (at least one).
    pub fn with_max_concurrent_runs(mut self, limit: usize) -> Self {
        self.max_concurrent_runs = limit.max(1);
        self
    }

    /// Parent directory for feature workspaces; `None` uses the system temp dir.
    pub fn with_workspace_root(mut self, root: Option<PathBuf>) -> Self {
        self.workspace_root = root;
        self
    }

    /// Time limit for one patch-agent invocation; `None` waits indefinitely.
    pub fn with_patch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.patch_timeout = timeout;
        self
    }

    pub fn bot_name(&self) -> &BotName {
        &self.bot_name
    }

    /// The exact first token of a comment addressed to the bot.
    pub fn mention(&self) -> String {
        self.bot_name.mention()
    }

    pub fn commit_identity(&self) -> CommitIdentity {
        CommitIdentity::for_bot(&self.bot_name)
    }

    pub fn auto_prd_on_open(&self) -> bool {
        self.auto_prd_on_open
    }

    pub fn label_triggers(&self) -> bool {
        self.label_triggers
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }

    pub fn workspace_root(&self) -> Option<&PathBuf> {
        self.workspace_root.as_ref()
    }

    pub fn patch_timeout(&self) -> Option<Duration> {
        self.patch_timeout
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
