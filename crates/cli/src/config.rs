//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pipeline::{BotConfig, Command, IssueNumber, DEFAULT_MAX_CONCURRENT_RUNS};

#[derive(Debug, Parser)]
#[command(
    name = "issuebot",
    version,
    about = "GitHub App that turns issue comments into PRDs, sub-tasks and pull requests"
)]
pub struct Cli {
    #[command(flatten)]
    pub app: AppArgs,

    #[command(flatten)]
    pub telemetry: TelemetryArgs,

    #[command(subcommand)]
    pub command: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Receive webhooks and dispatch runs in the background.
    Serve(ServeArgs),
    /// Run one command against one issue and exit.
    Run(RunArgs),
}

/// Settings shared by every mode.
#[derive(Debug, Args)]
pub struct AppArgs {
    #[arg(long, env = "GITHUB_APP_ID")]
    pub app_id: u64,

    /// PEM, or base64-encoded PEM.
    #[arg(
        long,
        env = "GITHUB_APP_PRIVATE_KEY",
        hide_env_values = true,
        allow_hyphen_values = true
    )]
    pub private_key: String,

    /// Name users mention to address the bot, with or without the `@`.
    #[arg(long, env = "GITHUB_APP_NAME")]
    pub app_name: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = github::DEFAULT_API_BASE)]
    pub github_api_url: String,

    #[arg(long, env = "GEMINI_API_URL", default_value = llm::DEFAULT_GEMINI_API_BASE)]
    pub gemini_api_url: String,

    #[arg(long, env = "GEMINI_MODEL", default_value = llm::DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,

    /// Program that edits the working tree for `implement_feature`.
    #[arg(long, env = "ISSUEBOT_PATCH_PROGRAM", default_value = agent::DEFAULT_PATCH_PROGRAM)]
    pub patch_program: String,

    /// Arguments placed between the instruction and the file list.
    #[arg(
        long = "patch-arg",
        env = "ISSUEBOT_PATCH_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true,
        default_values_t = agent::DEFAULT_PATCH_ARGS
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    )]
    pub patch_args: Vec<String>,

    /// Kill the patch program after this many seconds. Unlimited when unset.
    #[arg(long, env = "ISSUEBOT_PATCH_TIMEOUT_SECS")]
    pub patch_timeout_secs: Option<u64>,

    /// Parent directory for per-run clones. System temp dir when unset.
    #[arg(long, env = "ISSUEBOT_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    #[arg(
        long,
        env = "ISSUEBOT_MAX_CONCURRENT_RUNS",
        default_value_t = DEFAULT_MAX_CONCURRENT_RUNS
    )]
    pub max_concurrent_runs: usize,
}

#[derive(Debug, Args)]
pub struct TelemetryArgs {
    #[arg(long, env = "ISSUEBOT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Export spans to this OTLP/gRPC collector.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "ISSUEBOT_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Skip the automatic PRD when an issue is opened.
    #[arg(long, env = "ISSUEBOT_NO_AUTO_PRD")]
    pub no_auto_prd: bool,

    /// Also run a command when an issue gets a label named after it.
    #[arg(long, env = "ISSUEBOT_LABEL_TRIGGERS")]
    pub label_triggers: bool,
}

impl ServeArgs {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.bind_address, self.port))
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Repository as `owner/name`.
    #[arg(long, value_parser = parse_repository)]
    pub repo: RepositorySlug,

    #[arg(long, value_parser = parse_issue)]
    pub issue: IssueNumber,

    /// Installation of the App on the repository's account.
    #[arg(long, env = "GITHUB_INSTALLATION_ID")]
    pub installation: u64,

    /// `need_prd`, `need_sub_task` or `implement_feature`.
    #[arg(long = "command", value_parser = parse_command)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySlug {
    pub owner: String,
    pub name: String,
}

fn parse_repository(raw: &str) -> Result<RepositorySlug, String> {
    match raw.trim().split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok(RepositorySlug {
                owner: owner.to_string(),
                name: name.trim_end_matches(".git").to_string(),
            })
        }
        _ => Err(format!("expected owner/name, got `{raw}`")),
    }
}

fn parse_issue(raw: &str) -> Result<IssueNumber, String> {
    raw.trim()
        .trim_start_matches('#')
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .map(IssueNumber::new)
        .ok_or_else(|| format!("expected a positive issue number, got `{raw}`"))
}

fn parse_command(raw: &str) -> Result<Command, String> {
    Command::from_token(raw.trim()).ok_or_else(|| {
        let known: Vec<_> = Command::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown command `{raw}`; expected one of {}", known.join(", "))
    })
}

impl AppArgs {
    /// Core engine configuration. Serve-only switches are applied by the caller.
    pub fn bot_config(&self) -> anyhow::Result<BotConfig> {
        if self.max_concurrent_runs == 0 {
            bail!("--max-concurrent-runs must be at least 1");
        }
        Ok(BotConfig::new(&self.app_name)?
            .with_max_concurrent_runs(self.max_concurrent_runs)
            .with_workspace_root(self.workspace_root.clone())
            .with_patch_timeout(self.patch_timeout_secs.map(Duration::from_secs)))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
