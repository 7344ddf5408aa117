//! `issuebot` entry point.
//!
//! Parses configuration from flags and the environment, installs the tracing
//! subscriber, and runs either the webhook server (`serve`) or a single
//! command against one issue (`run`).

mod app;
mod config;
mod observability;

use clap::Parser;
use tracing::{error, info};

use crate::config::{Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = observability::init(&cli.telemetry)?;

    let result = match &cli.command {
        Mode::Serve(args) => app::serve(&cli.app, args).await,
        Mode::Run(args) => app::run_once(&cli.app, args).await.map(|outcome| {
            info!(?outcome, "run finished");
        }),
    };
    if let Err(err) = &result {
        error!(error = ?err, "issuebot failed");
    }
    result
}
