//! Composition root: builds the adapters and wires them into the dispatcher.

use std::sync::Arc;

use agent::{CliPatchAgent, GitCli};
use anyhow::Context;
use github::{AppAuthenticator, GithubApiConfig, GithubConnector};
use listener::WebhookState;
use llm::{GeminiConfig, GeminiGenerator};
use nodes::{
    CommandRegistry, Dispatcher, FeatureWorkflow, PrdPipeline, RunOutcome, SubtaskPipeline,
};
use pipeline::{
    Authenticator, BotConfig, Command, ContentGenerator, EventContext, InstallationId,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{AppArgs, RunArgs, ServeArgs};

/// Everything a dispatcher needs, built once at startup.
struct Services {
    connector: Arc<GithubConnector>,
    dispatcher: Dispatcher,
}

fn build_services(app: &AppArgs, config: BotConfig) -> anyhow::Result<Services> {
    let github_config = GithubApiConfig::default().with_api_base(app.github_api_url.as_str());
    let authenticator: Arc<dyn Authenticator> = Arc::new(
        AppAuthenticator::new(app.app_id, &app.private_key, github_config.clone())
            .context("failed to load GitHub App credentials")?,
    );
    let connector = Arc::new(GithubConnector::new(
        authenticator.clone(),
        github_config,
    ));

    let mut gemini = GeminiConfig::new(app.google_api_key.as_str());
    gemini.api_base = app.gemini_api_url.clone();
    gemini.model = app.gemini_model.clone();
    let generator: Arc<dyn ContentGenerator> =
        Arc::new(GeminiGenerator::new(gemini).context("failed to configure Gemini")?);

    let config = Arc::new(config);
    let registry = CommandRegistry::new()
        .register(
            Command::GeneratePrd,
            Arc::new(PrdPipeline::new(generator.clone())),
        )
        .register(
            Command::GenerateSubTasks,
            Arc::new(SubtaskPipeline::new(&config, generator)),
        )
        .register(
            Command::ImplementFeature,
            Arc::new(FeatureWorkflow::new(
                config.clone(),
                authenticator,
                Arc::new(GitCli::default()),
                Arc::new(CliPatchAgent::new(
                    app.patch_program.as_str(),
                    app.patch_args.clone(),
                )),
            )),
        );

    let dispatcher = Dispatcher::new(&config, connector.clone(), registry);
    Ok(Services {
        connector,
        dispatcher,
    })
}

/// Serves webhooks until Ctrl-C.
pub async fn serve(app: &AppArgs, args: &ServeArgs) -> anyhow::Result<()> {
    let config = app
        .bot_config()?
        .with_auto_prd_on_open(!args.no_auto_prd)
        .with_label_triggers(args.label_triggers);
    info!(
        bot = %config.bot_name(),
        auto_prd_on_open = config.auto_prd_on_open(),
        label_triggers = config.label_triggers(),
        max_concurrent_runs = config.max_concurrent_runs(),
        "starting issue bot"
    );
    let services = build_services(app, config)?;

    let addr = args.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let state = Arc::new(WebhookState::new(
        args.webhook_secret.as_bytes().to_vec(),
        Arc::new(services.dispatcher),
    ));

    listener::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
    })
    .await
    .context("webhook server exited unexpectedly")
}

/// Runs one command against one issue and waits for it.
pub async fn run_once(app: &AppArgs, args: &RunArgs) -> anyhow::Result<RunOutcome> {
    let services = build_services(app, app.bot_config()?)?;
    let installation = InstallationId::new(args.installation);

    let client = services
        .connector
        .client_for(installation, &args.repo.owner, &args.repo.name)
        .await
        .context("failed to connect to GitHub")?;
    let repository = client
        .get_repository()
        .await
        .context("failed to fetch repository")?;
    let issue = client
        .get_issue(args.issue)
        .await
        .with_context(|| format!("failed to fetch issue #{}", args.issue))?;

    let context = EventContext {
        issue,
        repository,
        installation,
    };
    services
        .dispatcher
        .run(args.command, &context)
        .await
        .with_context(|| format!("`{}` failed for {}", args.command, context.issue_key()))
}
