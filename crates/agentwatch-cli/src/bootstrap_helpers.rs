use std::sync::Arc;

use agentwatch_runtime::{
    build_agent_registry, load_agents_config, AgentRegistry, AgentsConfig, EventRouterConfig,
    GithubApiClient, MarkerLabels, PullRequestPlatform, RepoRef,
};
use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::Cli;

const LOG_ENV: &str = "AGENTWATCH_LOG";

/// Logs go to stderr so `bindings --json` output stays parseable.
pub(crate) fn init_tracing() {
    let env_var = if std::env::var_os(LOG_ENV).is_some() {
        LOG_ENV
    } else {
        EnvFilter::DEFAULT_ENV
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(env_var)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn marker_labels(cli: &Cli) -> MarkerLabels {
    MarkerLabels {
        running: cli.running_label.clone(),
        failed: cli.failed_label.clone(),
        seen_prefix: cli.seen_label_prefix.clone(),
    }
}

pub(crate) fn agent_registry(cli: &Cli) -> Result<AgentRegistry> {
    let config = match &cli.agents_config {
        Some(path) => load_agents_config(path)?,
        None => AgentsConfig::default(),
    };
    let registry = build_agent_registry(&config)?;
    tracing::debug!(agents = %registry.names().join(","), "agent registry ready");
    Ok(registry)
}

pub(crate) fn github_client(cli: &Cli) -> Result<GithubApiClient> {
    GithubApiClient::new(
        cli.github_api_base.clone(),
        cli.github_token.clone(),
        RepoRef::parse(&cli.github_repo)?,
        cli.request_timeout_ms,
    )
}

pub(crate) fn router_config(cli: &Cli) -> Result<EventRouterConfig> {
    let client = github_client(cli)?;
    let repo_slug = client.repo().as_slug();
    let platform: Arc<dyn PullRequestPlatform> = Arc::new(client);
    Ok(EventRouterConfig {
        platform,
        registry: agent_registry(cli)?,
        labels: marker_labels(cli),
        repo_slug,
        bot_login: cli.bot_login().map(str::to_string),
    })
}
