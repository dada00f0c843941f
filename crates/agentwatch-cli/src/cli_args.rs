use std::path::PathBuf;

use clap::{Parser, Subcommand};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_label(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("label must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "agentwatch",
    about = "Comment-driven file watches that run agents on pull requests",
    version
)]
pub struct Cli {
    #[arg(
        long = "github-repo",
        env = "GITHUB_REPOSITORY",
        help = "GitHub repository in owner/repo format"
    )]
    pub github_repo: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for API access"
    )]
    pub github_token: String,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "GitHub API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-bot-login",
        env = "AGENTWATCH_BOT_LOGIN",
        default_value = "github-actions[bot]",
        help = "Login the bot posts as; its comments are never treated as commands. Empty disables the check."
    )]
    pub github_bot_login: String,

    #[arg(
        long = "request-timeout-ms",
        env = "AGENTWATCH_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "HTTP request timeout for GitHub API calls in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "agents-config",
        env = "AGENTWATCH_AGENTS_CONFIG",
        help = "TOML file declaring command agents under [agents.<name>]"
    )]
    pub agents_config: Option<PathBuf>,

    #[arg(
        long = "running-label",
        env = "AGENTWATCH_RUNNING_LABEL",
        default_value = "running",
        value_parser = parse_label,
        help = "Label attached while an agent runs"
    )]
    pub running_label: String,

    #[arg(
        long = "failed-label",
        env = "AGENTWATCH_FAILED_LABEL",
        default_value = "failed",
        value_parser = parse_label,
        help = "Label attached when an agent fails"
    )]
    pub failed_label: String,

    #[arg(
        long = "seen-label-prefix",
        env = "AGENTWATCH_SEEN_LABEL_PREFIX",
        default_value = "seen:",
        value_parser = parse_label,
        help = "Prefix of the per-agent success label"
    )]
    pub seen_label_prefix: String,

    #[command(subcommand)]
    pub command: CliCommand,
}

impl Cli {
    pub fn bot_login(&self) -> Option<&str> {
        let login = self.github_bot_login.trim();
        (!login.is_empty()).then_some(login)
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Handle one GitHub Actions event.
    HandleEvent {
        #[arg(long = "event-name", env = "GITHUB_EVENT_NAME")]
        event_name: String,

        #[arg(long = "event-path", env = "GITHUB_EVENT_PATH")]
        event_path: PathBuf,
    },
    /// Replay comment history and print the active bindings.
    Bindings {
        #[arg(long = "exclude-pr", help = "Pull request left out of the replay")]
        exclude_pr: Option<u64>,

        #[arg(long, help = "Print the replayed state as JSON")]
        json: bool,
    },
}
