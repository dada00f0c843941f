use agentwatch_core::WatchState;
use agentwatch_runtime::{load_webhook_event, replay_repository, EventRouter, ReplayReport};
use anyhow::{Context, Result};

use crate::bootstrap_helpers::{github_client, router_config};
use crate::cli_args::{Cli, CliCommand};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    match &cli.command {
        CliCommand::HandleEvent {
            event_name,
            event_path,
        } => {
            let event = load_webhook_event(event_name, event_path)?;
            tracing::info!(
                event_name = %event_name,
                kind = event.kind_name(),
                repo = %cli.github_repo,
                "received event"
            );
            let router = EventRouter::new(router_config(&cli)?);
            router.handle_event(event).await?;
            Ok(())
        }
        CliCommand::Bindings { exclude_pr, json } => {
            let client = github_client(&cli)?;
            let report = replay_repository(&client, *exclude_pr, cli.bot_login()).await;
            let rendered = if *json {
                serde_json::to_string_pretty(&report.state)
                    .context("failed to encode replayed state")?
            } else {
                render_bindings_text(&report)
            };
            println!("{rendered}");
            Ok(())
        }
    }
}

fn render_state_lines(state: &WatchState, lines: &mut Vec<String>) {
    if state.bindings().is_empty() {
        lines.push("no active bindings".to_string());
    }
    for binding in state.bindings() {
        lines.push(format!(
            "{}\t{}\t{}\t#{}\t@{}",
            binding.pattern,
            binding.agent,
            if binding.args.is_empty() {
                "-"
            } else {
                binding.args.as_str()
            },
            binding.source_pr,
            binding.author
        ));
    }
    for (agent, patterns) in state.exclusions().iter() {
        let patterns = patterns.iter().cloned().collect::<Vec<_>>().join(" ");
        lines.push(format!("exclude {agent}: {patterns}"));
    }
}

pub(crate) fn render_bindings_text(report: &ReplayReport) -> String {
    let mut lines = Vec::new();
    render_state_lines(&report.state, &mut lines);
    lines.push(format!(
        "scanned {} pull request(s), skipped {}",
        report.scanned_pull_requests,
        report.skipped_pull_requests.len()
    ));
    lines.join("\n")
}
