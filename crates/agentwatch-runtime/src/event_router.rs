//! Routes one inbound event to command handling, re-runs or bootstrap.

use std::collections::BTreeSet;
use std::sync::Arc;

use agentwatch_core::watch_comment::{
    is_agentwatch_comment, render_parse_error_reply, render_resolution_error,
    render_unwatch_ack, render_watch_state, with_marker_footer,
};
use agentwatch_core::{
    match_bindings, parse_watch_command, replay_history, Binding, Invocation, InvocationTrigger,
    WatchCommand,
};
use anyhow::{Context, Result};
use thiserror::Error;

use crate::agent_registry::AgentRegistry;
use crate::history_fetch::{collect_repository_history, replay_repository};
use crate::invocation_rendering::render_bootstrap_summary;
use crate::invocation_runner::{
    post_reply, InvocationOutcome, InvocationRunner, MarkerLabels, ReplyTarget, ResultPosting,
};
use crate::platform::{analyzable_paths, PullRequestPlatform};
use crate::webhook_event::{CommentEvent, InboundEvent};

#[derive(Clone)]
/// Everything the router needs for one event.
pub struct EventRouterConfig {
    pub platform: Arc<dyn PullRequestPlatform>,
    pub registry: AgentRegistry,
    pub labels: MarkerLabels,
    pub repo_slug: String,
    pub bot_login: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// What handling one event did.
pub struct EventReport {
    pub event: String,
    pub pr_number: Option<u64>,
    pub command: Option<String>,
    pub invocations_attempted: usize,
    pub invocations_succeeded: usize,
    pub invocations_failed: usize,
    pub comments_posted: usize,
    pub resolution_errors: usize,
    pub skipped_reason: Option<String>,
}

impl EventReport {
    fn new(event: &InboundEvent) -> Self {
        Self {
            event: event.kind_name().to_string(),
            ..Self::default()
        }
    }

    fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skipped_reason = Some(reason.into());
        self
    }

    fn record_outcomes(&mut self, outcomes: &[InvocationOutcome]) {
        self.invocations_attempted += outcomes.len();
        for outcome in outcomes {
            if outcome.succeeded() {
                self.invocations_succeeded += 1;
            } else {
                self.invocations_failed += 1;
            }
            if outcome.posted {
                self.comments_posted += 1;
            }
        }
    }

    fn record_post(&mut self, posted: bool) {
        if posted {
            self.comments_posted += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// A well-formed command that cannot be carried out as written.
pub enum ResolutionError {
    #[error("agent `{agent}` is not registered (available: {available})")]
    UnknownAgent { agent: String, available: String },
    #[error("`{path}` is not among the files changed by #{pr_number}")]
    FileNotInPullRequest { path: String, pr_number: u64 },
    #[error("`{command}` is only supported on pull requests")]
    RequiresPullRequest { command: &'static str },
}

fn render_watch_ack(pattern: &str, agent: &str) -> String {
    with_marker_footer(
        &format!(
            "AgentWatch is watching `{pattern}` with `{agent}`. No files in this pull request match yet."
        ),
        "watch",
    )
}

/// Routes inbound events for a single repository.
pub struct EventRouter {
    platform: Arc<dyn PullRequestPlatform>,
    runner: InvocationRunner,
    bot_login: Option<String>,
}

impl EventRouter {
    pub fn new(config: EventRouterConfig) -> Self {
        let runner = InvocationRunner::new(
            config.platform.clone(),
            config.registry,
            config.labels,
            config.repo_slug,
        );
        Self {
            platform: config.platform,
            runner,
            bot_login: config.bot_login,
        }
    }

    fn bot_login(&self) -> Option<&str> {
        self.bot_login.as_deref()
    }

    /// Handles one event end to end.
    ///
    /// Only failures to read the event's own pull request are returned as
    /// errors; everything else is reported or logged.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<EventReport> {
        let report = EventReport::new(&event);
        let report = match event {
            InboundEvent::CommentCreated(comment) => self.handle_comment(comment, report).await?,
            InboundEvent::PullRequestSynchronized { number, labels } => {
                self.handle_synchronize(number, &labels, report).await?
            }
            InboundEvent::PullRequestOpened { number } => {
                self.handle_opened(number, report).await?
            }
            InboundEvent::Ignored { reason } => report.skipped(reason),
        };
        tracing::info!(
            event = %report.event,
            pr = report.pr_number.unwrap_or_default(),
            command = report.command.as_deref().unwrap_or("-"),
            attempted = report.invocations_attempted,
            succeeded = report.invocations_succeeded,
            failed = report.invocations_failed,
            comments = report.comments_posted,
            skipped = report.skipped_reason.as_deref().unwrap_or("-"),
            "handled event"
        );
        Ok(report)
    }

    async fn handle_comment(
        &self,
        comment: CommentEvent,
        mut report: EventReport,
    ) -> Result<EventReport> {
        report.pr_number = Some(comment.number);
        if self
            .bot_login()
            .is_some_and(|login| login == comment.author)
            || is_agentwatch_comment(&comment.body)
        {
            return Ok(report.skipped("comment authored by agentwatch"));
        }
        let reply = comment
            .thread_root()
            .map(|root_id| ReplyTarget::ReviewThread { root_id })
            .unwrap_or(ReplyTarget::PullRequest);
        let command = match parse_watch_command(&comment.body) {
            None => return Ok(report.skipped("no command")),
            Some(Err(error)) => {
                report.command = Some(error.keyword.as_str().to_string());
                tracing::info!(pr = comment.number, error = %error, "rejected malformed command");
                let body = render_parse_error_reply(&error);
                report.record_post(
                    post_reply(self.platform.as_ref(), comment.number, reply, &body).await,
                );
                return Ok(report);
            }
            Some(Ok(command)) => command,
        };
        report.command = Some(command.keyword().as_str().to_string());

        let resolved = match &command {
            WatchCommand::Watch {
                pattern,
                agent,
                args,
            } => {
                self.handle_watch(&comment, pattern, agent, args, reply, &mut report)
                    .await?
            }
            WatchCommand::Unwatch { .. } => {
                self.handle_unwatch(&comment, &command, reply, &mut report)
                    .await
            }
            WatchCommand::List => {
                let replay = replay_repository(self.platform.as_ref(), None, self.bot_login()).await;
                let body = render_watch_state(&replay.state);
                report.record_post(
                    post_reply(self.platform.as_ref(), comment.number, reply, &body).await,
                );
                Ok(())
            }
            WatchCommand::Run { agent, args } => {
                self.handle_run(&comment, agent, args, reply, &mut report)
                    .await
            }
        };
        if let Err(error) = resolved {
            report.resolution_errors += 1;
            tracing::info!(pr = comment.number, error = %error, "command could not be resolved");
            let body = render_resolution_error(&error.to_string());
            report.record_post(
                post_reply(self.platform.as_ref(), comment.number, reply, &body).await,
            );
        }
        Ok(report)
    }

    fn ensure_agent(&self, agent: &str) -> Result<(), ResolutionError> {
        if self.runner.registry().contains(agent) {
            return Ok(());
        }
        Err(ResolutionError::UnknownAgent {
            agent: agent.to_string(),
            available: self.runner.registry().names().join(", "),
        })
    }

    async fn handle_watch(
        &self,
        comment: &CommentEvent,
        pattern: &str,
        agent: &str,
        args: &str,
        reply: ReplyTarget,
        report: &mut EventReport,
    ) -> Result<Result<(), ResolutionError>> {
        if !comment.on_pull_request {
            return Ok(Err(ResolutionError::RequiresPullRequest { command: "watch" }));
        }
        if let Err(error) = self.ensure_agent(agent) {
            return Ok(Err(error));
        }
        let files = self
            .platform
            .list_changed_files(comment.number)
            .await
            .with_context(|| format!("failed to list files for #{}", comment.number))?;
        let changed = analyzable_paths(&files);
        let candidates = match &comment.path {
            Some(path) if changed.iter().any(|changed| changed == path) => vec![path.clone()],
            Some(path) => {
                return Ok(Err(ResolutionError::FileNotInPullRequest {
                    path: path.clone(),
                    pr_number: comment.number,
                }))
            }
            None => changed,
        };

        let (mut history, _, _) = collect_repository_history(self.platform.as_ref(), None).await;
        if !history.iter().any(|row| row.id == comment.comment_id) {
            history.push(comment.to_history_comment());
        }
        let state = replay_history(&history, self.bot_login());
        let binding = Binding {
            pattern: pattern.to_string(),
            agent: agent.to_string(),
            args: args.to_string(),
            source_pr: comment.number,
            comment_id: comment.comment_id,
            created_at: comment.created_at,
            author: comment.author.clone(),
        };
        let invocations = match_bindings(&[binding], state.exclusions(), &candidates)
            .into_iter()
            .map(|matched| {
                matched.into_invocation(
                    comment.number,
                    Some(comment.comment_id),
                    InvocationTrigger::Manual,
                )
            })
            .collect::<Vec<_>>();
        if invocations.is_empty() {
            let body = render_watch_ack(pattern, agent);
            report.record_post(
                post_reply(self.platform.as_ref(), comment.number, reply, &body).await,
            );
            return Ok(Ok(()));
        }
        let outcomes = self
            .runner
            .run_all(&invocations, reply, ResultPosting::Always)
            .await;
        report.record_outcomes(&outcomes);
        Ok(Ok(()))
    }

    async fn handle_unwatch(
        &self,
        comment: &CommentEvent,
        command: &WatchCommand,
        reply: ReplyTarget,
        report: &mut EventReport,
    ) -> Result<(), ResolutionError> {
        let WatchCommand::Unwatch { agent, pattern } = command else {
            return Ok(());
        };
        if !comment.on_pull_request {
            return Err(ResolutionError::RequiresPullRequest { command: "unwatch" });
        }
        let (mut history, _, _) = collect_repository_history(self.platform.as_ref(), None).await;
        history.retain(|row| row.id != comment.comment_id);
        let mut state = replay_history(&history, self.bot_login());
        let effect = state.apply(&comment.to_history_comment(), command);
        tracing::debug!(pr = comment.number, ?effect, "applied unwatch");
        let body = render_unwatch_ack(agent, pattern, &effect);
        report.record_post(post_reply(self.platform.as_ref(), comment.number, reply, &body).await);
        Ok(())
    }

    async fn handle_run(
        &self,
        comment: &CommentEvent,
        agent: &str,
        args: &str,
        reply: ReplyTarget,
        report: &mut EventReport,
    ) -> Result<(), ResolutionError> {
        self.ensure_agent(agent)?;
        let invocation = Invocation {
            file_path: comment.path.clone(),
            agent: agent.to_string(),
            args: args.to_string(),
            pr_number: comment.number,
            comment_id: Some(comment.comment_id),
            trigger: InvocationTrigger::Manual,
            source_pattern: None,
        };
        let outcomes = self
            .runner
            .run_all(&[invocation], reply, ResultPosting::Always)
            .await;
        report.record_outcomes(&outcomes);
        Ok(())
    }

    async fn clear_stale_markers(&self, number: u64, labels: &[String], invocations: &[Invocation]) {
        let markers = self.runner.labels();
        let agents = invocations
            .iter()
            .map(|invocation| invocation.agent.as_str())
            .collect::<BTreeSet<_>>();
        for label in labels {
            let stale = *label == markers.failed
                || markers
                    .seen_agent(label)
                    .is_some_and(|agent| agents.contains(agent));
            if *label == markers.running {
                tracing::warn!(pr = number, "running marker already present; another run may be in progress");
            } else if stale {
                if let Err(error) = self.platform.remove_label(number, label).await {
                    tracing::warn!(
                        pr = number,
                        label = %label,
                        error = %format!("{error:#}"),
                        "failed to remove stale marker"
                    );
                }
            }
        }
    }

    async fn handle_synchronize(
        &self,
        number: u64,
        labels: &[String],
        mut report: EventReport,
    ) -> Result<EventReport> {
        report.pr_number = Some(number);
        let files = self
            .platform
            .list_changed_files(number)
            .await
            .with_context(|| format!("failed to list files for #{number}"))?;
        let paths = analyzable_paths(&files);
        let replay = replay_repository(self.platform.as_ref(), None, self.bot_login()).await;
        let bindings = replay.state.bindings_from_pr(number);
        let invocations = match_bindings(&bindings, replay.state.exclusions(), &paths)
            .into_iter()
            .map(|matched| matched.into_invocation(number, None, InvocationTrigger::FileChange))
            .collect::<Vec<_>>();
        if invocations.is_empty() {
            return Ok(report.skipped("no bindings match the changed files"));
        }
        self.clear_stale_markers(number, labels, &invocations).await;
        let outcomes = self
            .runner
            .run_all(&invocations, ReplyTarget::PullRequest, ResultPosting::Always)
            .await;
        report.record_outcomes(&outcomes);
        Ok(report)
    }

    async fn handle_opened(&self, number: u64, mut report: EventReport) -> Result<EventReport> {
        report.pr_number = Some(number);
        let files = self
            .platform
            .list_changed_files(number)
            .await
            .with_context(|| format!("failed to list files for #{number}"))?;
        let paths = analyzable_paths(&files);
        let replay = replay_repository(self.platform.as_ref(), Some(number), self.bot_login()).await;
        let invocations = replay
            .state
            .match_paths(&paths)
            .into_iter()
            .map(|matched| {
                matched.into_invocation(number, None, InvocationTrigger::AutoPatternMatch)
            })
            .collect::<Vec<_>>();
        if invocations.is_empty() {
            return Ok(report.skipped("no existing watches match"));
        }
        let outcomes = self
            .runner
            .run_all(
                &invocations,
                ReplyTarget::PullRequest,
                ResultPosting::FailuresOnly,
            )
            .await;
        report.record_outcomes(&outcomes);
        let summary = render_bootstrap_summary(number, &outcomes);
        report.record_post(
            post_reply(self.platform.as_ref(), number, ReplyTarget::PullRequest, &summary).await,
        );
        Ok(report)
    }
}
