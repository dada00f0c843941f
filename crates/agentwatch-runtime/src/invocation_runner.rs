//! Sequential agent execution with the running/seen/failed label cycle.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use agentwatch_core::Invocation;
use futures_util::FutureExt;

use crate::agent_registry::{AgentContext, AgentError, AgentRegistry};
use crate::invocation_rendering::{render_invocation_failure, render_invocation_success};
use crate::platform::PullRequestPlatform;

pub const DEFAULT_RUNNING_LABEL: &str = "running";
pub const DEFAULT_FAILED_LABEL: &str = "failed";
pub const DEFAULT_SEEN_LABEL_PREFIX: &str = "seen:";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Label names used to mark invocation progress on a pull request.
pub struct MarkerLabels {
    pub running: String,
    pub failed: String,
    pub seen_prefix: String,
}

impl Default for MarkerLabels {
    fn default() -> Self {
        Self {
            running: DEFAULT_RUNNING_LABEL.to_string(),
            failed: DEFAULT_FAILED_LABEL.to_string(),
            seen_prefix: DEFAULT_SEEN_LABEL_PREFIX.to_string(),
        }
    }
}

impl MarkerLabels {
    pub fn seen(&self, agent: &str) -> String {
        format!("{}{agent}", self.seen_prefix)
    }

    /// Agent name encoded in a `seen:<agent>` label, if `label` is one.
    pub fn seen_agent<'a>(&self, label: &'a str) -> Option<&'a str> {
        label
            .strip_prefix(self.seen_prefix.as_str())
            .filter(|agent| !agent.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which invocation results are posted as individual comments.
pub enum ResultPosting {
    Always,
    /// Successes are left to a caller-rendered summary.
    FailuresOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where invocation results and command replies are posted.
pub enum ReplyTarget {
    /// Threaded reply under the root comment of a review thread.
    ReviewThread { root_id: u64 },
    PullRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationStatus {
    Succeeded { output: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of one invocation plus whether a comment was posted for it.
pub struct InvocationOutcome {
    pub invocation: Invocation,
    pub status: InvocationStatus,
    pub posted: bool,
}

impl InvocationOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, InvocationStatus::Succeeded { .. })
    }
}

/// Posts `body` to `target`. Write failures are logged and reported as `false`.
pub async fn post_reply(
    platform: &dyn PullRequestPlatform,
    pr_number: u64,
    target: ReplyTarget,
    body: &str,
) -> bool {
    let result = match target {
        ReplyTarget::ReviewThread { root_id } => {
            platform
                .reply_to_review_comment(pr_number, root_id, body)
                .await
        }
        ReplyTarget::PullRequest => platform.create_comment(pr_number, body).await,
    };
    match result {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(
                pr = pr_number,
                error = %format!("{error:#}"),
                "failed to post comment"
            );
            false
        }
    }
}

async fn add_label_logged(platform: &dyn PullRequestPlatform, pr_number: u64, label: &str) {
    if let Err(error) = platform.add_label(pr_number, label).await {
        tracing::warn!(pr = pr_number, label, error = %format!("{error:#}"), "failed to add label");
    }
}

async fn remove_label_logged(platform: &dyn PullRequestPlatform, pr_number: u64, label: &str) {
    if let Err(error) = platform.remove_label(pr_number, label).await {
        tracing::warn!(pr = pr_number, label, error = %format!("{error:#}"), "failed to remove label");
    }
}

/// Holds the `running` label for one invocation.
///
/// `release` consumes the marker and settles the terminal label. Dropping an
/// unreleased marker only logs: label writes need the async platform.
///
/// This is not a full cleanup guard. If the event future is dropped while an
/// agent runs (process killed, runtime shut down), `running` stays on the pull
/// request and the next synchronize warns about it.
struct RunningMarker<'a> {
    platform: &'a dyn PullRequestPlatform,
    labels: &'a MarkerLabels,
    pr_number: u64,
    released: bool,
}

impl<'a> RunningMarker<'a> {
    async fn acquire(
        platform: &'a dyn PullRequestPlatform,
        labels: &'a MarkerLabels,
        pr_number: u64,
    ) -> RunningMarker<'a> {
        add_label_logged(platform, pr_number, &labels.running).await;
        Self {
            platform,
            labels,
            pr_number,
            released: false,
        }
    }

    async fn release(mut self, agent: &str, succeeded: bool, clear_failed: bool) {
        self.released = true;
        remove_label_logged(self.platform, self.pr_number, &self.labels.running).await;
        let seen = self.labels.seen(agent);
        if succeeded {
            if clear_failed {
                remove_label_logged(self.platform, self.pr_number, &self.labels.failed).await;
            }
            add_label_logged(self.platform, self.pr_number, &seen).await;
        } else {
            remove_label_logged(self.platform, self.pr_number, &seen).await;
            add_label_logged(self.platform, self.pr_number, &self.labels.failed).await;
        }
    }
}

impl Drop for RunningMarker<'_> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                pr = self.pr_number,
                label = %self.labels.running,
                "running marker dropped before release"
            );
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic payload".to_string()
}

/// Runs invocations one at a time against a static agent registry.
pub struct InvocationRunner {
    platform: Arc<dyn PullRequestPlatform>,
    registry: AgentRegistry,
    labels: MarkerLabels,
    repo: String,
}

impl InvocationRunner {
    pub fn new(
        platform: Arc<dyn PullRequestPlatform>,
        registry: AgentRegistry,
        labels: MarkerLabels,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            registry,
            labels,
            repo: repo.into(),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn labels(&self) -> &MarkerLabels {
        &self.labels
    }

    async fn execute(&self, invocation: &Invocation) -> Result<String, AgentError> {
        let agent = self
            .registry
            .get(&invocation.agent)
            .ok_or_else(|| AgentError::NotRegistered(invocation.agent.clone()))?;
        let context = AgentContext::from_invocation(invocation, &self.repo);
        match AssertUnwindSafe(agent.run(&context)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(AgentError::Panicked(panic_message(payload))),
        }
    }

    /// Runs one invocation through its full label cycle and posts its result.
    ///
    /// With `clear_failed` a success also removes a stale `failed` label.
    pub async fn run_invocation(
        &self,
        invocation: &Invocation,
        reply: ReplyTarget,
        posting: ResultPosting,
        clear_failed: bool,
    ) -> InvocationOutcome {
        let platform = self.platform.as_ref();
        let pr_number = invocation.pr_number;
        let marker = RunningMarker::acquire(platform, &self.labels, pr_number).await;
        let result = self.execute(invocation).await;
        marker
            .release(&invocation.agent, result.is_ok(), clear_failed)
            .await;

        let (status, body) = match result {
            Ok(output) => {
                tracing::info!(
                    pr = pr_number,
                    agent = %invocation.agent,
                    file = invocation.file_path.as_deref().unwrap_or("-"),
                    trigger = %invocation.trigger,
                    "invocation succeeded"
                );
                let body = (posting == ResultPosting::Always)
                    .then(|| render_invocation_success(invocation, &output));
                (InvocationStatus::Succeeded { output }, body)
            }
            Err(error) => {
                let error = error.to_string();
                tracing::warn!(
                    pr = pr_number,
                    agent = %invocation.agent,
                    file = invocation.file_path.as_deref().unwrap_or("-"),
                    trigger = %invocation.trigger,
                    error = %error,
                    "invocation failed"
                );
                let body = render_invocation_failure(invocation, &error);
                (InvocationStatus::Failed { error }, Some(body))
            }
        };
        let posted = match body {
            Some(body) => post_reply(platform, pr_number, reply, &body).await,
            None => false,
        };
        InvocationOutcome {
            invocation: invocation.clone(),
            status,
            posted,
        }
    }

    /// Runs `invocations` sequentially; one failure never stops the rest.
    ///
    /// A success only clears `failed` while no earlier invocation of the batch
    /// has failed.
    pub async fn run_all(
        &self,
        invocations: &[Invocation],
        reply: ReplyTarget,
        posting: ResultPosting,
    ) -> Vec<InvocationOutcome> {
        let mut outcomes = Vec::with_capacity(invocations.len());
        let mut batch_failed = false;
        for invocation in invocations {
            let outcome = self
                .run_invocation(invocation, reply, posting, !batch_failed)
                .await;
            batch_failed |= !outcome.succeeded();
            outcomes.push(outcome);
        }
        outcomes
    }
}
