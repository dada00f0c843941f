//! Decoding of GitHub Actions event payloads into routed events.

use std::path::Path;

use agentwatch_core::{CommentKind, HistoryComment};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
struct EventUser {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EventLabel {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct IssueCommentPayload {
    action: String,
    issue: EventIssue,
    comment: EventComment,
}

#[derive(Debug, Clone, Deserialize)]
struct EventIssue {
    number: u64,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    user: Option<EventUser>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    pull_request_review_id: Option<u64>,
    #[serde(default)]
    in_reply_to_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReviewCommentPayload {
    action: String,
    pull_request: EventPullRequest,
    comment: EventComment,
}

#[derive(Debug, Clone, Deserialize)]
struct EventPullRequest {
    number: u64,
    #[serde(default)]
    labels: Vec<EventLabel>,
}

#[derive(Debug, Clone, Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: EventPullRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A newly created comment, general or file-scoped.
pub struct CommentEvent {
    pub comment_id: u64,
    pub number: u64,
    pub on_pull_request: bool,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub path: Option<String>,
    pub review_id: Option<u64>,
    pub in_reply_to: Option<u64>,
    pub kind: CommentKind,
}

impl CommentEvent {
    /// Review thread to reply into; replies always target the thread's root.
    pub fn thread_root(&self) -> Option<u64> {
        match self.kind {
            CommentKind::Review => Some(self.in_reply_to.unwrap_or(self.comment_id)),
            CommentKind::Issue => None,
        }
    }

    pub fn is_file_scoped(&self) -> bool {
        self.path.is_some()
    }

    pub fn to_history_comment(&self) -> HistoryComment {
        HistoryComment {
            id: self.comment_id,
            pr_number: self.number,
            author: self.author.clone(),
            created_at: self.created_at,
            body: self.body.clone(),
            path: self.path.clone(),
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `InboundEvent` values.
pub enum InboundEvent {
    CommentCreated(CommentEvent),
    PullRequestOpened { number: u64 },
    PullRequestSynchronized { number: u64, labels: Vec<String> },
    Ignored { reason: String },
}

impl InboundEvent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::CommentCreated(_) => "comment_created",
            Self::PullRequestOpened { .. } => "pull_request_opened",
            Self::PullRequestSynchronized { .. } => "pull_request_synchronized",
            Self::Ignored { .. } => "ignored",
        }
    }

    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

fn decode_payload<T: DeserializeOwned>(event_name: &str, payload: &Value) -> Result<T> {
    T::deserialize(payload).with_context(|| format!("malformed `{event_name}` payload"))
}

fn comment_event(
    comment: EventComment,
    number: u64,
    on_pull_request: bool,
    kind: CommentKind,
) -> CommentEvent {
    CommentEvent {
        comment_id: comment.id,
        number,
        on_pull_request,
        author: comment
            .user
            .map(|user| user.login)
            .unwrap_or_else(|| "ghost".to_string()),
        body: comment.body.unwrap_or_default(),
        created_at: comment.created_at,
        path: comment.path.filter(|path| !path.trim().is_empty()),
        review_id: comment.pull_request_review_id,
        in_reply_to: comment.in_reply_to_id,
        kind,
    }
}

/// Maps a webhook `event_name` plus payload onto an [`InboundEvent`].
///
/// Unknown events and actions are ignored rather than rejected; a payload
/// missing the fields needed for routing is an error.
pub fn decode_webhook_event(event_name: &str, payload: &Value) -> Result<InboundEvent> {
    match event_name {
        "issue_comment" => {
            let payload: IssueCommentPayload = decode_payload(event_name, payload)?;
            if payload.action != "created" {
                return Ok(InboundEvent::ignored(format!(
                    "issue_comment action `{}`",
                    payload.action
                )));
            }
            let on_pull_request = payload.issue.pull_request.is_some();
            Ok(InboundEvent::CommentCreated(comment_event(
                payload.comment,
                payload.issue.number,
                on_pull_request,
                CommentKind::Issue,
            )))
        }
        "pull_request_review_comment" => {
            let payload: ReviewCommentPayload = decode_payload(event_name, payload)?;
            if payload.action != "created" {
                return Ok(InboundEvent::ignored(format!(
                    "pull_request_review_comment action `{}`",
                    payload.action
                )));
            }
            Ok(InboundEvent::CommentCreated(comment_event(
                payload.comment,
                payload.pull_request.number,
                true,
                CommentKind::Review,
            )))
        }
        "pull_request" | "pull_request_target" => {
            let payload: PullRequestPayload = decode_payload(event_name, payload)?;
            let number = payload.pull_request.number;
            match payload.action.as_str() {
                "opened" | "reopened" => Ok(InboundEvent::PullRequestOpened { number }),
                "synchronize" => Ok(InboundEvent::PullRequestSynchronized {
                    number,
                    labels: payload
                        .pull_request
                        .labels
                        .into_iter()
                        .map(|label| label.name)
                        .collect(),
                }),
                other => Ok(InboundEvent::ignored(format!(
                    "pull_request action `{other}`"
                ))),
            }
        }
        other => Ok(InboundEvent::ignored(format!("event `{other}`"))),
    }
}

/// Reads the event file GitHub Actions exposes as `GITHUB_EVENT_PATH`.
pub fn load_webhook_event(event_name: &str, path: &Path) -> Result<InboundEvent> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    let payload: Value = serde_json::from_str(&raw)
        .with_context(|| format!("event payload {} is not JSON", path.display()))?;
    if !payload.is_object() {
        bail!("event payload {} is not a JSON object", path.display());
    }
    decode_webhook_event(event_name, &payload)
}
