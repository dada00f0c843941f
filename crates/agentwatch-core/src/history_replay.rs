//! Replay of watch/unwatch commands from review-comment history.
//!
//! Comment history is treated as an append-only event log. [`replay_history`]
//! orders the log deterministically and folds it into a [`WatchState`] without
//! any I/O, so fetch order never influences the result.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::glob_pattern::GlobPattern;
use crate::watch_command_parser::{parse_watch_command, WatchCommand, WILDCARD_TOKEN};
use crate::watch_comment::is_agentwatch_comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `CommentKind` values.
pub enum CommentKind {
    /// Pull-request level conversation comment.
    Issue,
    /// File-scoped review comment.
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One comment in the replay log.
pub struct HistoryComment {
    pub id: u64,
    pub pr_number: u64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    #[serde(default)]
    pub path: Option<String>,
    pub kind: CommentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// An active pattern → agent → arguments binding.
pub struct Binding {
    pub pattern: String,
    pub agent: String,
    pub args: String,
    pub source_pr: u64,
    pub comment_id: u64,
    pub created_at: DateTime<Utc>,
    pub author: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Per-agent exclusion patterns. Sets only grow.
pub struct ExclusionSets {
    by_agent: BTreeMap<String, BTreeSet<String>>,
}

impl ExclusionSets {
    /// Records `pattern` for `agent`; returns true when it was new.
    pub fn record(&mut self, agent: &str, pattern: &str) -> bool {
        self.by_agent
            .entry(agent.to_string())
            .or_default()
            .insert(pattern.to_string())
    }

    /// Patterns that veto matches for `agent`, wildcard entries included.
    pub fn patterns_for<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let own = self.by_agent.get(agent).into_iter().flatten();
        let wildcard = if agent == WILDCARD_TOKEN {
            None
        } else {
            self.by_agent.get(WILDCARD_TOKEN)
        };
        own.chain(wildcard.into_iter().flatten())
            .map(String::as_str)
    }

    pub fn is_excluded(&self, agent: &str, path: &str) -> bool {
        self.patterns_for(agent)
            .any(|pattern| GlobPattern::compile(pattern).is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.by_agent.values().all(BTreeSet::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_agent
            .iter()
            .map(|(agent, patterns)| (agent.as_str(), patterns))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `FoldEffect` values.
pub enum FoldEffect {
    Bound { superseded: Option<Binding> },
    Unbound { removed: Option<Binding>, excluded: bool },
    Cleared { removed: usize, excluded: bool },
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Current bindings plus exclusions at some point of the replay.
pub struct WatchState {
    bindings: Vec<Binding>,
    exclusions: ExclusionSets,
}

impl WatchState {
    /// Bindings in insertion/replacement order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn exclusions(&self) -> &ExclusionSets {
        &self.exclusions
    }

    pub fn binding_for_pattern(&self, pattern: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|binding| binding.pattern == pattern)
    }

    /// Bindings whose originating comment lives on `pr_number`.
    pub fn bindings_from_pr(&self, pr_number: u64) -> Vec<Binding> {
        self.bindings
            .iter()
            .filter(|binding| binding.source_pr == pr_number)
            .cloned()
            .collect()
    }

    /// Applies one parsed command issued by `comment`.
    pub fn apply(&mut self, comment: &HistoryComment, command: &WatchCommand) -> FoldEffect {
        match command {
            WatchCommand::Watch {
                pattern,
                agent,
                args,
            } => {
                let superseded = self.remove_pattern(pattern);
                self.bindings.push(Binding {
                    pattern: pattern.clone(),
                    agent: agent.clone(),
                    args: args.clone(),
                    source_pr: comment.pr_number,
                    comment_id: comment.id,
                    created_at: comment.created_at,
                    author: comment.author.clone(),
                });
                FoldEffect::Bound { superseded }
            }
            WatchCommand::Unwatch { agent, pattern } if pattern == WILDCARD_TOKEN => {
                let removed = self.bindings.len();
                self.bindings.clear();
                let excluded = agent != WILDCARD_TOKEN && self.exclusions.record(agent, pattern);
                FoldEffect::Cleared { removed, excluded }
            }
            WatchCommand::Unwatch { agent, pattern } => {
                let removed = self.remove_pattern(pattern);
                let excluded = self.exclusions.record(agent, pattern);
                FoldEffect::Unbound { removed, excluded }
            }
            WatchCommand::List | WatchCommand::Run { .. } => FoldEffect::Unchanged,
        }
    }

    fn remove_pattern(&mut self, pattern: &str) -> Option<Binding> {
        let index = self
            .bindings
            .iter()
            .position(|binding| binding.pattern == pattern)?;
        Some(self.bindings.remove(index))
    }
}

/// Sorts comments by creation time, ties broken by comment id.
pub fn order_history(comments: &mut [HistoryComment]) {
    comments.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then(left.id.cmp(&right.id))
    });
}

/// Orders `comments` and folds every parsed command into a fresh state.
///
/// Comments authored by `bot_login` or carrying the AgentWatch footer marker
/// are skipped, as are comments whose command fails to parse.
pub fn replay_history(comments: &[HistoryComment], bot_login: Option<&str>) -> WatchState {
    let mut ordered = comments.to_vec();
    order_history(&mut ordered);
    let mut state = WatchState::default();
    for comment in &ordered {
        if bot_login.is_some_and(|login| login == comment.author)
            || is_agentwatch_comment(&comment.body)
        {
            continue;
        }
        let Some(Ok(command)) = parse_watch_command(&comment.body) else {
            continue;
        };
        let effect = state.apply(comment, &command);
        tracing::debug!(
            pr = comment.pr_number,
            comment_id = comment.id,
            command = command.keyword().as_str(),
            effect = ?effect,
            "replayed command"
        );
    }
    state
}
