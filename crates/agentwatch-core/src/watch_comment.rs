//! Comment rendering shared by AgentWatch replies.
//!
//! Every comment the bot posts ends with a hidden marker so replay can skip it
//! even when the bot login is unknown.

use crate::history_replay::{FoldEffect, WatchState};
use crate::watch_command_parser::{command_usage, CommandParseError, WILDCARD_TOKEN};

pub const AGENTWATCH_MARKER_PREFIX: &str = "<!-- agentwatch:";
pub const AGENTWATCH_MARKER_SUFFIX: &str = " -->";
/// GitHub rejects comment bodies above 65 536 characters.
pub const COMMENT_MAX_CHARS: usize = 65_000;

pub fn is_agentwatch_comment(body: &str) -> bool {
    body.contains(AGENTWATCH_MARKER_PREFIX)
}

/// Appends the hidden marker footer tagged with `kind`.
pub fn with_marker_footer(body: &str, kind: &str) -> String {
    format!("{body}\n\n{AGENTWATCH_MARKER_PREFIX}{kind}{AGENTWATCH_MARKER_SUFFIX}")
}

pub fn truncate_for_comment(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

pub fn render_parse_error_reply(error: &CommandParseError) -> String {
    with_marker_footer(
        &format!(
            "AgentWatch could not parse `{}`: {}.\n\nUsage: {}\n\nAvailable commands:\n{}",
            error.keyword.as_str(),
            error.message,
            error.usage(),
            command_usage()
        ),
        "usage",
    )
}

pub fn render_resolution_error(message: &str) -> String {
    with_marker_footer(&format!("AgentWatch error: {message}"), "error")
}

/// Renders the `list` reply: active bindings followed by exclusions.
pub fn render_watch_state(state: &WatchState) -> String {
    let mut lines = Vec::new();
    if state.bindings().is_empty() {
        lines.push("AgentWatch has no active watches.".to_string());
    } else {
        lines.push(format!(
            "AgentWatch active watches: {}",
            state.bindings().len()
        ));
        lines.push(String::new());
        lines.push("| Pattern | Agent | Arguments | Source | Author |".to_string());
        lines.push("|---|---|---|---|---|".to_string());
        for binding in state.bindings() {
            let args = if binding.args.is_empty() {
                "-".to_string()
            } else {
                format!("`{}`", binding.args)
            };
            lines.push(format!(
                "| `{}` | `{}` | {} | #{} | @{} |",
                binding.pattern, binding.agent, args, binding.source_pr, binding.author
            ));
        }
    }
    if !state.exclusions().is_empty() {
        lines.push(String::new());
        lines.push("Exclusions:".to_string());
        for (agent, patterns) in state.exclusions().iter() {
            let agent = if agent == WILDCARD_TOKEN {
                "all agents".to_string()
            } else {
                format!("`{agent}`")
            };
            let patterns = patterns
                .iter()
                .map(|pattern| format!("`{pattern}`"))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("- {agent}: {patterns}"));
        }
    }
    with_marker_footer(&lines.join("\n"), "list")
}

pub fn render_unwatch_ack(agent: &str, pattern: &str, effect: &FoldEffect) -> String {
    let summary = match effect {
        FoldEffect::Cleared { removed, excluded } => {
            let mut text = format!("AgentWatch cleared {removed} active watch(es).");
            if *excluded {
                text.push_str(&format!(" `{agent}` now skips every file."));
            }
            text
        }
        FoldEffect::Unbound { removed, excluded } => {
            let mut text = match removed {
                Some(binding) => format!(
                    "AgentWatch removed watch `{}` → `{}`.",
                    binding.pattern, binding.agent
                ),
                None => format!("AgentWatch has no watch for `{pattern}`."),
            };
            if *excluded {
                text.push_str(&format!(" `{agent}` now skips files matching `{pattern}`."));
            } else {
                text.push_str(&format!(" `{pattern}` was already excluded for `{agent}`."));
            }
            text
        }
        FoldEffect::Bound { .. } | FoldEffect::Unchanged => {
            format!("AgentWatch recorded `unwatch {agent} {pattern}`.")
        }
    };
    with_marker_footer(&summary, "unwatch")
}
