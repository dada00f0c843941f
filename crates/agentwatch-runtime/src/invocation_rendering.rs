//! Comment bodies posted for invocation results.

use agentwatch_core::watch_comment::{truncate_for_comment, with_marker_footer, COMMENT_MAX_CHARS};
use agentwatch_core::Invocation;

use crate::invocation_runner::{InvocationOutcome, InvocationStatus};

const FAILURE_MESSAGE_MAX_CHARS: usize = 2_000;
// Leaves room for the heading and marker footer.
const OUTPUT_MAX_CHARS: usize = COMMENT_MAX_CHARS - 1_000;

fn file_label(invocation: &Invocation) -> String {
    invocation
        .file_path
        .as_deref()
        .map(|path| format!("`{path}`"))
        .unwrap_or_else(|| "no file".to_string())
}

pub fn render_invocation_success(invocation: &Invocation, output: &str) -> String {
    let mut body = format!(
        "AgentWatch ran `{}` on {} (trigger `{}`).",
        invocation.agent,
        file_label(invocation),
        invocation.trigger
    );
    let output = output.trim();
    if !output.is_empty() {
        body.push_str(&format!(
            "\n\n```text\n{}\n```",
            truncate_for_comment(output, OUTPUT_MAX_CHARS)
        ));
    }
    with_marker_footer(&body, "result")
}

pub fn render_invocation_failure(invocation: &Invocation, error: &str) -> String {
    let mut body = format!(
        "AgentWatch agent `{}` failed on {}.\n\nTrigger: `{}`",
        invocation.agent,
        file_label(invocation),
        invocation.trigger
    );
    if let Some(pattern) = &invocation.source_pattern {
        body.push_str(&format!("\nPattern: `{pattern}`"));
    }
    body.push_str(&format!(
        "\nError: `{}`",
        truncate_for_comment(error, FAILURE_MESSAGE_MAX_CHARS)
    ));
    with_marker_footer(&body, "failure")
}

/// One comment summarising every invocation run for a newly opened PR.
pub fn render_bootstrap_summary(pr_number: u64, outcomes: &[InvocationOutcome]) -> String {
    let succeeded = outcomes
        .iter()
        .filter(|outcome| outcome.succeeded())
        .count();
    let mut lines = vec![
        format!(
            "AgentWatch matched {} existing watch invocation(s) on #{pr_number}: {succeeded} succeeded, {} failed.",
            outcomes.len(),
            outcomes.len() - succeeded
        ),
        String::new(),
        "| File | Agent | Pattern | Status |".to_string(),
        "|---|---|---|---|".to_string(),
    ];
    for outcome in outcomes {
        let invocation = &outcome.invocation;
        let status = match &outcome.status {
            InvocationStatus::Succeeded { .. } => "succeeded",
            InvocationStatus::Failed { .. } => "failed",
        };
        lines.push(format!(
            "| {} | `{}` | `{}` | {status} |",
            file_label(invocation),
            invocation.agent,
            invocation.source_pattern.as_deref().unwrap_or("-")
        ));
    }
    let results = outcomes
        .iter()
        .filter_map(|outcome| match &outcome.status {
            InvocationStatus::Succeeded { output } if !output.trim().is_empty() => Some(format!(
                "<details><summary>{} on {}</summary>\n\n```text\n{}\n```\n</details>",
                outcome.invocation.agent,
                file_label(&outcome.invocation),
                output.trim()
            )),
            _ => None,
        })
        .collect::<Vec<_>>();
    if !results.is_empty() {
        lines.push(String::new());
        lines.extend(results);
    }
    with_marker_footer(
        &truncate_for_comment(&lines.join("\n"), OUTPUT_MAX_CHARS),
        "summary",
    )
}

#[cfg(test)]
mod tests {
    use agentwatch_core::watch_comment::is_agentwatch_comment;
    use agentwatch_core::{Invocation, InvocationTrigger};

    use super::{render_bootstrap_summary, render_invocation_failure, render_invocation_success};
    use crate::invocation_runner::{InvocationOutcome, InvocationStatus};

    fn invocation(file: Option<&str>) -> Invocation {
        Invocation {
            file_path: file.map(str::to_string),
            agent: "echo".to_string(),
            args: String::new(),
            pr_number: 3,
            comment_id: None,
            trigger: InvocationTrigger::AutoPatternMatch,
            source_pattern: Some("*.js".to_string()),
        }
    }

    #[test]
    fn unit_success_comment_includes_output_block() {
        let rendered = render_invocation_success(&invocation(Some("a.js")), "all good\n");
        assert!(rendered.starts_with("AgentWatch ran `echo` on `a.js` (trigger `auto_pattern_match`)."));
        assert!(rendered.contains("```text\nall good\n```"));
        assert!(is_agentwatch_comment(&rendered));
    }

    #[test]
    fn functional_failure_comment_names_agent_file_and_trigger() {
        let rendered = render_invocation_failure(&invocation(None), "exit 2");
        assert!(rendered.contains("agent `echo` failed on no file"));
        assert!(rendered.contains("Trigger: `auto_pattern_match`"));
        assert!(rendered.contains("Pattern: `*.js`"));
        assert!(rendered.contains("Error: `exit 2`"));
    }

    #[test]
    fn integration_bootstrap_summary_lists_every_outcome() {
        let outcomes = vec![
            InvocationOutcome {
                invocation: invocation(Some("a.js")),
                status: InvocationStatus::Succeeded {
                    output: "ok".to_string(),
                },
                posted: false,
            },
            InvocationOutcome {
                invocation: invocation(Some("b.js")),
                status: InvocationStatus::Failed {
                    error: "boom".to_string(),
                },
                posted: true,
            },
        ];
        let rendered = render_bootstrap_summary(8, &outcomes);
        assert!(rendered.contains("2 existing watch invocation(s) on #8: 1 succeeded, 1 failed."));
        assert!(rendered.contains("| `a.js` | `echo` | `*.js` | succeeded |"));
        assert!(rendered.contains("| `b.js` | `echo` | `*.js` | failed |"));
        assert!(rendered.contains("<summary>echo on `a.js`</summary>"));
    }

    #[test]
    fn regression_large_output_is_truncated() {
        let rendered = render_invocation_success(&invocation(Some("a.js")), &"x".repeat(70_000));
        assert!(rendered.chars().count() < 65_000);
        assert!(rendered.contains("..."));
    }
}
