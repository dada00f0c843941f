use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the agent token and free-form agent arguments.
pub const AGENT_ARGS_SEPARATOR: &str = " @ ";
/// Agent or pattern token meaning "everything" inside `unwatch`.
pub const WILDCARD_TOKEN: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `CommandKeyword` values.
pub enum CommandKeyword {
    Watch,
    Unwatch,
    List,
    Run,
}

impl CommandKeyword {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "watch" => Some(Self::Watch),
            "unwatch" => Some(Self::Unwatch),
            "list" => Some(Self::List),
            "run" => Some(Self::Run),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watch => "watch",
            Self::Unwatch => "unwatch",
            Self::List => "list",
            Self::Run => "run",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Self::Watch => "`watch <pattern> <agent> [@ <agent-args>]`",
            Self::Unwatch => "`unwatch <agent> <pattern>` (use `*` as pattern to exclude every file)",
            Self::List => "`list`",
            Self::Run => "`run <agent> [@ <agent-args>]`",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
/// One structured command recovered from a comment body.
pub enum WatchCommand {
    Watch {
        pattern: String,
        agent: String,
        args: String,
    },
    Unwatch {
        agent: String,
        pattern: String,
    },
    List,
    Run {
        agent: String,
        args: String,
    },
}

impl WatchCommand {
    pub fn keyword(&self) -> CommandKeyword {
        match self {
            Self::Watch { .. } => CommandKeyword::Watch,
            Self::Unwatch { .. } => CommandKeyword::Unwatch,
            Self::List => CommandKeyword::List,
            Self::Run { .. } => CommandKeyword::Run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
/// A recognised command keyword followed by malformed arguments.
pub struct CommandParseError {
    pub keyword: CommandKeyword,
    pub message: String,
}

impl CommandParseError {
    fn new(keyword: CommandKeyword, message: impl Into<String>) -> Self {
        Self {
            keyword,
            message: message.into(),
        }
    }

    pub fn usage(&self) -> &'static str {
        self.keyword.usage()
    }
}

/// Renders the full command reference used in help and error replies.
pub fn command_usage() -> String {
    [
        CommandKeyword::Watch,
        CommandKeyword::Unwatch,
        CommandKeyword::List,
        CommandKeyword::Run,
    ]
    .iter()
    .map(|keyword| format!("- {}", keyword.usage()))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Parses the first recognised command line of a comment body.
///
/// Returns `None` when no line starts with a command keyword.
pub fn parse_watch_command(body: &str) -> Option<Result<WatchCommand, CommandParseError>> {
    body.lines().find_map(|line| {
        let line = line.trim();
        let (token, remainder) = split_token(line);
        let keyword = CommandKeyword::from_token(token)?;
        Some(parse_command_line(keyword, remainder))
    })
}

fn parse_command_line(
    keyword: CommandKeyword,
    remainder: &str,
) -> Result<WatchCommand, CommandParseError> {
    match keyword {
        CommandKeyword::Watch => parse_watch(remainder),
        CommandKeyword::Unwatch => parse_unwatch(remainder),
        CommandKeyword::List => {
            if remainder.is_empty() {
                Ok(WatchCommand::List)
            } else {
                Err(CommandParseError::new(
                    keyword,
                    format!("`list` takes no arguments, found `{remainder}`"),
                ))
            }
        }
        CommandKeyword::Run => parse_run(remainder),
    }
}

fn parse_watch(remainder: &str) -> Result<WatchCommand, CommandParseError> {
    let keyword = CommandKeyword::Watch;
    let (head, separated_args) = split_agent_args(remainder);
    let (pattern, rest) = split_token(head);
    if pattern.is_empty() {
        return Err(CommandParseError::new(keyword, "missing pattern and agent"));
    }
    let (agent, trailing) = split_token(rest);
    if agent.is_empty() {
        return Err(CommandParseError::new(
            keyword,
            format!("missing agent after pattern `{pattern}`"),
        ));
    }
    let args = resolve_args(keyword, separated_args, trailing)?;
    Ok(WatchCommand::Watch {
        pattern: pattern.to_string(),
        agent: agent.to_string(),
        args,
    })
}

fn parse_unwatch(remainder: &str) -> Result<WatchCommand, CommandParseError> {
    let keyword = CommandKeyword::Unwatch;
    let mut tokens = remainder.split_whitespace();
    let (Some(agent), Some(pattern)) = (tokens.next(), tokens.next()) else {
        return Err(CommandParseError::new(
            keyword,
            "both an agent and a pattern are required",
        ));
    };
    if let Some(extra) = tokens.next() {
        return Err(CommandParseError::new(
            keyword,
            format!("unexpected argument `{extra}` after pattern"),
        ));
    }
    Ok(WatchCommand::Unwatch {
        agent: agent.to_string(),
        pattern: pattern.to_string(),
    })
}

fn parse_run(remainder: &str) -> Result<WatchCommand, CommandParseError> {
    let keyword = CommandKeyword::Run;
    let (head, separated_args) = split_agent_args(remainder);
    let (agent, trailing) = split_token(head);
    if agent.is_empty() {
        return Err(CommandParseError::new(keyword, "missing agent"));
    }
    let args = resolve_args(keyword, separated_args, trailing)?;
    Ok(WatchCommand::Run {
        agent: agent.to_string(),
        args,
    })
}

fn resolve_args(
    keyword: CommandKeyword,
    separated_args: Option<&str>,
    trailing: &str,
) -> Result<String, CommandParseError> {
    match separated_args {
        Some(args) if trailing.is_empty() => Ok(args.trim().to_string()),
        Some(_) => Err(CommandParseError::new(
            keyword,
            format!("unexpected `{trailing}` before `@` separator"),
        )),
        None => Ok(trailing.trim().to_string()),
    }
}

/// Splits `remainder` at the first ` @ ` separator. A dangling trailing ` @`
/// counts as a separator with empty arguments.
fn split_agent_args(remainder: &str) -> (&str, Option<&str>) {
    if remainder == "@" {
        return ("", Some(""));
    }
    if let Some(args) = remainder.strip_prefix("@ ") {
        return ("", Some(args));
    }
    if let Some((head, args)) = remainder.split_once(AGENT_ARGS_SEPARATOR) {
        return (head.trim(), Some(args));
    }
    if let Some(head) = remainder.strip_suffix(" @") {
        return (head.trim(), Some(""));
    }
    (remainder.trim(), None)
}

fn split_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], text[end..].trim()),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::{command_usage, parse_watch_command, CommandKeyword, WatchCommand};

    fn parsed(body: &str) -> WatchCommand {
        parse_watch_command(body)
            .expect("command recognised")
            .expect("command parsed")
    }

    #[test]
    fn unit_parse_watch_command_returns_none_without_keyword() {
        assert!(parse_watch_command("looks good to me").is_none());
        assert!(parse_watch_command("").is_none());
        assert!(parse_watch_command("Watch *.js echo").is_none());
        assert!(parse_watch_command("I will watch this").is_none());
    }

    #[test]
    fn unit_parse_watch_with_separator_args() {
        assert_eq!(
            parsed("watch src/**/*.ts typecheck @ --strict"),
            WatchCommand::Watch {
                pattern: "src/**/*.ts".to_string(),
                agent: "typecheck".to_string(),
                args: "--strict".to_string(),
            }
        );
    }

    #[test]
    fn functional_parse_watch_without_separator_captures_trailing_text() {
        assert_eq!(
            parsed("watch *.js lint   --fix --quiet  "),
            WatchCommand::Watch {
                pattern: "*.js".to_string(),
                agent: "lint".to_string(),
                args: "--fix --quiet".to_string(),
            }
        );
        assert_eq!(
            parsed("watch *.js echo"),
            WatchCommand::Watch {
                pattern: "*.js".to_string(),
                agent: "echo".to_string(),
                args: String::new(),
            }
        );
    }

    #[test]
    fn functional_parse_watch_keeps_separator_args_verbatim() {
        assert_eq!(
            parsed("watch *.py review @  focus on  security @ depth=2 "),
            WatchCommand::Watch {
                pattern: "*.py".to_string(),
                agent: "review".to_string(),
                args: "focus on  security @ depth=2".to_string(),
            }
        );
        assert_eq!(
            parsed("watch *.py review @"),
            WatchCommand::Watch {
                pattern: "*.py".to_string(),
                agent: "review".to_string(),
                args: String::new(),
            }
        );
    }

    #[test]
    fn functional_parse_unwatch_list_and_run() {
        assert_eq!(
            parsed("unwatch echo *.js"),
            WatchCommand::Unwatch {
                agent: "echo".to_string(),
                pattern: "*.js".to_string(),
            }
        );
        assert_eq!(parsed("list"), WatchCommand::List);
        assert_eq!(
            parsed("run security-review @ owasp top 10"),
            WatchCommand::Run {
                agent: "security-review".to_string(),
                args: "owasp top 10".to_string(),
            }
        );
        assert_eq!(
            parsed("run echo"),
            WatchCommand::Run {
                agent: "echo".to_string(),
                args: String::new(),
            }
        );
    }

    #[test]
    fn integration_parse_uses_first_command_line_only() {
        let body = "Thanks for the PR!\n\n  watch *.rs clippy @ -D warnings\nunwatch clippy *.rs\n";
        assert_eq!(
            parsed(body),
            WatchCommand::Watch {
                pattern: "*.rs".to_string(),
                agent: "clippy".to_string(),
                args: "-D warnings".to_string(),
            }
        );
    }

    #[test]
    fn regression_malformed_commands_return_parse_errors() {
        let cases = [
            ("watch", CommandKeyword::Watch),
            ("watch *.js", CommandKeyword::Watch),
            ("watch *.js @ --strict", CommandKeyword::Watch),
            ("watch *.js echo extra @ --strict", CommandKeyword::Watch),
            ("unwatch echo", CommandKeyword::Unwatch),
            ("unwatch echo *.js extra", CommandKeyword::Unwatch),
            ("list everything", CommandKeyword::List),
            ("run", CommandKeyword::Run),
            ("run @ args", CommandKeyword::Run),
        ];
        for (body, keyword) in cases {
            let error = parse_watch_command(body)
                .expect("keyword recognised")
                .expect_err("malformed command");
            assert_eq!(error.keyword, keyword, "body {body:?}");
            assert!(!error.message.is_empty());
            assert_eq!(error.usage(), keyword.usage());
        }
    }

    #[test]
    fn regression_command_usage_lists_every_keyword() {
        let usage = command_usage();
        for keyword in ["watch", "unwatch", "list", "run"] {
            assert!(usage.contains(&format!("`{keyword}")), "{keyword}");
        }
    }
}
