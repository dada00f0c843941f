//! Pure building blocks for AgentWatch.
//! This crate compiles glob patterns, parses watch commands from comment
//! bodies, replays comment history into active bindings and matches those
//! bindings against file paths. Nothing here performs I/O.

pub mod binding_matcher;
pub mod glob_pattern;
pub mod history_replay;
pub mod watch_command_parser;
pub mod watch_comment;

pub use binding_matcher::{match_bindings, BindingMatch, Invocation, InvocationTrigger};
pub use glob_pattern::{glob_matches, GlobPattern, MATCH_ALL_PATTERN};
pub use history_replay::{
    order_history, replay_history, Binding, CommentKind, ExclusionSets, FoldEffect,
    HistoryComment, WatchState,
};
pub use watch_command_parser::{
    command_usage, parse_watch_command, CommandKeyword, CommandParseError, WatchCommand,
    AGENT_ARGS_SEPARATOR, WILDCARD_TOKEN,
};
