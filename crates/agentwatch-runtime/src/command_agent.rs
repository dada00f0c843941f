//! Operator-declared agents backed by local executables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::agent_registry::{Agent, AgentContext, AgentError, AgentRegistry};

const AGENT_STDERR_MAX_CHARS: usize = 600;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
/// Contents of the `--agents-config` TOML file.
pub struct AgentsConfig {
    #[serde(default)]
    pub agents: BTreeMap<String, CommandAgentConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandAgentConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

pub fn parse_agents_config(raw: &str) -> Result<AgentsConfig> {
    toml::from_str(raw).context("failed to parse agents config")
}

pub fn load_agents_config(path: &Path) -> Result<AgentsConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_agents_config(&raw).with_context(|| format!("invalid agents config {}", path.display()))
}

/// Builds the registry from the built-in agents plus `config`.
pub fn build_agent_registry(config: &AgentsConfig) -> Result<AgentRegistry> {
    let mut registry = AgentRegistry::with_builtin_agents();
    for (name, agent_config) in &config.agents {
        registry
            .register(name, Arc::new(CommandAgent::new(agent_config.clone())))
            .with_context(|| format!("failed to register agent '{name}'"))?;
    }
    Ok(registry)
}

/// Runs a configured executable once per invocation.
///
/// The invocation context is exported as `AGENTWATCH_*` environment variables
/// (and as JSON in `AGENTWATCH_CONTEXT`); the user-supplied agent arguments are
/// split shell-style and appended after the configured arguments. Stdout is the
/// agent result, a non-zero exit is an execution error.
pub struct CommandAgent {
    config: CommandAgentConfig,
    description: String,
}

impl CommandAgent {
    pub fn new(config: CommandAgentConfig) -> Self {
        let description = config
            .description
            .clone()
            .unwrap_or_else(|| format!("Runs `{}`.", config.command));
        Self {
            config,
            description,
        }
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, context: &AgentContext) -> Result<String, AgentError> {
        let user_args = shell_words::split(&context.args)
            .map_err(|error| AgentError::InvalidArguments(error.to_string()))?;
        let context_json = serde_json::to_string(context)
            .map_err(|error| AgentError::Execution(error.to_string()))?;
        let mut command = tokio::process::Command::new(&self.config.command);
        command.args(&self.config.args).args(&user_args);
        if let Some(working_dir) = &self.config.working_dir {
            command.current_dir(working_dir);
        }
        command
            .env("AGENTWATCH_AGENT", &context.agent)
            .env("AGENTWATCH_ARGS", &context.args)
            .env("AGENTWATCH_REPO", &context.repo)
            .env("AGENTWATCH_PR_NUMBER", context.pr_number.to_string())
            .env("AGENTWATCH_TRIGGER", context.trigger.as_str())
            .env(
                "AGENTWATCH_FILE_PATH",
                context.file_path.as_deref().unwrap_or_default(),
            )
            .env(
                "AGENTWATCH_COMMENT_ID",
                context
                    .comment_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            )
            .env("AGENTWATCH_CONTEXT", context_json);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        let output = command.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::Execution(format!(
                "`{}` exited with code {}: {}",
                self.config.command,
                output.status.code().unwrap_or(1),
                agentwatch_core::watch_comment::truncate_for_comment(
                    stderr.trim(),
                    AGENT_STDERR_MAX_CHARS
                )
            )));
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use agentwatch_core::InvocationTrigger;
    use tempfile::tempdir;

    use super::{
        build_agent_registry, load_agents_config, parse_agents_config, CommandAgent,
        CommandAgentConfig,
    };
    use crate::agent_registry::{Agent, AgentContext, AgentError};

    fn context(args: &str) -> AgentContext {
        AgentContext {
            file_path: Some("src/a.js".to_string()),
            pr_number: 12,
            comment_id: Some(99),
            agent: "shell".to_string(),
            args: args.to_string(),
            repo: "owner/repo".to_string(),
            trigger: InvocationTrigger::Manual,
        }
    }

    fn shell_agent(script: &str) -> CommandAgent {
        CommandAgent::new(CommandAgentConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "agent".to_string()],
            description: None,
            working_dir: None,
        })
    }

    #[test]
    fn unit_parse_agents_config_reads_command_agents() {
        let config = parse_agents_config(
            r#"
[agents.lint]
command = "npx"
args = ["eslint", "--format", "unix"]
description = "ESLint"
"#,
        )
        .expect("config");
        let lint = config.agents.get("lint").expect("lint agent");
        assert_eq!(lint.command, "npx");
        assert_eq!(lint.args, vec!["eslint", "--format", "unix"]);
        assert_eq!(lint.description.as_deref(), Some("ESLint"));
    }

    #[test]
    fn regression_parse_agents_config_rejects_unknown_fields() {
        let error = parse_agents_config("[agents.lint]\ncommand = \"x\"\nshell = true\n")
            .expect_err("unknown field");
        assert!(format!("{error:#}").contains("shell"));
    }

    #[test]
    fn functional_build_agent_registry_keeps_builtins() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("agents.toml");
        std::fs::write(&path, "[agents.typecheck]\ncommand = \"tsc\"\n").expect("write");
        let config = load_agents_config(&path).expect("load");
        let registry = build_agent_registry(&config).expect("registry");
        assert_eq!(registry.names(), vec!["echo", "typecheck"]);
        assert_eq!(
            registry.get("typecheck").expect("agent").description(),
            "Runs `tsc`."
        );
    }

    #[test]
    fn regression_build_agent_registry_rejects_shadowing_builtin() {
        let config = parse_agents_config("[agents.echo]\ncommand = \"echo\"\n").expect("config");
        assert!(build_agent_registry(&config).is_err());
    }

    #[tokio::test]
    async fn integration_command_agent_exports_context_and_user_args() {
        let agent = shell_agent(
            "printf '%s|%s|%s|%s' \"$AGENTWATCH_FILE_PATH\" \"$AGENTWATCH_TRIGGER\" \"$AGENTWATCH_COMMENT_ID\" \"$1\"",
        );
        let output = agent
            .run(&context("'quoted arg' second"))
            .await
            .expect("agent output");
        assert_eq!(output, "src/a.js|manual|99|quoted arg");
    }

    #[tokio::test]
    async fn regression_command_agent_reports_non_zero_exit() {
        let agent = shell_agent("echo boom >&2; exit 3");
        let error = agent.run(&context("")).await.expect_err("failure");
        match error {
            AgentError::Execution(message) => {
                assert!(message.contains("exited with code 3"), "{message}");
                assert!(message.contains("boom"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn regression_command_agent_rejects_unbalanced_quotes() {
        let agent = shell_agent("true");
        let error = agent.run(&context("'unterminated")).await.expect_err("args");
        assert!(matches!(error, AgentError::InvalidArguments(_)));
    }
}
