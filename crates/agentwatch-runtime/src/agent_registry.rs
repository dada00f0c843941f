//! Static agent registry and the agent execution contract.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use agentwatch_core::{Invocation, InvocationTrigger};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Everything an agent learns about the invocation it serves.
pub struct AgentContext {
    pub file_path: Option<String>,
    pub pr_number: u64,
    pub comment_id: Option<u64>,
    pub agent: String,
    pub args: String,
    pub repo: String,
    pub trigger: InvocationTrigger,
}

impl AgentContext {
    pub fn from_invocation(invocation: &Invocation, repo: &str) -> Self {
        Self {
            file_path: invocation.file_path.clone(),
            pr_number: invocation.pr_number,
            comment_id: invocation.comment_id,
            agent: invocation.agent.clone(),
            args: invocation.args.clone(),
            repo: repo.to_string(),
            trigger: invocation.trigger,
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates supported `AgentError` values.
pub enum AgentError {
    #[error("agent `{0}` is not registered")]
    NotRegistered(String),
    #[error("invalid agent arguments: {0}")]
    InvalidArguments(String),
    #[error("agent execution failed: {0}")]
    Execution(String),
    #[error("agent panicked: {0}")]
    Panicked(String),
    #[error("agent i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
/// Trait contract for `Agent` behavior.
pub trait Agent: Send + Sync {
    fn description(&self) -> &str;

    async fn run(&self, context: &AgentContext) -> Result<String, AgentError>;
}

/// Built-in agent that reports the context it was invoked with.
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    fn description(&self) -> &str {
        "Echoes the invocation context back."
    }

    async fn run(&self, context: &AgentContext) -> Result<String, AgentError> {
        let mut line = format!(
            "echo: repo={} pr=#{} trigger={}",
            context.repo, context.pr_number, context.trigger
        );
        if let Some(path) = &context.file_path {
            line.push_str(&format!(" file={path}"));
        }
        if !context.args.is_empty() {
            line.push_str(&format!(" args={}", context.args));
        }
        Ok(line)
    }
}

#[derive(Clone, Default)]
/// Name → agent mapping populated once at startup.
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_agents() -> Self {
        let mut registry = Self::new();
        registry.agents.insert("echo".to_string(), Arc::new(EchoAgent));
        registry
    }

    pub fn register(&mut self, name: &str, agent: Arc<dyn Agent>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) || name == "*" {
            bail!("invalid agent name '{name}'");
        }
        if self.agents.contains_key(name) {
            bail!("agent '{name}' is already registered");
        }
        self.agents.insert(name.to_string(), agent);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}
