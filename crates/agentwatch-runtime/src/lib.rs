//! GitHub-facing runtime for AgentWatch.
//! This crate owns the platform seam and its REST client, the agent registry,
//! history collection, the invocation runner with its label cycle, and the
//! router that turns one webhook event into replies and agent runs.

pub mod agent_registry;
pub mod command_agent;
pub mod event_router;
pub mod github_api_client;
pub mod history_fetch;
pub mod in_memory_platform;
pub mod invocation_rendering;
pub mod invocation_runner;
pub mod platform;
pub mod webhook_event;

pub use agent_registry::{Agent, AgentContext, AgentError, AgentRegistry, EchoAgent};
pub use command_agent::{build_agent_registry, load_agents_config, AgentsConfig};
pub use event_router::{EventReport, EventRouter, EventRouterConfig, ResolutionError};
pub use github_api_client::GithubApiClient;
pub use history_fetch::{replay_repository, ReplayReport};
pub use invocation_runner::{
    InvocationOutcome, InvocationRunner, InvocationStatus, MarkerLabels, ReplyTarget,
    ResultPosting,
};
pub use platform::{PullRequestPlatform, PullRequestState, RepoRef};
pub use webhook_event::{decode_webhook_event, load_webhook_event, InboundEvent};
