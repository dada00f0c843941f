//! Hosting-platform seam consumed by replay, the runner and the router.

use agentwatch_core::HistoryComment;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Repository coordinates in `owner/name` form.
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid --github-repo '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid --github-repo '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `PullRequestState` values.
pub enum PullRequestState {
    Open,
    Closed,
    All,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: String,
}

impl ChangedFile {
    pub fn is_removed(&self) -> bool {
        self.status == "removed"
    }
}

/// Paths of files that still exist after the pull request's changes.
pub fn analyzable_paths(files: &[ChangedFile]) -> Vec<String> {
    files
        .iter()
        .filter(|file| !file.is_removed())
        .map(|file| file.path.clone())
        .collect()
}

#[async_trait]
/// Trait contract for the comment/label/file storage AgentWatch runs against.
///
/// Comments are returned as replay log entries already tagged with their pull
/// request number. Label removal of an absent label must succeed.
pub trait PullRequestPlatform: Send + Sync {
    async fn list_pull_requests(&self, state: PullRequestState)
        -> Result<Vec<PullRequestSummary>>;

    async fn list_issue_comments(&self, number: u64) -> Result<Vec<HistoryComment>>;

    async fn list_review_comments(&self, number: u64) -> Result<Vec<HistoryComment>>;

    async fn list_changed_files(&self, number: u64) -> Result<Vec<ChangedFile>>;

    async fn add_label(&self, number: u64, label: &str) -> Result<()>;

    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    async fn reply_to_review_comment(&self, number: u64, comment_id: u64, body: &str)
        -> Result<()>;

    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;
}
