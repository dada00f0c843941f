//! In-process [`PullRequestPlatform`] fixture for runtime and integration tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use agentwatch_core::{CommentKind, HistoryComment};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::platform::{ChangedFile, PullRequestPlatform, PullRequestState, PullRequestSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A comment written through the platform.
pub struct PostedComment {
    pub number: u64,
    pub in_reply_to: Option<u64>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `LabelOperation` values.
pub enum LabelOperation {
    Add { number: u64, label: String },
    Remove { number: u64, label: String },
}

#[derive(Debug, Clone, Default)]
struct PullRequestFixture {
    open: bool,
    comments: Vec<HistoryComment>,
    files: Vec<ChangedFile>,
    labels: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct PlatformState {
    pull_requests: BTreeMap<u64, PullRequestFixture>,
    posted: Vec<PostedComment>,
    label_log: Vec<LabelOperation>,
    unreadable: HashSet<u64>,
    fail_writes: bool,
    next_comment_id: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_pull_request(&self, number: u64, open: bool, files: &[&str]) {
        let mut state = self.lock();
        let fixture = state.pull_requests.entry(number).or_default();
        fixture.open = open;
        fixture.files = files
            .iter()
            .map(|path| ChangedFile {
                path: path.to_string(),
                status: "modified".to_string(),
            })
            .collect();
    }

    pub fn set_files(&self, number: u64, files: Vec<ChangedFile>) {
        self.lock().pull_requests.entry(number).or_default().files = files;
    }

    /// Adds a comment and returns its id. Ids double as creation order.
    pub fn add_comment(
        &self,
        number: u64,
        author: &str,
        created_at: DateTime<Utc>,
        body: &str,
        path: Option<&str>,
    ) -> u64 {
        let mut state = self.lock();
        state.next_comment_id += 1;
        let id = state.next_comment_id;
        let kind = if path.is_some() {
            CommentKind::Review
        } else {
            CommentKind::Issue
        };
        state
            .pull_requests
            .entry(number)
            .or_default()
            .comments
            .push(HistoryComment {
                id,
                pr_number: number,
                author: author.to_string(),
                created_at,
                body: body.to_string(),
                path: path.map(str::to_string),
                kind,
            });
        id
    }

    pub fn set_labels(&self, number: u64, labels: &[&str]) {
        self.lock().pull_requests.entry(number).or_default().labels =
            labels.iter().map(|label| label.to_string()).collect();
    }

    pub fn mark_unreadable(&self, number: u64) {
        self.lock().unreadable.insert(number);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn labels(&self, number: u64) -> BTreeSet<String> {
        self.lock()
            .pull_requests
            .get(&number)
            .map(|fixture| fixture.labels.clone())
            .unwrap_or_default()
    }

    pub fn posted_comments(&self) -> Vec<PostedComment> {
        self.lock().posted.clone()
    }

    pub fn label_log(&self) -> Vec<LabelOperation> {
        self.lock().label_log.clone()
    }

    fn comments_of_kind(&self, number: u64, kind: CommentKind) -> Result<Vec<HistoryComment>> {
        let state = self.lock();
        if state.unreadable.contains(&number) {
            bail!("pull request #{number} is not accessible");
        }
        Ok(state
            .pull_requests
            .get(&number)
            .map(|fixture| {
                fixture
                    .comments
                    .iter()
                    .filter(|comment| comment.kind == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn ensure_writable(state: &PlatformState) -> Result<()> {
        if state.fail_writes {
            bail!("platform writes are unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl PullRequestPlatform for InMemoryPlatform {
    async fn list_pull_requests(
        &self,
        state: PullRequestState,
    ) -> Result<Vec<PullRequestSummary>> {
        Ok(self
            .lock()
            .pull_requests
            .iter()
            .filter(|(_, fixture)| match state {
                PullRequestState::Open => fixture.open,
                PullRequestState::Closed => !fixture.open,
                PullRequestState::All => true,
            })
            .map(|(number, fixture)| PullRequestSummary {
                number: *number,
                state: if fixture.open { "open" } else { "closed" }.to_string(),
            })
            .collect())
    }

    async fn list_issue_comments(&self, number: u64) -> Result<Vec<HistoryComment>> {
        self.comments_of_kind(number, CommentKind::Issue)
    }

    async fn list_review_comments(&self, number: u64) -> Result<Vec<HistoryComment>> {
        self.comments_of_kind(number, CommentKind::Review)
    }

    async fn list_changed_files(&self, number: u64) -> Result<Vec<ChangedFile>> {
        match self.lock().pull_requests.get(&number) {
            Some(fixture) => Ok(fixture.files.clone()),
            None => bail!("pull request #{number} not found"),
        }
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        let mut state = self.lock();
        Self::ensure_writable(&state)?;
        state.label_log.push(LabelOperation::Add {
            number,
            label: label.to_string(),
        });
        state
            .pull_requests
            .entry(number)
            .or_default()
            .labels
            .insert(label.to_string());
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        let mut state = self.lock();
        Self::ensure_writable(&state)?;
        state.label_log.push(LabelOperation::Remove {
            number,
            label: label.to_string(),
        });
        if let Some(fixture) = state.pull_requests.get_mut(&number) {
            fixture.labels.remove(label);
        }
        Ok(())
    }

    async fn reply_to_review_comment(
        &self,
        number: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::ensure_writable(&state)?;
        state.posted.push(PostedComment {
            number,
            in_reply_to: Some(comment_id),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        let mut state = self.lock();
        Self::ensure_writable(&state)?;
        state.posted.push(PostedComment {
            number,
            in_reply_to: None,
            body: body.to_string(),
        });
        Ok(())
    }
}
