use std::time::Duration;

use agentwatch_core::{CommentKind, HistoryComment};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::platform::{
    ChangedFile, PullRequestPlatform, PullRequestState, PullRequestSummary, RepoRef,
};

const GITHUB_PAGE_SIZE: usize = 100;
const GITHUB_ERROR_BODY_MAX_CHARS: usize = 800;
const GHOST_LOGIN: &str = "ghost";

#[derive(Debug, Clone, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPullRequest {
    number: u64,
    state: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubIssueComment {
    id: u64,
    body: Option<String>,
    created_at: DateTime<Utc>,
    user: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubReviewComment {
    id: u64,
    body: Option<String>,
    path: Option<String>,
    created_at: DateTime<Utc>,
    user: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPullRequestFile {
    filename: String,
    status: String,
}

fn login_or_ghost(user: Option<GithubUser>) -> String {
    user.map(|user| user.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

fn truncate_for_error(text: &str, max_chars: usize) -> String {
    agentwatch_core::watch_comment::truncate_for_comment(text, max_chars)
}

#[derive(Clone)]
/// GitHub REST v3 implementation of [`PullRequestPlatform`].
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubApiClient {
    pub fn new(api_base: String, token: String, repo: RepoRef, request_timeout_ms: u64) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("agentwatch"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, suffix
        )
    }

    async fn list_paginated<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        let per_page = GITHUB_PAGE_SIZE.to_string();
        loop {
            let page_value = page.to_string();
            let request = self.http.get(&url).query(query).query(&[
                ("per_page", per_page.as_str()),
                ("page", page_value.as_str()),
            ]);
            let chunk: Vec<T> = self.request_json(operation, request).await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < GITHUB_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .with_context(|| format!("failed to decode github {operation}"));
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, GITHUB_ERROR_BODY_MAX_CHARS)
        );
    }

    async fn request_status(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
        accept_not_found: bool,
    ) -> Result<()> {
        let response = request
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        if status.is_success() || (accept_not_found && status == reqwest::StatusCode::NOT_FOUND) {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        bail!(
            "github api {operation} failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(&body, GITHUB_ERROR_BODY_MAX_CHARS)
        );
    }
}

#[async_trait]
impl PullRequestPlatform for GithubApiClient {
    async fn list_pull_requests(
        &self,
        state: PullRequestState,
    ) -> Result<Vec<PullRequestSummary>> {
        let rows: Vec<GithubPullRequest> = self
            .list_paginated(
                "list pull requests",
                self.repo_url("pulls"),
                &[
                    ("state", state.as_str()),
                    ("sort", "created"),
                    ("direction", "asc"),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| PullRequestSummary {
                number: row.number,
                state: row.state,
            })
            .collect())
    }

    async fn list_issue_comments(&self, number: u64) -> Result<Vec<HistoryComment>> {
        let rows: Vec<GithubIssueComment> = self
            .list_paginated(
                "list issue comments",
                self.repo_url(&format!("issues/{number}/comments")),
                &[],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| HistoryComment {
                id: row.id,
                pr_number: number,
                author: login_or_ghost(row.user),
                created_at: row.created_at,
                body: row.body.unwrap_or_default(),
                path: None,
                kind: CommentKind::Issue,
            })
            .collect())
    }

    async fn list_review_comments(&self, number: u64) -> Result<Vec<HistoryComment>> {
        let rows: Vec<GithubReviewComment> = self
            .list_paginated(
                "list review comments",
                self.repo_url(&format!("pulls/{number}/comments")),
                &[("sort", "created"), ("direction", "asc")],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| HistoryComment {
                id: row.id,
                pr_number: number,
                author: login_or_ghost(row.user),
                created_at: row.created_at,
                body: row.body.unwrap_or_default(),
                path: row.path,
                kind: CommentKind::Review,
            })
            .collect())
    }

    async fn list_changed_files(&self, number: u64) -> Result<Vec<ChangedFile>> {
        let rows: Vec<GithubPullRequestFile> = self
            .list_paginated(
                "list pull request files",
                self.repo_url(&format!("pulls/{number}/files")),
                &[],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| ChangedFile {
                path: row.filename,
                status: row.status,
            })
            .collect())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        let payload = json!({ "labels": [label] });
        let request = self
            .http
            .post(self.repo_url(&format!("issues/{number}/labels")))
            .json(&payload);
        self.request_status("add label", request, false).await
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        let mut url = reqwest::Url::parse(&self.repo_url(&format!("issues/{number}/labels")))
            .context("invalid github label url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("github api base cannot carry path segments"))?
            .push(label);
        let request = self.http.delete(url);
        self.request_status("remove label", request, true).await
    }

    async fn reply_to_review_comment(
        &self,
        number: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<()> {
        let payload = json!({ "body": body });
        let request = self
            .http
            .post(self.repo_url(&format!("pulls/{number}/comments/{comment_id}/replies")))
            .json(&payload);
        self.request_status("reply to review comment", request, false)
            .await
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        let payload = json!({ "body": body });
        let request = self
            .http
            .post(self.repo_url(&format!("issues/{number}/comments")))
            .json(&payload);
        self.request_status("create issue comment", request, false)
            .await
    }
}
