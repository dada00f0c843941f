//! Platform-facing half of history replay: gathers comments, then folds.

use agentwatch_core::{replay_history, HistoryComment, WatchState};
use anyhow::Result;

use crate::platform::{PullRequestPlatform, PullRequestState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Replayed state plus bookkeeping about what could be read.
pub struct ReplayReport {
    pub state: WatchState,
    pub scanned_pull_requests: usize,
    pub skipped_pull_requests: Vec<u64>,
}

/// Fetches PR-level and review comments for one pull request.
pub async fn fetch_pull_request_comments(
    platform: &dyn PullRequestPlatform,
    number: u64,
) -> Result<Vec<HistoryComment>> {
    let mut comments = platform.list_issue_comments(number).await?;
    comments.extend(platform.list_review_comments(number).await?);
    Ok(comments)
}

/// Collects comment history across every pull request, open or closed.
///
/// `exclude_pr` is left out of the scan entirely. Pull requests whose comments
/// cannot be read are skipped and reported, never fatal.
pub async fn collect_repository_history(
    platform: &dyn PullRequestPlatform,
    exclude_pr: Option<u64>,
) -> (Vec<HistoryComment>, usize, Vec<u64>) {
    let pull_requests = match platform.list_pull_requests(PullRequestState::All).await {
        Ok(pull_requests) => pull_requests,
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "failed to list pull requests; replaying empty history");
            return (Vec::new(), 0, Vec::new());
        }
    };
    let mut comments = Vec::new();
    let mut scanned = 0_usize;
    let mut skipped = Vec::new();
    for pull_request in pull_requests {
        if Some(pull_request.number) == exclude_pr {
            continue;
        }
        match fetch_pull_request_comments(platform, pull_request.number).await {
            Ok(rows) => {
                scanned += 1;
                comments.extend(rows);
            }
            Err(error) => {
                tracing::warn!(
                    pr = pull_request.number,
                    error = %format!("{error:#}"),
                    "skipping pull request history"
                );
                skipped.push(pull_request.number);
            }
        }
    }
    (comments, scanned, skipped)
}

/// Replays the whole repository's command history.
pub async fn replay_repository(
    platform: &dyn PullRequestPlatform,
    exclude_pr: Option<u64>,
    bot_login: Option<&str>,
) -> ReplayReport {
    let (comments, scanned_pull_requests, skipped_pull_requests) =
        collect_repository_history(platform, exclude_pr).await;
    let state = replay_history(&comments, bot_login);
    tracing::info!(
        scanned = scanned_pull_requests,
        skipped = skipped_pull_requests.len(),
        comments = comments.len(),
        bindings = state.bindings().len(),
        "replayed repository history"
    );
    ReplayReport {
        state,
        scanned_pull_requests,
        skipped_pull_requests,
    }
}
