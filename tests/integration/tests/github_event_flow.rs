use std::sync::Arc;

use agentwatch_runtime::{
    load_webhook_event, AgentRegistry, EventRouter, EventRouterConfig, GithubApiClient,
    MarkerLabels, PullRequestPlatform, RepoRef,
};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::tempdir;

fn github_router(base_url: &str) -> EventRouter {
    let client = GithubApiClient::new(
        base_url.to_string(),
        "test-token".to_string(),
        RepoRef::parse("owner/repo").expect("repo"),
        2_000,
    )
    .expect("client");
    let platform: Arc<dyn PullRequestPlatform> = Arc::new(client);
    EventRouter::new(EventRouterConfig {
        platform,
        registry: AgentRegistry::with_builtin_agents(),
        labels: MarkerLabels::default(),
        repo_slug: "owner/repo".to_string(),
        bot_login: Some("github-actions[bot]".to_string()),
    })
}

#[tokio::test]
async fn integration_pull_request_opened_event_bootstraps_from_github_history() {
    let server = MockServer::start();
    let files = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/3/files");
        then.status(200).json_body(json!([
            {"filename": "src/a.js", "status": "added"},
            {"filename": "old.js", "status": "removed"}
        ]));
    });
    let pulls = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/owner/repo/pulls")
            .query_param("state", "all");
        then.status(200).json_body(json!([
            {"number": 1, "state": "closed"},
            {"number": 3, "state": "open"}
        ]));
    });
    let history = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/issues/1/comments");
        then.status(200).json_body(json!([{
            "id": 10,
            "body": "watch **/*.js echo",
            "user": {"login": "alice"},
            "created_at": "2026-01-01T00:00:00Z"
        }]));
    });
    let review_history = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/1/comments");
        then.status(200).json_body(json!([]));
    });
    let add_label = server.mock(|when, then| {
        when.method(POST).path("/repos/owner/repo/issues/3/labels");
        then.status(200).json_body(json!([]));
    });
    let remove_label = server.mock(|when, then| {
        when.method(DELETE)
            .path_includes("/repos/owner/repo/issues/3/labels/");
        then.status(404).json_body(json!({"message": "Label does not exist"}));
    });
    let summary = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/3/comments")
            .body_includes("existing watch invocation(s) on #3");
        then.status(201).json_body(json!({"id": 99}));
    });

    let temp = tempdir().expect("tempdir");
    let event_path = temp.path().join("event.json");
    std::fs::write(
        &event_path,
        json!({"action": "opened", "number": 3, "pull_request": {"number": 3, "labels": []}})
            .to_string(),
    )
    .expect("write event");
    let event = load_webhook_event("pull_request", &event_path).expect("event");

    let report = github_router(&server.base_url())
        .handle_event(event)
        .await
        .expect("report");

    assert_eq!(report.invocations_attempted, 1);
    assert_eq!(report.invocations_succeeded, 1);
    assert_eq!(report.comments_posted, 1);
    files.assert_calls(1);
    pulls.assert_calls(1);
    history.assert_calls(1);
    review_history.assert_calls(1);
    // running, then seen:echo
    add_label.assert_calls(2);
    // running, then the stale failed marker
    remove_label.assert_calls(2);
    summary.assert_calls(1);
}

#[tokio::test]
async fn integration_review_comment_run_replies_in_thread() {
    let server = MockServer::start();
    let _labels = server.mock(|when, then| {
        when.method(POST).path("/repos/owner/repo/issues/8/labels");
        then.status(200).json_body(json!([]));
    });
    let _unlabel = server.mock(|when, then| {
        when.method(DELETE)
            .path_includes("/repos/owner/repo/issues/8/labels/");
        then.status(200).json_body(json!([]));
    });
    let reply = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/pulls/8/comments/70/replies")
            .body_includes("file=lib/x.rs args=--verbose");
        then.status(201).json_body(json!({"id": 72}));
    });

    let temp = tempdir().expect("tempdir");
    let event_path = temp.path().join("event.json");
    std::fs::write(
        &event_path,
        json!({
            "action": "created",
            "pull_request": {"number": 8},
            "comment": {
                "id": 71,
                "body": "run echo @ --verbose",
                "user": {"login": "alice"},
                "created_at": "2026-01-01T00:00:00Z",
                "path": "lib/x.rs",
                "pull_request_review_id": 5,
                "in_reply_to_id": 70
            }
        })
        .to_string(),
    )
    .expect("write event");
    let event = load_webhook_event("pull_request_review_comment", &event_path).expect("event");

    let report = github_router(&server.base_url())
        .handle_event(event)
        .await
        .expect("report");

    assert_eq!(report.command.as_deref(), Some("run"));
    assert_eq!(report.invocations_succeeded, 1);
    reply.assert_calls(1);
}

#[tokio::test]
async fn integration_failed_history_listing_degrades_to_empty_replay() {
    let server = MockServer::start();
    let _files = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls/4/files");
        then.status(200).json_body(json!([{"filename": "a.js", "status": "modified"}]));
    });
    let pulls = server.mock(|when, then| {
        when.method(GET).path("/repos/owner/repo/pulls");
        then.status(502).body("bad gateway");
    });

    let report = github_router(&server.base_url())
        .handle_event(agentwatch_runtime::InboundEvent::PullRequestOpened { number: 4 })
        .await
        .expect("report");

    pulls.assert_calls(1);
    assert_eq!(report.invocations_attempted, 0);
    assert!(report.skipped_reason.is_some());
}
