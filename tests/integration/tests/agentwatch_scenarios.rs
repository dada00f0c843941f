use std::sync::Arc;

use agentwatch_core::{parse_watch_command, CommentKind, WatchCommand};
use agentwatch_runtime::in_memory_platform::InMemoryPlatform;
use agentwatch_runtime::webhook_event::CommentEvent;
use agentwatch_runtime::{
    Agent, AgentContext, AgentError, AgentRegistry, EventRouter, EventRouterConfig, InboundEvent,
    MarkerLabels, PullRequestPlatform,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

const BOT: &str = "github-actions[bot]";

struct RejectingAgent;

#[async_trait]
impl Agent for RejectingAgent {
    fn description(&self) -> &str {
        "rejects every file"
    }

    async fn run(&self, context: &AgentContext) -> Result<String, AgentError> {
        Err(AgentError::Execution(format!(
            "{} is not allowed",
            context.file_path.as_deref().unwrap_or("-")
        )))
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_767_225_600 + seconds, 0)
        .single()
        .expect("timestamp")
}

fn router(platform: &Arc<InMemoryPlatform>) -> EventRouter {
    let mut registry = AgentRegistry::with_builtin_agents();
    registry
        .register("reject", Arc::new(RejectingAgent))
        .expect("register");
    let platform: Arc<dyn PullRequestPlatform> = platform.clone();
    EventRouter::new(EventRouterConfig {
        platform,
        registry,
        labels: MarkerLabels::default(),
        repo_slug: "owner/repo".to_string(),
        bot_login: Some(BOT.to_string()),
    })
}

fn comment_event(
    platform: &InMemoryPlatform,
    number: u64,
    author: &str,
    seconds: i64,
    body: &str,
) -> InboundEvent {
    let id = platform.add_comment(number, author, at(seconds), body, None);
    InboundEvent::CommentCreated(CommentEvent {
        comment_id: id,
        number,
        on_pull_request: true,
        author: author.to_string(),
        body: body.to_string(),
        created_at: at(seconds),
        path: None,
        review_id: None,
        in_reply_to: None,
        kind: CommentKind::Issue,
    })
}

#[tokio::test]
async fn integration_synchronize_runs_exactly_the_matching_invocation() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_pull_request(1, true, &["a.js", "b.py"]);
    platform.add_comment(1, "alice", at(10), "watch *.js echo", None);

    let report = router(&platform)
        .handle_event(InboundEvent::PullRequestSynchronized {
            number: 1,
            labels: Vec::new(),
        })
        .await
        .expect("report");

    assert_eq!(report.invocations_attempted, 1);
    assert_eq!(report.invocations_succeeded, 1);
    let posted = platform.posted_comments();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].body.contains("echo: repo=owner/repo pr=#1 trigger=file_change file=a.js"));
    assert!(!posted[0].body.contains("b.py"));
}

#[tokio::test]
async fn integration_exclusion_blocks_bootstrap_of_new_pull_request() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_pull_request(1, false, &["a.js"]);
    platform.add_comment(1, "alice", at(10), "watch *.js echo", None);
    platform.add_comment(1, "alice", at(20), "unwatch echo *.js", None);
    platform.add_pull_request(2, true, &["a.js"]);

    let report = router(&platform)
        .handle_event(InboundEvent::PullRequestOpened { number: 2 })
        .await
        .expect("report");

    assert_eq!(report.invocations_attempted, 0);
    assert!(platform.posted_comments().is_empty());
    assert!(platform.label_log().is_empty());
}

#[tokio::test]
async fn integration_exclusion_survives_rebinding_in_later_pull_request() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_pull_request(1, false, &[]);
    platform.add_comment(1, "alice", at(10), "unwatch echo *.test.js", None);
    platform.add_pull_request(2, false, &[]);
    platform.add_comment(2, "bob", at(20), "watch *.js echo", None);
    platform.add_pull_request(3, true, &["a.js", "a.test.js"]);

    let report = router(&platform)
        .handle_event(InboundEvent::PullRequestOpened { number: 3 })
        .await
        .expect("report");

    assert_eq!(report.invocations_attempted, 1);
    let summary = &platform.posted_comments()[0].body;
    assert!(summary.contains("| `a.js` | `echo` | `*.js` | succeeded |"), "{summary}");
    assert!(!summary.contains("a.test.js"), "{summary}");
}

#[tokio::test]
async fn integration_global_clear_then_new_watch_applies() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_pull_request(1, false, &[]);
    platform.add_comment(1, "alice", at(10), "watch *.js echo", None);
    platform.add_comment(1, "alice", at(11), "watch *.py echo", None);
    platform.add_comment(1, "alice", at(12), "unwatch * *", None);
    platform.add_comment(1, "alice", at(13), "watch *.md echo", None);
    platform.add_pull_request(2, true, &["a.js", "b.py", "c.md"]);

    let report = router(&platform)
        .handle_event(InboundEvent::PullRequestOpened { number: 2 })
        .await
        .expect("report");

    assert_eq!(report.invocations_attempted, 1);
    assert!(platform.posted_comments()[0].body.contains("`c.md`"));
}

#[tokio::test]
async fn integration_watch_command_with_agent_args_round_trips_through_replay() {
    let parsed = parse_watch_command("watch src/**/*.ts typecheck @ --strict")
        .expect("command")
        .expect("valid");
    assert_eq!(
        parsed,
        WatchCommand::Watch {
            pattern: "src/**/*.ts".to_string(),
            agent: "typecheck".to_string(),
            args: "--strict".to_string(),
        }
    );

    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_pull_request(1, true, &[]);
    platform.add_comment(1, "alice", at(10), "watch src/**/*.ts typecheck @ --strict", None);
    let list = comment_event(&platform, 1, "bob", 20, "list");
    router(&platform).handle_event(list).await.expect("report");
    let body = &platform.posted_comments()[0].body;
    assert!(body.contains("| `src/**/*.ts` | `typecheck` | `--strict` | #1 | @alice |"), "{body}");
}

#[tokio::test]
async fn integration_label_invariant_across_mixed_outcomes() {
    for (agent, expect_success) in [("echo", true), ("reject", false), ("unknown", false)] {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_pull_request(1, true, &["a.js"]);
        platform.add_comment(1, "alice", at(10), &format!("watch *.js {agent}"), None);
        let report = router(&platform)
            .handle_event(InboundEvent::PullRequestSynchronized {
                number: 1,
                labels: Vec::new(),
            })
            .await
            .expect("report");
        assert_eq!(report.invocations_attempted, 1, "{agent}");
        let labels = platform.labels(1);
        assert!(!labels.contains("running"), "{agent}: {labels:?}");
        let seen = labels.contains(&format!("seen:{agent}"));
        let failed = labels.contains("failed");
        assert!(seen ^ failed, "{agent}: {labels:?}");
        assert_eq!(seen, expect_success, "{agent}");
    }
}

#[tokio::test]
async fn integration_bot_replies_never_feed_back_into_replay() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.add_pull_request(1, true, &["a.js"]);
    let watch = comment_event(&platform, 1, "alice", 10, "watch *.js echo");
    router(&platform).handle_event(watch).await.expect("report");
    for posted in platform.posted_comments() {
        platform.add_comment(1, BOT, at(11), &posted.body, None);
    }
    platform.add_comment(1, "mallory", at(12), "watch *.js reject\n\n<!-- agentwatch:result -->", None);

    let list = comment_event(&platform, 1, "bob", 20, "list");
    router(&platform).handle_event(list).await.expect("report");
    let reply = platform.posted_comments().last().cloned().expect("list reply");
    assert!(reply.body.contains("AgentWatch active watches: 1"), "{}", reply.body);
    assert!(!reply.body.contains("reject"), "{}", reply.body);
}
