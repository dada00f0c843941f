#![no_main]

use agentwatch_runtime::{decode_webhook_event, InboundEvent};
use libfuzzer_sys::fuzz_target;

const EVENT_NAMES: [&str; 4] = [
    "issue_comment",
    "pull_request_review_comment",
    "pull_request",
    "push",
];

fuzz_target!(|data: &[u8]| {
    let Some((selector, payload)) = data.split_first() else {
        return;
    };
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(payload) else {
        return;
    };
    let event_name = EVENT_NAMES[usize::from(*selector) % EVENT_NAMES.len()];
    if let Ok(InboundEvent::CommentCreated(comment)) = decode_webhook_event(event_name, &payload) {
        let history = comment.to_history_comment();
        assert_eq!(history.id, comment.comment_id);
        assert_eq!(history.pr_number, comment.number);
    }
});
