#![allow(dead_code)]

use serde_json::{Value, json};
use slackline_std::slackline_core::{AuthorizeResult, Context};

// ============================================================================
// Test Bodies
// ============================================================================

pub fn message(text: &str, user: &str) -> Value {
    json!({
        "type": "event_callback",
        "team_id": "T1",
        "event": {"type": "message", "text": text, "user": user, "channel": "C1"}
    })
}

pub fn block_action(block_id: &str, action_id: &str) -> Value {
    json!({
        "type": "block_actions",
        "team": {"id": "T1"},
        "channel": {"id": "C1"},
        "actions": [{"block_id": block_id, "action_id": action_id}]
    })
}

// ============================================================================
// Contexts
// ============================================================================

pub fn bot_context() -> Context {
    Context::builder(
        AuthorizeResult::bot("xoxb-test")
            .with_team_id("T1")
            .with_bot_identity("B1", "U_BOT"),
    )
    .build()
    .unwrap()
}
