use regex::Regex;
use serde_json::json;
use slackline::{
    Ack, App, Args, BoxError, Constraints, ErrorCode, Listener, ReceiverEvent,
    middleware::{ConversationUpdater, MemoryStore, direct_mention},
    testing::CountingHandler,
};

mod common;
use common::{Capture, block_action, command, event, message, options};

async fn deliver(app: &App, body: serde_json::Value) {
    app.process_event(ReceiverEvent::new(body, Ack::noop()))
        .await
        .unwrap();
}

// ============================================================================
// Registration validation
// ============================================================================

#[tokio::test]
async fn test_message_subtype_event_names_are_rejected() {
    let mut app = App::new(options()).unwrap();
    let err = app
        .event("message.channels", CountingHandler::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AppInitialization);
    assert_eq!(app.listener_count(), 0);
}

#[tokio::test]
async fn test_constraints_outside_the_listener_kind_are_not_attached() {
    let mut app = App::new(options()).unwrap();
    app.shortcut(Constraints::new().block_id("b"), CountingHandler::new())
        .view(Constraints::new().with_type("block_actions"), CountingHandler::new())
        .options(Constraints::new().block_id("b"), CountingHandler::new());
    assert_eq!(app.listener_count(), 0);

    app.view(
        Constraints::new().with_type("view_closed").callback_id("survey"),
        CountingHandler::new(),
    );
    assert_eq!(app.listener_count(), 1);
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_actions_route_on_block_id() {
    let matching = CountingHandler::new();
    let other = CountingHandler::new();
    let mut app = App::new(options()).unwrap();
    app.action(Constraints::new().block_id("approval"), matching.clone())
        .action(Constraints::new().block_id("feedback"), other.clone());

    deliver(&app, block_action("approval", "approve")).await;
    deliver(&app, block_action("approval", "reject")).await;

    assert_eq!(matching.count(), 2);
    assert_eq!(other.count(), 0);
}

#[tokio::test]
async fn test_action_patterns_publish_captures() {
    let capture = Capture::new();
    let mut app = App::new(options()).unwrap();
    app.action(Regex::new(r"^ticket_(\d+)$").unwrap(), capture.clone());

    deliver(&app, block_action("tickets", "ticket_42")).await;
    deliver(&app, block_action("tickets", "close")).await;

    let seen = capture.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].context().get("action_id_matches"),
        Some(json!(["ticket_42", "42"]))
    );
}

#[tokio::test]
async fn test_message_patterns_publish_matches() {
    let capture = Capture::new();
    let mut app = App::new(options()).unwrap();
    app.message(Regex::new(r"deploy (\w+)").unwrap(), capture.clone());

    deliver(&app, message("please deploy staging now", "U1")).await;
    deliver(&app, message("nothing to see", "U1")).await;

    let seen = capture.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].context().get("matches"),
        Some(json!(["deploy staging", "staging"]))
    );
}

#[tokio::test]
async fn test_kinds_do_not_leak_between_listeners() {
    let commands = CountingHandler::new();
    let events = CountingHandler::new();
    let messages = CountingHandler::new();
    let mut app = App::new(options()).unwrap();
    app.command("/deploy", commands.clone())
        .any_message(messages.clone())
        .event("app_mention", events.clone())
        .unwrap();

    deliver(&app, command("/deploy")).await;
    deliver(&app, command("/rollback")).await;
    deliver(&app, event("app_mention")).await;
    deliver(&app, message("hi", "U1")).await;

    assert_eq!(commands.count(), 1);
    assert_eq!(events.count(), 1);
    assert_eq!(messages.count(), 1);
}

#[tokio::test]
async fn test_view_ids_select_submissions() {
    let submissions = CountingHandler::new();
    let mut app = App::new(options()).unwrap();
    app.view("survey", submissions.clone());

    let view = |kind: &str| {
        json!({
            "type": kind,
            "team": {"id": "T1"},
            "user": {"id": "U1"},
            "view": {"callback_id": "survey"}
        })
    };
    deliver(&app, view("view_submission")).await;
    deliver(&app, view("view_closed")).await;

    assert_eq!(submissions.count(), 1);
}

// ============================================================================
// Built-in middleware
// ============================================================================

#[tokio::test]
async fn test_events_from_the_app_itself_are_ignored() {
    let handler = CountingHandler::new();
    let mut app = App::new(options()).unwrap();
    app.any_message(handler.clone());

    deliver(&app, message("echo", "USELF")).await;
    deliver(&app, message("hello", "U1")).await;

    assert_eq!(handler.count(), 1);
}

#[tokio::test]
async fn test_ignore_self_can_be_disabled() {
    let handler = CountingHandler::new();
    let mut app = App::new(options().with_ignore_self(false)).unwrap();
    app.any_message(handler.clone());

    deliver(&app, message("echo", "USELF")).await;

    assert_eq!(handler.count(), 1);
}

#[tokio::test]
async fn test_direct_mentions_as_listener_middleware() {
    let handler = CountingHandler::new();
    let mut app = App::new(options()).unwrap();
    app.any_message(Listener::new(handler.clone()).with(direct_mention()));

    deliver(&app, message("<@USELF> status please", "U1")).await;
    deliver(&app, message("<@USELF|bot> status please", "U1")).await;
    deliver(&app, message("status please <@USELF>", "U1")).await;

    assert_eq!(handler.count(), 2);
}

#[tokio::test]
async fn test_conversation_state_round_trips_through_the_store() {
    let store = MemoryStore::new();
    let capture = Capture::new();
    let mut app = App::new(options().with_conversation_store(store.clone())).unwrap();
    app.message("remember", |args: Args| async move {
        if let Some(updater) = args.context().extension::<ConversationUpdater>() {
            updater.update(json!({"step": 2}), None).await?;
        }
        Ok::<(), BoxError>(())
    });
    app.message("recall", capture.clone());

    deliver(&app, message("recall", "U1")).await;
    deliver(&app, message("remember", "U1")).await;
    deliver(&app, message("recall", "U1")).await;

    let seen = capture.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].context().get("conversation"), None);
    assert_eq!(seen[1].context().get("conversation"), Some(json!({"step": 2})));
    assert_eq!(store.len(), 1);
}
