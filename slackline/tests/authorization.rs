use serde_json::{Value, json};
use slackline::{
    Ack, App, AppOptions, AuthorizeResult, AuthorizeSourceData, BoxError, ClientOptions, Error,
    ErrorCode, ErrorHandlerArgs, ReceiverEvent,
    testing::{CountingHandler, RecordingAck},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

mod common;
use common::{Capture, CountingClientFactory, command, init_tracing, message};

/// Authorizes every workspace with a bot token derived from its team id.
fn per_team(calls: Arc<AtomicUsize>) -> AppOptions {
    AppOptions::new().with_authorize(move |source: AuthorizeSourceData, _body: Value| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let team = source.team_id.unwrap_or_default();
            Ok::<_, BoxError>(AuthorizeResult::bot(format!("xoxb-{team}")).with_team_id(team))
        }
    })
}

fn message_in(team_id: &str) -> Value {
    let mut body = message("hello", "U1");
    body["team_id"] = json!(team_id);
    body
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_token_and_authorize_are_mutually_exclusive() {
    let both = per_team(Arc::new(AtomicUsize::new(0))).with_token("xoxb-1");
    assert_eq!(App::new(both).unwrap_err().code(), ErrorCode::AppInitialization);

    let neither = AppOptions::new();
    assert_eq!(App::new(neither).unwrap_err().code(), ErrorCode::AppInitialization);
}

// ============================================================================
// Resolution
// ============================================================================

#[tokio::test]
async fn test_failed_authorization_reaches_the_error_handler_only() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = CountingHandler::new();
    let options = AppOptions::new().with_authorize(|_source: AuthorizeSourceData, _body: Value| async {
        Err::<AuthorizeResult, BoxError>("no installation for this workspace".into())
    });
    let mut app = App::new(options).unwrap();
    app.command("/deploy", listener.clone())
        .extended_error(move |args: ErrorHandlerArgs| {
            let sink = Arc::clone(&sink);
            async move {
                let install = args.context.as_ref().map(|context| {
                    (
                        context.team_id().map(str::to_owned),
                        context.is_enterprise_install(),
                        context.bot_token().is_none(),
                    )
                });
                sink.lock().unwrap().push((args.error.code(), install));
                Ok::<(), Error>(())
            }
        });

    let mut body = command("/deploy");
    body["is_enterprise_install"] = json!("true");
    app.process_event(ReceiverEvent::new(body, Ack::noop()))
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        [(ErrorCode::Authorization, Some((Some("T1".to_owned()), true, true)))]
    );
    assert_eq!(listener.count(), 0);
}

#[tokio::test]
async fn test_token_revocation_skips_the_authorizer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let capture = Capture::new();
    let mut app = App::new(per_team(Arc::clone(&calls))).unwrap();
    app.event("tokens_revoked", capture.clone()).unwrap();

    let body = json!({
        "type": "event_callback",
        "team_id": "T9",
        "event": {"type": "tokens_revoked", "tokens": {"bot": ["U_BOT"]}}
    });
    let ack = RecordingAck::new();
    app.process_event(ReceiverEvent::new(body, ack.ack()))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ack.count(), 1);
    let seen = capture.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].context().team_id(), Some("T9"));
    assert_eq!(seen[0].context().token(), None);
}

#[tokio::test]
async fn test_clients_are_pooled_per_workspace_and_token() {
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = CountingClientFactory::default();
    let capture = Capture::new();
    let mut app =
        App::new(per_team(Arc::clone(&calls)).with_client_factory(factory.clone())).unwrap();
    app.any_message(capture.clone());

    for team in ["T1", "T1", "T2"] {
        app.process_event(ReceiverEvent::new(message_in(team), Ack::noop()))
            .await
            .unwrap();
    }

    let seen = capture.seen();
    assert_eq!(seen.len(), 3);
    assert!(Arc::ptr_eq(seen[0].client(), seen[1].client()));
    assert!(!Arc::ptr_eq(seen[0].client(), seen[2].client()));
    assert_eq!(seen[2].client().token(), Some("xoxb-T2"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(app.clients().tenant_count(), 2);
    assert_eq!(
        factory.created(),
        [
            (None, None),
            (Some("xoxb-T1".to_owned()), Some("T1".to_owned())),
            (Some("xoxb-T2".to_owned()), Some("T2".to_owned())),
        ]
    );
}

// ============================================================================
// Single-workspace verification
// ============================================================================

#[tokio::test]
async fn test_single_workspace_token_is_verified_once() {
    use httpmock::prelude::*;

    let server = MockServer::start_async().await;
    let auth = server
        .mock_async(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200).json_body(json!({
                "ok": true,
                "user_id": "UBOT",
                "bot_id": "B1",
                "team_id": "T1"
            }));
        })
        .await;

    let handler = CountingHandler::new();
    let options = AppOptions::new()
        .with_token("xoxb-1")
        .with_client_options(ClientOptions {
            api_url: server.base_url(),
            ..ClientOptions::default()
        });
    let mut app = App::new(options).unwrap();
    app.any_message(handler.clone());

    app.process_event(ReceiverEvent::new(message("hi", "U1"), Ack::noop()))
        .await
        .unwrap();
    app.process_event(ReceiverEvent::new(message("echo", "UBOT"), Ack::noop()))
        .await
        .unwrap();

    auth.assert_calls_async(1).await;
    assert_eq!(handler.count(), 1);
}

#[tokio::test]
async fn test_failed_verification_is_an_authorization_error() {
    use httpmock::prelude::*;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200)
                .json_body(json!({"ok": false, "error": "invalid_auth"}));
        })
        .await;

    let options = AppOptions::new()
        .with_token("xoxb-revoked")
        .with_client_options(ClientOptions {
            api_url: server.base_url(),
            ..ClientOptions::default()
        });
    let mut app = App::new(options).unwrap();
    app.command("/deploy", CountingHandler::new());

    let err = app
        .process_event(ReceiverEvent::new(command("/deploy"), Ack::noop()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Authorization);
    assert!(err.to_string().contains("invalid_auth"));
}
