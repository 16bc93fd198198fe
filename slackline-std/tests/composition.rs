use serde_json::json;
use slackline_std::{
    conversation::{ConversationUpdater, MemoryStore, conversation_context},
    filters::{only_actions, only_events},
    logging::LogEvents,
    matchers::{match_constraints, match_event_type, match_message},
    message::ignore_self,
    slackline_core::{
        Args, BoxError, Chain, Constraints, ConversationStore, Listener, boxed, process, terminal,
    },
    testing::{CountingHandler, RecordingMiddleware, args_with_context},
};
use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

mod common;
use common::{block_action, bot_context, message};

#[tokio::test]
async fn test_message_listener_composition() {
    let handler = CountingHandler::new();
    let listener = Listener::new(handler.clone())
        .with(only_events())
        .with(match_event_type("message"))
        .with(match_message("deploy"))
        .seal();
    let global: Chain = vec![boxed(LogEvents), boxed(ignore_self())].into();

    let bodies = [
        message("please deploy", "U_HUMAN"),
        message("please deploy", "U_BOT"),
        message("status?", "U_HUMAN"),
        block_action("b", "deploy"),
    ];
    for body in bodies {
        process(
            Arc::clone(&global),
            args_with_context(body, bot_context()),
            Some(terminal(listener.clone())),
        )
        .await
        .unwrap();
    }

    assert_eq!(handler.count(), 1);
}

#[tokio::test]
async fn test_action_listener_sees_conversation_state() {
    let store = MemoryStore::new();
    let recorder = RecordingMiddleware::new();
    let listener = Listener::new(|args: Args| async move {
        let updater = args
            .context()
            .extension::<ConversationUpdater>()
            .ok_or("conversation updater missing")?;
        let step = args
            .context()
            .get("conversation")
            .and_then(|state| state["step"].as_u64())
            .unwrap_or(0);
        updater.update(json!({"step": step + 1}), None).await?;
        Ok::<(), BoxError>(())
    })
    .with(conversation_context(store.clone()))
    .with(only_actions())
    .with(match_constraints(Constraints::new().action_id("approve")))
    .with(recorder.clone())
    .seal();

    for _ in 0..3 {
        listener
            .run(args_with_context(block_action("b", "approve"), bot_context()))
            .await
            .unwrap();
    }
    listener
        .run(args_with_context(block_action("b", "reject"), bot_context()))
        .await
        .unwrap();

    assert_eq!(recorder.count(), 3);
    assert_eq!(recorder.payloads()[0], json!({"block_id": "b", "action_id": "approve"}));
    assert_eq!(
        store.get("C1").await.unwrap(),
        json!({"step": 3})
    );
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_log_events_records_each_event_and_continues() {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let handler = CountingHandler::new();
    let global: Chain = vec![boxed(LogEvents)].into();
    process(
        global,
        args_with_context(message("hello", "U_HUMAN"), bot_context()),
        Some(terminal(Listener::new(handler.clone()).seal())),
    )
    .await
    .unwrap();

    assert_eq!(handler.count(), 1);
    let logs = buffer.contents();
    assert!(logs.contains("processing event"), "{logs}");
    assert!(logs.contains("kind=event"), "{logs}");
    assert!(logs.contains("C1"), "{logs}");
}
