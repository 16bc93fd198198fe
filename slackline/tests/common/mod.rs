#![allow(dead_code)]

use serde_json::{Value, json};
use slackline::{
    App, AppOptions, Args, BoxError, ClientFactory, SharedClient, testing::RecordingClient,
};
use std::sync::{Arc, Mutex, Once, PoisonError};

/// Routes test logs through the libtest capture.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

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

pub fn event(event_type: &str) -> Value {
    json!({
        "type": "event_callback",
        "team_id": "T1",
        "event": {"type": event_type, "user": "U1", "channel": "C1"}
    })
}

pub fn command(name: &str) -> Value {
    json!({
        "command": name,
        "text": "",
        "team_id": "T1",
        "user_id": "U1",
        "channel_id": "C1"
    })
}

pub fn block_action(block_id: &str, action_id: &str) -> Value {
    json!({
        "type": "block_actions",
        "team": {"id": "T1"},
        "user": {"id": "U1"},
        "channel": {"id": "C1"},
        "actions": [{"block_id": block_id, "action_id": action_id}]
    })
}

// ============================================================================
// Apps
// ============================================================================

/// Single-workspace options with a known bot identity and no network.
pub fn options() -> AppOptions {
    AppOptions::new()
        .with_token("xoxb-test")
        .with_token_verification(false)
        .with_bot_id("BSELF")
        .with_bot_user_id("USELF")
}

/// An app whose clients all record into `client`.
pub fn recording_app(client: &RecordingClient) -> App {
    App::new(options().with_client_factory(SharedClientFactory(client.clone()))).unwrap()
}

// ============================================================================
// Client Factories
// ============================================================================

/// Hands out clones of one recording client.
pub struct SharedClientFactory(pub RecordingClient);

impl ClientFactory for SharedClientFactory {
    fn create(&self, _token: Option<&str>, _team_id: Option<&str>) -> SharedClient {
        Arc::new(self.0.clone())
    }
}

/// Creates a fresh client per call and remembers what it was asked for.
#[derive(Clone, Default)]
pub struct CountingClientFactory {
    created: Arc<Mutex<Vec<(Option<String>, Option<String>)>>>,
}

impl CountingClientFactory {
    pub fn created(&self) -> Vec<(Option<String>, Option<String>)> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientFactory for CountingClientFactory {
    fn create(&self, token: Option<&str>, team_id: Option<&str>) -> SharedClient {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token.map(str::to_owned), team_id.map(str::to_owned)));
        match token {
            Some(token) => Arc::new(RecordingClient::with_token(token)),
            None => Arc::new(RecordingClient::new()),
        }
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// A listener that stores the `Args` it was called with.
#[derive(Clone, Default)]
pub struct Capture {
    seen: Arc<Mutex<Vec<Args>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<Args> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl slackline::Handler for Capture {
    async fn call(&self, args: Args) -> Result<(), BoxError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args);
        Ok(())
    }
}
