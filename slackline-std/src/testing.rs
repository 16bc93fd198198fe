//! Testing utilities for slackline.
//!
//! This module provides doubles for the dispatcher's collaborators so
//! middleware and listeners can be exercised without a network.
//!
//! # Features
//!
//! - [`args_for`]: Classifies a body and builds [`Args`] for it
//! - [`RecordingClient`]: An [`ApiClient`] that records every call
//! - [`RecordingAck`]: Counts acknowledgements and records their bodies
//! - [`RecordingMiddleware`]: A middleware that records payloads and continues
//! - [`CountingHandler`]: A handler that counts invocations and can fail on demand

use async_trait::async_trait;
use serde_json::{Value, json};
use slackline_core::{
    Ack, ApiClient, Args, BoxError, Context, Handler, Middleware, Next, classify,
};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Args
// ============================================================================

/// Builds arguments for a body with an empty context.
///
/// # Panics
///
/// Panics if the body cannot be classified.
pub fn args_for(body: Value) -> Args {
    args_with_context(body, Context::default())
}

/// Builds arguments for a body with the given context.
///
/// # Panics
///
/// Panics if the body cannot be classified.
pub fn args_with_context(body: Value, context: Context) -> Args {
    let kind = classify(&body)
        .kind()
        .unwrap_or_else(|| panic!("test body is not a recognizable event: {body}"));
    Args::builder(kind, body, context).build()
}

// ============================================================================
// Recording Client
// ============================================================================

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// API method name.
    pub method: String,
    /// Parameters passed to the call.
    pub params: Value,
}

/// An [`ApiClient`] that records calls and answers `{"ok": true}`.
#[derive(Clone, Default)]
pub struct RecordingClient {
    token: Option<String>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    response: Arc<Mutex<Option<Value>>>,
}

impl RecordingClient {
    /// A client without a token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A client bound to `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Sets the response returned by every call.
    pub fn set_response(&self, response: Value) {
        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
    }

    /// A copy of the recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl ApiClient for RecordingClient {
    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, BoxError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method: method.to_owned(),
                params,
            });
        let response = self
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(response.unwrap_or_else(|| json!({"ok": true})))
    }
}

// ============================================================================
// Recording Ack
// ============================================================================

/// Records every invocation of the receiver-side acknowledgement callback.
#[derive(Clone, Default)]
pub struct RecordingAck {
    bodies: Arc<Mutex<Vec<Option<Value>>>>,
}

impl RecordingAck {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// An [`Ack`] whose callback records into this recorder.
    pub fn ack(&self) -> Ack {
        let bodies = Arc::clone(&self.bodies);
        Ack::new(move |body: Option<Value>| {
            let bodies = Arc::clone(&bodies);
            async move {
                bodies
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(body);
                Ok::<(), BoxError>(())
            }
        })
    }

    /// How many times the callback ran.
    pub fn count(&self) -> usize {
        self.bodies.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The bodies the callback received.
    pub fn bodies(&self) -> Vec<Option<Value>> {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ============================================================================
// Recording Middleware
// ============================================================================

/// A middleware that records each payload it sees and continues.
#[derive(Clone, Default)]
pub struct RecordingMiddleware {
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl RecordingMiddleware {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the recorded payloads.
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded payloads.
    pub fn count(&self) -> usize {
        self.payloads.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Middleware for RecordingMiddleware {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        self.payloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.payload().clone());
        next.run().await
    }
}

// ============================================================================
// Counting Handler
// ============================================================================

/// A handler that counts invocations.
#[derive(Clone, Default)]
pub struct CountingHandler {
    count: Arc<AtomicUsize>,
    error: Option<Arc<str>>,
}

impl CountingHandler {
    /// A handler that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that counts and then fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            error: Some(Arc::from(message)),
        }
    }

    /// How many times the handler ran.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Handler for CountingHandler {
    async fn call(&self, _args: Args) -> Result<(), BoxError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(message) => Err(message.to_string().into()),
            None => Ok(()),
        }
    }
}
