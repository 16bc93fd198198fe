//! At-most-once acknowledgement.
//!
//! The platform requires each delivered event to be acknowledged exactly once.
//! Receivers hand the dispatcher an [`Ack`] wrapping their transport-specific
//! callback; the wrapper guarantees the callback runs at most once no matter how
//! many times listeners call it.

use crate::error::BoxError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

type AckCallback = dyn Fn(Option<Value>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// An idempotent acknowledgement handle.
///
/// Cloning is cheap; all clones share the acknowledged flag.
#[derive(Clone)]
pub struct Ack {
    callback: Arc<AckCallback>,
    acknowledged: Arc<AtomicBool>,
}

impl Ack {
    /// Wraps a receiver callback. The callback gets the optional response body.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            callback: Arc::new(
                move |body: Option<Value>| -> BoxFuture<'static, Result<(), BoxError>> {
                    Box::pin(callback(body))
                },
            ),
            acknowledged: Arc::new(AtomicBool::new(false)),
        }
    }

    /// An acknowledgement that does nothing but track whether it was called.
    pub fn noop() -> Self {
        Self::new(|_| async { Ok::<(), BoxError>(()) })
    }

    /// Acknowledges without a response body.
    pub async fn ack(&self) -> Result<(), BoxError> {
        self.send(None).await
    }

    /// Acknowledges with a response body (a string or a JSON object).
    pub async fn ack_with(&self, body: impl Into<Value>) -> Result<(), BoxError> {
        self.send(Some(body.into())).await
    }

    /// Whether the acknowledgement already happened.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::Acquire)
    }

    async fn send(&self, body: Option<Value>) -> Result<(), BoxError> {
        if self.acknowledged.swap(true, Ordering::AcqRel) {
            tracing::warn!("ack() was called more than once for the same event; ignoring");
            return Ok(());
        }
        (self.callback)(body).await
    }
}

impl std::fmt::Debug for Ack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ack")
            .field("acknowledged", &self.is_acknowledged())
            .finish_non_exhaustive()
    }
}
