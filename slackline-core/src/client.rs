//! The platform API client contract.
//!
//! The dispatcher treats the client as opaque: it only selects one per event
//! and hands it to listeners. The reqwest-backed implementation lives in the
//! `slackline` crate.

use crate::error::BoxError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A platform Web API client bound to at most one token.
#[async_trait]
pub trait ApiClient: Send + Sync + 'static {
    /// The token this client authenticates with.
    fn token(&self) -> Option<&str>;

    /// Calls an API method (e.g. `chat.postMessage`) with JSON parameters.
    async fn call(&self, method: &str, params: Value) -> Result<Value, BoxError>;
}

/// Shared handle to a client.
pub type SharedClient = Arc<dyn ApiClient>;

/// A client that fails every call. Used when no real client was configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClient;

#[async_trait]
impl ApiClient for NoopClient {
    fn token(&self) -> Option<&str> {
        None
    }

    async fn call(&self, method: &str, _params: Value) -> Result<Value, BoxError> {
        Err(format!("no API client is configured to call `{method}`").into())
    }
}
