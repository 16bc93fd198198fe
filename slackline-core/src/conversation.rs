//! Conversation state storage contract.

use crate::error::BoxError;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by a [`ConversationStore`].
#[derive(Error, Debug)]
pub enum ConversationStoreError {
    /// Nothing was stored for the conversation.
    #[error("Conversation not found")]
    NotFound,

    /// The stored state outlived its expiry.
    #[error("Conversation expired")]
    Expired,

    /// The backing storage failed.
    #[error("conversation store backend failed: {0}")]
    Backend(#[source] BoxError),
}

/// Persists state per conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    /// Loads the state of a conversation.
    async fn get(&self, conversation_id: &str) -> Result<Value, ConversationStoreError>;

    /// Stores the state of a conversation. `expires_at` is in epoch milliseconds.
    async fn set(
        &self,
        conversation_id: &str,
        state: Value,
        expires_at: Option<u64>,
    ) -> Result<(), ConversationStoreError>;
}
