//! Conversation state.
//!
//! [`conversation_context`] loads the stored state of the event's
//! conversation into `context["conversation"]` and installs a
//! [`ConversationUpdater`] extension listeners use to write it back.

use async_trait::async_trait;
use serde_json::Value;
use slackline_core::{
    Args, BoxError, ConversationStore, ConversationStoreError, Middleware, Next, conversation_id,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<u64>,
}

/// An in-process [`ConversationStore`].
///
/// Entries never leave memory unless they are read after expiring.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations, expired or not.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, conversation_id: &str) -> Result<Value, ConversationStoreError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = state
            .get(conversation_id)
            .ok_or(ConversationStoreError::NotFound)?;
        if entry.expires_at.is_some_and(|expires_at| now_millis() > expires_at) {
            state.remove(conversation_id);
            return Err(ConversationStoreError::Expired);
        }
        Ok(entry.value.clone())
    }

    async fn set(
        &self,
        conversation_id: &str,
        value: Value,
        expires_at: Option<u64>,
    ) -> Result<(), ConversationStoreError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation_id.to_owned(), Entry { value, expires_at });
        Ok(())
    }
}

/// Writes the state of the current event's conversation.
///
/// Fetch it with `args.context().extension::<ConversationUpdater>()`.
#[derive(Clone)]
pub struct ConversationUpdater {
    store: Arc<dyn ConversationStore>,
    conversation_id: String,
}

impl ConversationUpdater {
    /// The conversation this updater writes to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Replaces the conversation state. `expires_at` is in epoch milliseconds.
    pub async fn update(
        &self,
        state: impl Into<Value>,
        expires_at: Option<u64>,
    ) -> Result<(), ConversationStoreError> {
        self.store
            .set(&self.conversation_id, state.into(), expires_at)
            .await
    }
}

impl std::fmt::Debug for ConversationUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationUpdater")
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

/// Loads conversation state before the rest of the chain runs.
#[derive(Clone)]
pub struct ConversationContext {
    store: Arc<dyn ConversationStore>,
}

impl Middleware for ConversationContext {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        let span = args.span();
        match conversation_id(args.body()) {
            Some(id) => {
                args.context().insert_extension(ConversationUpdater {
                    store: Arc::clone(&self.store),
                    conversation_id: id.clone(),
                });
                match self.store.get(&id).await {
                    Ok(state) => {
                        args.context().insert("conversation", state)?;
                        tracing::debug!(parent: span, conversation_id = %id, "conversation context loaded");
                    }
                    Err(err) => {
                        tracing::debug!(parent: span, conversation_id = %id, error = %err, "conversation context not loaded");
                    }
                }
            }
            None => tracing::debug!(parent: span, "no conversation id for incoming event"),
        }
        next.run().await
    }
}

/// Loads `context["conversation"]` from `store`.
pub fn conversation_context<S: ConversationStore>(store: S) -> ConversationContext {
    ConversationContext {
        store: Arc::new(store),
    }
}

/// Like [`conversation_context`], for a store that is already shared.
pub fn shared_conversation_context(store: Arc<dyn ConversationStore>) -> ConversationContext {
    ConversationContext { store }
}
