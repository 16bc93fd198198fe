//! # slackline-core
//!
//! Core traits for the slackline event dispatch framework.
//!
//! This crate has minimal dependencies and is meant to be imported by
//! middleware crates that don't need the full `slackline` dispatcher.
//!
//! # Processing Model
//!
//! Every incoming event is classified ([`classify`]), authorized, wrapped in
//! [`Args`] and pushed through two nested middleware chains:
//!
//! ## Global Middleware ([`Middleware`])
//!
//! Run for every event in registration order. Each one receives the event
//! and a [`Next`] continuation; returning without calling it drops the event.
//!
//! ## Listener Chains ([`Listener`])
//!
//! Once the global chain completes, every registered listener chain runs
//! concurrently. Routing middleware at the front of a chain decide whether
//! its [`Handler`] is reached.
//!
//! # Collaborators
//!
//! - [`Authorize`] - Resolves credentials for an event's tenant
//! - [`ApiClient`] - Opaque platform API client
//! - [`ConversationStore`] - Per-conversation state storage
//!
//! # Error Types
//!
//! - [`Error`] - Coded error delivered to error handlers
//! - [`PipelineError`] - Middleware executor faults
//! - [`ConversationStoreError`] - Conversation store failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod ack;
mod args;
mod authorize;
mod client;
mod context;
mod conversation;
mod error;
mod event;
mod handler;
mod kind;
mod listener;
mod matcher;
mod middleware;
mod pipeline;

// Re-exports
pub use ack::Ack;
pub use args::{Args, ArgsBuilder, OutgoingMessage, Respond, Say};
pub use authorize::{Authorize, AuthorizeResult, AuthorizeSourceData};
pub use client::{ApiClient, NoopClient, SharedClient};
pub use context::{Context, ContextBuilder, RESERVED_KEYS, is_reserved};
pub use conversation::{ConversationStore, ConversationStoreError};
pub use error::{BoxError, Error, ErrorCode, PipelineError};
pub use event::ReceiverEvent;
pub use handler::Handler;
pub use kind::{Classification, IncomingEventType, classify, conversation_id, lookup_str, payload_of};
pub use listener::{IntoListener, Listener, ListenerChain};
pub use matcher::{ConstraintKey, Constraints, MatchResult, Matcher, Selector};
pub use middleware::{BoxMiddleware, DynMiddleware, Middleware, boxed};
pub use pipeline::{Chain, Next, Terminal, process, terminal};
