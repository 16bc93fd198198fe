//! # slackline-std
//!
//! Standard middleware for the slackline event dispatch framework.
//!
//! This crate provides:
//! - **Kind filters**: [`filters::only_events`], [`filters::only_actions`] and friends
//! - **Matchers**: [`matchers::match_constraints`], [`matchers::match_message`],
//!   [`matchers::match_event_type`], [`matchers::match_command_name`]
//! - **Message helpers**: [`message::ignore_self`], [`message::subtype`],
//!   [`message::direct_mention`]
//! - **Conversation state**: [`conversation::MemoryStore`],
//!   [`conversation::conversation_context`]
//! - **Observation**: [`logging::LogEvents`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use slackline_core;

// Modules
pub mod conversation;
pub mod filters;
pub mod logging;
pub mod matchers;
pub mod message;
pub mod testing;
