//! # slackline - Event Dispatch for Chat-Platform Bots
//!
//! `slackline` receives raw platform payloads from a transport, classifies
//! them, resolves the tenant's credentials and pushes each event through
//! global middleware and every registered listener chain.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use slackline::prelude::*;
//!
//! let mut app = App::new(AppOptions::new().with_token(token))?;
//!
//! app.message("hello", |args: Args| async move {
//!     args.say("hi there").await?;
//!     Ok(())
//! });
//!
//! app.action("approve", |args: Args| async move {
//!     args.ack().await?;
//!     args.respond("approved").await?;
//!     Ok(())
//! });
//!
//! app.process_event(ReceiverEvent::new(body, ack)).await?;
//! ```
//!
//! ## Layout
//!
//! - [`slackline_core`]: traits, the middleware executor and the coded [`Error`]
//! - [`slackline_std`]: routing filters, matchers and the conversation store
//! - this crate: the [`App`] dispatcher, authorization, Web API clients and
//!   the HTTP acknowledgement controller

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod ack;
mod app;
pub mod authorization;
mod client;
mod error_handler;
mod options;
mod receiver;
pub mod reply;

#[cfg(feature = "tower")]
pub mod tower;

pub use ack::{HttpResponse, HttpResponseAck, UnhandledRequestHandler, default_unhandled_request_handler};
pub use app::App;
pub use authorization::SingleTeamAuthorizer;
pub use client::{ClientFactory, ClientPools, WebApiError, WebClient, WebClientFactory, WebClientPool};
pub use error_handler::ErrorHandlerArgs;
pub use options::{AppOptions, AppSettings, ClientOptions, DEFAULT_API_URL, HttpAckOptions};
pub use receiver::Receiver;

pub use slackline_core::{
    // Acknowledgement
    Ack,
    // Collaborators
    ApiClient,
    // Arguments
    Args,
    Authorize,
    AuthorizeResult,
    AuthorizeSourceData,
    // Errors
    BoxError,
    // Pipeline
    Chain,
    // Matching
    Constraints,
    // Context
    Context,
    ConversationStore,
    ConversationStoreError,
    Error,
    ErrorCode,
    // Classification
    IncomingEventType,
    IntoListener,
    Handler,
    Listener,
    Matcher,
    Middleware,
    Next,
    OutgoingMessage,
    PipelineError,
    ReceiverEvent,
    Selector,
    SharedClient,
    classify,
};
pub use slackline_core;
pub use slackline_std;

/// Built-in middleware.
pub mod middleware {
    pub use slackline_std::{
        conversation::{ConversationUpdater, MemoryStore, conversation_context},
        filters::{
            only_actions, only_commands, only_events, only_options, only_shortcuts,
            only_view_actions,
        },
        logging::LogEvents,
        matchers::{match_command_name, match_constraints, match_event_type, match_message},
        message::{direct_mention, ignore_self, subtype},
    };
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use slackline_std::testing::*;
}

/// Prelude module - common imports for slackline.
///
/// ```rust,ignore
/// use slackline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Ack, App, AppOptions, Args, BoxError, Constraints, Context, Error, ErrorCode, Handler,
        Listener, Matcher, Middleware, Next, ReceiverEvent, Selector,
        middleware::{direct_mention, ignore_self, subtype},
    };
}
