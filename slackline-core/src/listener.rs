//! # Listener Chains
//!
//! A listener is an ordered list of middleware ending in a [`Handler`]. The
//! dispatcher evaluates every registered listener independently for each
//! event; the routing middleware at the front of a chain decide whether the
//! handler is reached.
//!
//! ```ignore
//! let listener = Listener::new(|args: Args| async move {
//!     args.say("pong").await?;
//!     Ok(())
//! })
//! .with(only_in_channel("C123"));
//! ```

use crate::{
    args::Args,
    error::BoxError,
    handler::Handler,
    middleware::{BoxMiddleware, Middleware, boxed},
    pipeline::{Chain, Terminal, process, terminal},
};
use std::sync::Arc;

/// A handler with the middleware that guard it.
pub struct Listener {
    middleware: Vec<BoxMiddleware>,
    handler: Terminal,
}

impl Listener {
    /// A listener with no middleware of its own.
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            middleware: Vec::new(),
            handler: terminal(handler),
        }
    }

    /// Appends a middleware that runs before the handler.
    pub fn with<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(boxed(middleware));
        self
    }

    /// Puts routing middleware in front of the listener's own middleware.
    pub fn guarded_by(mut self, routing: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        let own = std::mem::take(&mut self.middleware);
        self.middleware = routing.into_iter().chain(own).collect();
        self
    }

    /// Number of middleware in front of the handler.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Whether the handler is reached without any middleware.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Freezes the listener for dispatch.
    pub fn seal(self) -> ListenerChain {
        ListenerChain {
            chain: self.middleware.into(),
            handler: self.handler,
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// A sealed listener, ready to run.
#[derive(Clone)]
pub struct ListenerChain {
    chain: Chain,
    handler: Terminal,
}

impl ListenerChain {
    /// Runs the chain over `args`.
    pub async fn run(&self, args: Args) -> Result<(), BoxError> {
        process(
            Arc::clone(&self.chain),
            args,
            Some(Arc::clone(&self.handler)),
        )
        .await
    }
}

impl Handler for ListenerChain {
    async fn call(&self, args: Args) -> Result<(), BoxError> {
        self.run(args).await
    }
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChain")
            .field("middleware", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Conversion into a [`Listener`].
///
/// Implemented for every [`Handler`] and for `Listener` itself, so
/// registration methods accept either a bare closure or a built chain.
pub trait IntoListener {
    /// Performs the conversion.
    fn into_listener(self) -> Listener;
}

impl IntoListener for Listener {
    fn into_listener(self) -> Listener {
        self
    }
}

impl<H: Handler> IntoListener for H {
    fn into_listener(self) -> Listener {
        Listener::new(self)
    }
}
