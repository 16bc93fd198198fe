//! # Middleware
//!
//! A middleware receives the event's [`Args`] and a [`Next`] continuation.
//! Calling `next.run().await` passes control down the chain and returns once
//! everything after it finished; returning without calling it ends the chain
//! silently. That is how routing middleware filter events.
//!
//! # Static vs Dynamic Dispatch
//!
//! [`Middleware`] uses native `async fn` for zero-cost static dispatch.
//! Chains store [`DynMiddleware`] trait objects, which every `Middleware`
//! implements automatically.
//!
//! Closures `Fn(Args, Next) -> impl Future<Output = Result<(), BoxError>>` are middleware.

use crate::{args::Args, error::BoxError, pipeline::Next};
use futures::future::BoxFuture;
use std::{future::Future, sync::Arc};

/// A step in a middleware chain.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a slackline middleware",
    label = "missing `Middleware` implementation",
    note = "Middleware take `(Args, Next)` and return `Result<(), BoxError>`."
)]
pub trait Middleware: Send + Sync + 'static {
    /// Processes the event, optionally continuing with `next`.
    fn handle(&self, args: Args, next: Next) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Dynamic object-safe version of [`Middleware`].
pub trait DynMiddleware: Send + Sync + 'static {
    /// Processes the event (dynamic dispatch version).
    fn handle_dyn<'a>(&'a self, args: Args, next: Next) -> BoxFuture<'a, Result<(), BoxError>>;
}

impl<T: Middleware> DynMiddleware for T {
    fn handle_dyn<'a>(&'a self, args: Args, next: Next) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(self.handle(args, next))
    }
}

impl<F, Fut> Middleware for F
where
    F: Fn(Args, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn handle(&self, args: Args, next: Next) -> impl Future<Output = Result<(), BoxError>> + Send {
        (self)(args, next)
    }
}

/// A shared, type-erased middleware.
pub type BoxMiddleware = Arc<dyn DynMiddleware>;

/// Erases a middleware's type.
pub fn boxed<M: Middleware>(middleware: M) -> BoxMiddleware {
    Arc::new(middleware)
}
