//! # Handler
//!
//! The terminal step of a listener chain: user code that runs once every
//! middleware of the chain let the event through.

use crate::{args::Args, error::BoxError};
use std::future::Future;

/// Business logic for one listener.
///
/// Closures `Fn(Args) -> impl Future<Output = Result<(), BoxError>>` are handlers.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a slackline handler",
    label = "missing `Handler` implementation",
    note = "Handlers take `Args` and return `Result<(), BoxError>`."
)]
pub trait Handler: Send + Sync + 'static {
    /// Handles the event.
    fn call(&self, args: Args) -> impl Future<Output = Result<(), BoxError>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    fn call(&self, args: Args) -> impl Future<Output = Result<(), BoxError>> + Send {
        (self)(args)
    }
}
