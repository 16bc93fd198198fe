//! # Pipeline Executor
//!
//! Runs a chain of middleware as forward-only continuations. Calling the
//! [`Next`] handed to middleware *i* runs middleware *i + 1*, or the terminal
//! step once the chain is exhausted.
//!
//! Guarantees:
//!
//! - Each `Next` runs at most once. A second call yields
//!   [`PipelineError::NextCalledMultipleTimes`].
//! - Errors propagate up the chain, so an upstream middleware awaiting `next`
//!   can intercept them.
//! - A middleware that never calls `next` truncates the chain.
//! - There is no implicit timeout.

use crate::{
    args::Args,
    error::{BoxError, PipelineError},
    handler::Handler,
    middleware::BoxMiddleware,
};
use futures::future::BoxFuture;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// An immutable, shareable middleware list.
pub type Chain = Arc<[BoxMiddleware]>;

/// The step that runs after the last middleware of a chain.
pub type Terminal = Arc<dyn Fn(Args) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Wraps a handler as a terminal step.
pub fn terminal<H: Handler>(handler: H) -> Terminal {
    let handler = Arc::new(handler);
    Arc::new(move |args: Args| -> BoxFuture<'static, Result<(), BoxError>> {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler.call(args).await })
    })
}

/// The continuation handed to a middleware.
#[derive(Clone)]
pub struct Next {
    chain: Chain,
    position: usize,
    args: Args,
    terminal: Option<Terminal>,
    invoked: Arc<AtomicBool>,
}

impl Next {
    fn new(chain: Chain, position: usize, args: Args, terminal: Option<Terminal>) -> Self {
        Self {
            chain,
            position,
            args,
            terminal,
            invoked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the rest of the chain.
    pub async fn run(&self) -> Result<(), BoxError> {
        if self.invoked.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::NextCalledMultipleTimes.into());
        }
        dispatch(
            Arc::clone(&self.chain),
            self.position,
            self.args.clone(),
            self.terminal.clone(),
        )
        .await
    }

    /// Whether this continuation already ran.
    pub fn is_invoked(&self) -> bool {
        self.invoked.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("len", &self.chain.len())
            .field("invoked", &self.is_invoked())
            .finish_non_exhaustive()
    }
}

/// Runs `chain` over `args`, then `terminal` if every middleware continued.
pub async fn process(chain: Chain, args: Args, terminal: Option<Terminal>) -> Result<(), BoxError> {
    dispatch(chain, 0, args, terminal).await
}

fn dispatch(
    chain: Chain,
    position: usize,
    args: Args,
    terminal: Option<Terminal>,
) -> BoxFuture<'static, Result<(), BoxError>> {
    Box::pin(async move {
        let Some(middleware) = chain.get(position).map(Arc::clone) else {
            return match terminal {
                Some(terminal) => terminal(args).await,
                None => Ok(()),
            };
        };
        let next = Next::new(chain, position + 1, args.clone(), terminal);
        middleware.handle_dyn(args, next).await
    })
}
