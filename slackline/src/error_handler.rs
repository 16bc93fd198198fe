//! Global error handling.
//!
//! Every per-event error ends up in exactly one handler. The handler's result
//! decides what [`App::process_event`](crate::App::process_event) returns:
//! `Ok(())` swallows the error, `Err(_)` hands it back to the receiver.

use futures::future::BoxFuture;
use serde_json::Value;
use slackline_core::{Context, Error};
use std::{future::Future, sync::Arc};

/// What an extended error handler receives.
#[derive(Debug)]
pub struct ErrorHandlerArgs {
    /// The coded error.
    pub error: Error,
    /// The body of the event that failed.
    pub body: Value,
    /// The event context. When authorization fails it carries only the tenant
    /// ids and install type found in the body; absent when even that could not
    /// be built.
    pub context: Option<Context>,
}

type BasicFn = dyn Fn(Error) -> BoxFuture<'static, Result<(), Error>> + Send + Sync;
type ExtendedFn = dyn Fn(ErrorHandlerArgs) -> BoxFuture<'static, Result<(), Error>> + Send + Sync;

#[derive(Clone, Default)]
pub(crate) enum ErrorHandler {
    /// Logs the error and hands it back.
    #[default]
    Default,
    Basic(Arc<BasicFn>),
    Extended(Arc<ExtendedFn>),
}

impl ErrorHandler {
    pub(crate) fn basic<F, Fut>(handler: F) -> Self
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        ErrorHandler::Basic(Arc::new(
            move |error: Error| -> BoxFuture<'static, Result<(), Error>> { Box::pin(handler(error)) },
        ))
    }

    pub(crate) fn extended<F, Fut>(handler: F) -> Self
    where
        F: Fn(ErrorHandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        ErrorHandler::Extended(Arc::new(
            move |args: ErrorHandlerArgs| -> BoxFuture<'static, Result<(), Error>> {
                Box::pin(handler(args))
            },
        ))
    }

    pub(crate) async fn handle(&self, args: ErrorHandlerArgs) -> Result<(), Error> {
        match self {
            ErrorHandler::Default => {
                tracing::error!(code = %args.error.code(), error = %args.error, "unhandled error while processing event");
                Err(args.error)
            }
            ErrorHandler::Basic(handler) => handler(args.error).await,
            ErrorHandler::Extended(handler) => handler(args).await,
        }
    }
}
