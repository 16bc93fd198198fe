//! Logging middleware for event observation.

use slackline_core::{Args, BoxError, Middleware, Next, conversation_id};

/// A middleware that logs each event's kind and conversation, then continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEvents;

impl Middleware for LogEvents {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        tracing::debug!(
            parent: args.span(),
            kind = %args.kind(),
            conversation_id = conversation_id(args.body()).as_deref(),
            retry_num = args.context().retry_num(),
            "processing event"
        );
        next.run().await
    }
}
