//! Tower integration.
//!
//! [`AppService`] exposes an [`App`] as a `tower::Service<ReceiverEvent>`, so
//! transports built on tower can apply their own layers (timeouts,
//! concurrency limits, load shedding) in front of the dispatcher.
//!
//! ```rust,ignore
//! use slackline::tower::AppService;
//! use tower::{ServiceBuilder, limit::ConcurrencyLimitLayer};
//!
//! let service = ServiceBuilder::new()
//!     .layer(ConcurrencyLimitLayer::new(64))
//!     .service(AppService::new(app));
//! ```

use crate::app::App;
use slackline_core::{Error, ReceiverEvent};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// Wraps an [`App`] as a tower `Service`.
#[derive(Debug, Clone)]
pub struct AppService {
    app: Arc<App>,
}

impl AppService {
    /// Create a new `AppService` dispatching to `app`.
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    /// Get a reference to the inner app.
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }
}

impl ::tower::Service<ReceiverEvent> for AppService {
    type Response = ();
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The app has no backpressure of its own.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: ReceiverEvent) -> Self::Future {
        let app = Arc::clone(&self.app);
        Box::pin(async move { app.process_event(event).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AppOptions;
    use serde_json::json;
    use slackline_core::{Ack, Args, BoxError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ::tower::Service;

    #[tokio::test]
    async fn test_service_dispatches_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut app = App::new(
            AppOptions::new()
                .with_token("xoxb-test")
                .with_token_verification(false),
        )
        .unwrap();
        app.command("/deploy", move |_args: Args| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        });

        let mut service = AppService::new(Arc::new(app));
        let event = ReceiverEvent::new(json!({"command": "/deploy", "team_id": "T1"}), Ack::noop());
        service.call(event).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
