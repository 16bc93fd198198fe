//! # HTTP Acknowledgement Controller
//!
//! Ties one HTTP request's response to the event's acknowledgement.
//!
//! ```text
//! Pending ──ack──▶ Sent                       (respond immediately)
//! Pending ──ack──▶ Stored ──finish(Ok)──▶ Sent (process before response)
//! Pending ──finish(Err)──▶ Sent               (401 / 500)
//! Pending ──timeout──▶ TimedOut               (fallback handler responds)
//! ```
//!
//! The response travels over a `oneshot` channel, so at most one is ever
//! written. The timeout never cancels listeners that are still running.

use crate::options::HttpAckOptions;
use serde_json::Value;
use slackline_core::{Ack, BoxError, Error};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::{sync::oneshot, task::JoinHandle};

/// A response for the HTTP request that carried the event.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body: strings are sent as text, objects as JSON.
    pub body: Option<Value>,
}

impl HttpResponse {
    /// A response with a status and no body.
    pub fn status(status: u16) -> Self {
        Self { status, body: None }
    }
}

/// Produces the response for a request nobody acknowledged in time.
pub type UnhandledRequestHandler = Arc<dyn Fn() -> HttpResponse + Send + Sync>;

/// The default fallback: logs an error and answers 404.
pub fn default_unhandled_request_handler() -> UnhandledRequestHandler {
    Arc::new(|| {
        tracing::error!(
            "an incoming event was not acknowledged within the unhandled request timeout; \
             ensure that ack() is called in a listener"
        );
        HttpResponse::status(404)
    })
}

#[derive(Debug, Clone, PartialEq)]
enum AckState {
    Pending,
    Stored(HttpResponse),
    Sent,
    TimedOut,
}

struct AckInner {
    state: AckState,
    sender: Option<oneshot::Sender<HttpResponse>>,
    timer: Option<JoinHandle<()>>,
}

impl AckInner {
    fn send(&mut self, response: HttpResponse) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(sender) = self.sender.take() {
            if sender.send(response).is_err() {
                tracing::debug!("HTTP request closed before the response was written");
            }
        }
        self.state = AckState::Sent;
    }
}

/// Acknowledgement controller for one HTTP request.
#[derive(Clone)]
pub struct HttpResponseAck {
    options: HttpAckOptions,
    inner: Arc<Mutex<AckInner>>,
}

impl HttpResponseAck {
    /// Creates the controller and the channel the response arrives on.
    ///
    /// Must be called inside a tokio runtime: it spawns the unhandled-request
    /// timer.
    pub fn new(
        options: HttpAckOptions,
        unhandled_request_handler: Option<UnhandledRequestHandler>,
    ) -> (Self, oneshot::Receiver<HttpResponse>) {
        let (sender, receiver) = oneshot::channel();
        let inner = Arc::new(Mutex::new(AckInner {
            state: AckState::Pending,
            sender: Some(sender),
            timer: None,
        }));

        let handler = unhandled_request_handler.unwrap_or_else(default_unhandled_request_handler);
        let timed_out = Arc::clone(&inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(options.unhandled_request_timeout).await;
            let mut guard = timed_out.lock().unwrap_or_else(PoisonError::into_inner);
            let inner = &mut *guard;
            if inner.state == AckState::Pending {
                let response = handler();
                inner.send(response);
                inner.state = AckState::TimedOut;
            }
        });
        inner.lock().unwrap_or_else(PoisonError::into_inner).timer = Some(timer);

        (Self { options, inner }, receiver)
    }

    /// The [`Ack`] to put in the [`ReceiverEvent`](slackline_core::ReceiverEvent).
    pub fn bind(&self) -> Ack {
        let controller = self.clone();
        Ack::new(move |body: Option<Value>| {
            let controller = controller.clone();
            async move {
                controller.acknowledge(body);
                Ok::<(), BoxError>(())
            }
        })
    }

    /// Settles the request once `process_event` returned.
    pub fn finish(&self, result: &Result<(), Error>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let response = match (result, &inner.state) {
            (Ok(()), AckState::Stored(stored)) => Some(stored.clone()),
            (Err(Error::Authorization(_)), AckState::Pending | AckState::Stored(_)) => {
                Some(HttpResponse::status(401))
            }
            (Err(_), AckState::Pending | AckState::Stored(_)) => Some(HttpResponse::status(500)),
            _ => None,
        };
        if let Some(response) = response {
            inner.send(response);
        }
    }

    /// Whether the event was acknowledged, or the fallback already answered.
    pub fn is_settled(&self) -> bool {
        self.lock().state != AckState::Pending
    }

    fn acknowledge(&self, body: Option<Value>) {
        let response = HttpResponse { status: 200, body };
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.state {
            AckState::Pending if self.options.process_before_response => {
                if let Some(timer) = inner.timer.take() {
                    timer.abort();
                }
                inner.state = AckState::Stored(response);
            }
            AckState::Pending => inner.send(response),
            AckState::TimedOut => {
                tracing::warn!("ack() called after the unhandled request timeout already responded");
            }
            AckState::Stored(_) | AckState::Sent => {
                tracing::warn!("ack() was called more than once for the same request; ignoring");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AckInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HttpResponseAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponseAck")
            .field("options", &self.options)
            .field("state", &self.lock().state)
            .finish()
    }
}
