//! The transport boundary.
//!
//! A receiver turns platform traffic (HTTP requests, socket frames) into
//! [`ReceiverEvent`](slackline_core::ReceiverEvent)s and feeds them to
//! [`App::process_event`]. Transports themselves live outside this crate.

use crate::app::App;
use async_trait::async_trait;
use slackline_core::BoxError;
use std::sync::Arc;

/// A transport that delivers events to an [`App`].
#[async_trait]
pub trait Receiver: Send + Sync + 'static {
    /// Hands the receiver the app it feeds. Called once, before [`start`](Self::start).
    ///
    /// Receivers that keep the `Arc` should release it in [`stop`](Self::stop),
    /// since the app also holds the receiver.
    fn init(&self, app: Arc<App>);

    /// Starts accepting traffic.
    async fn start(&self) -> Result<(), BoxError>;

    /// Stops accepting traffic.
    async fn stop(&self) -> Result<(), BoxError>;
}
