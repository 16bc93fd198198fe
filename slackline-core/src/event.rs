//! The unit of work a receiver hands to the dispatcher.

use crate::ack::Ack;
use serde_json::{Map, Value};

/// An event delivered by a receiver.
///
/// Each `ReceiverEvent` is consumed exactly once by the dispatcher.
#[derive(Debug, Clone)]
pub struct ReceiverEvent {
    /// The platform payload, never assumed well-formed.
    pub body: Value,
    /// Acknowledgement for the delivery.
    pub ack: Ack,
    /// Delivery retry attempt, when the platform is redelivering.
    pub retry_num: Option<u32>,
    /// Reason for the redelivery.
    pub retry_reason: Option<String>,
    /// Receiver-specific values copied into the context.
    pub custom_properties: Map<String, Value>,
}

impl ReceiverEvent {
    /// An event with no retry information and no custom properties.
    pub fn new(body: Value, ack: Ack) -> Self {
        Self {
            body,
            ack,
            retry_num: None,
            retry_reason: None,
            custom_properties: Map::new(),
        }
    }

    /// Sets the retry information.
    pub fn with_retry(mut self, retry_num: u32, retry_reason: impl Into<String>) -> Self {
        self.retry_num = Some(retry_num);
        self.retry_reason = Some(retry_reason.into());
        self
    }

    /// Adds a custom property.
    pub fn with_custom_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }
}
