//! # Listener Arguments
//!
//! [`Args`] is what every middleware and listener receives for one event:
//! the raw body, the shaped payload, the [`Context`], the API client, the
//! tracing span of the event, and the reply utilities that apply to the
//! event's kind (`say`, `respond`, `ack`).
//!
//! `Args` is cheap to clone; every clone refers to the same event.

use crate::{
    ack::Ack,
    client::{NoopClient, SharedClient},
    context::Context,
    error::{BoxError, Error},
    kind::{IncomingEventType, payload_of},
};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::{future::Future, sync::Arc};

/// A message to send with `say` or `respond`.
///
/// Strings become `{"text": ...}`; JSON objects are sent as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage(Map<String, Value>);

impl OutgoingMessage {
    /// Consumes the message into its JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Sets a field, keeping any value the caller already supplied.
    pub fn or_insert(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.entry(key).or_insert_with(|| value.into());
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(text: &str) -> Self {
        OutgoingMessage::from(text.to_owned())
    }
}

impl From<String> for OutgoingMessage {
    fn from(text: String) -> Self {
        let mut map = Map::new();
        map.insert("text".into(), Value::String(text));
        OutgoingMessage(map)
    }
}

impl From<Value> for OutgoingMessage {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => OutgoingMessage(map),
            Value::String(text) => OutgoingMessage::from(text),
            other => OutgoingMessage::from(other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for OutgoingMessage {
    fn from(map: Map<String, Value>) -> Self {
        OutgoingMessage(map)
    }
}

type ReplyFn = dyn Fn(OutgoingMessage) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync;

/// Posts a message into the event's conversation.
#[derive(Clone)]
pub struct Say(Arc<ReplyFn>);

/// Replies through the event's `response_url`.
#[derive(Clone)]
pub struct Respond(Arc<ReplyFn>);

macro_rules! reply_fn {
    ($name:ident) => {
        impl $name {
            /// Wraps a reply function.
            pub fn new<F, Fut>(f: F) -> Self
            where
                F: Fn(OutgoingMessage) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
            {
                $name(Arc::new(
                    move |message: OutgoingMessage| -> BoxFuture<'static, Result<Value, BoxError>> {
                        Box::pin(f(message))
                    },
                ))
            }

            /// Sends `message`.
            pub async fn send(&self, message: impl Into<OutgoingMessage>) -> Result<Value, BoxError> {
                (self.0)(message.into()).await
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };
}

reply_fn!(Say);
reply_fn!(Respond);

struct ArgsInner {
    kind: IncomingEventType,
    body: Value,
    payload: Value,
    context: Context,
    client: SharedClient,
    say: Option<Say>,
    respond: Option<Respond>,
    ack: Option<Ack>,
    span: tracing::Span,
}

/// The arguments of one event.
#[derive(Clone)]
pub struct Args {
    inner: Arc<ArgsInner>,
}

/// Builder for [`Args`].
pub struct ArgsBuilder {
    kind: IncomingEventType,
    body: Value,
    context: Context,
    client: SharedClient,
    say: Option<Say>,
    respond: Option<Respond>,
    ack: Option<Ack>,
    span: tracing::Span,
}

impl ArgsBuilder {
    /// Sets the API client.
    pub fn client(mut self, client: SharedClient) -> Self {
        self.client = client;
        self
    }

    /// Attaches `say`.
    pub fn say(mut self, say: Say) -> Self {
        self.say = Some(say);
        self
    }

    /// Attaches `respond`.
    pub fn respond(mut self, respond: Respond) -> Self {
        self.respond = Some(respond);
        self
    }

    /// Attaches `ack`.
    pub fn ack(mut self, ack: Ack) -> Self {
        self.ack = Some(ack);
        self
    }

    /// Sets the span middleware should log under. Defaults to the current span.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Finishes the arguments, shaping the payload from the body.
    pub fn build(self) -> Args {
        let payload = payload_of(self.kind, &self.body);
        Args {
            inner: Arc::new(ArgsInner {
                kind: self.kind,
                body: self.body,
                payload,
                context: self.context,
                client: self.client,
                say: self.say,
                respond: self.respond,
                ack: self.ack,
                span: self.span,
            }),
        }
    }
}

impl Args {
    /// Starts building arguments for a classified body.
    pub fn builder(kind: IncomingEventType, body: Value, context: Context) -> ArgsBuilder {
        ArgsBuilder {
            kind,
            body,
            context,
            client: Arc::new(NoopClient),
            say: None,
            respond: None,
            ack: None,
            span: tracing::Span::current(),
        }
    }

    /// Category of the event.
    pub fn kind(&self) -> IncomingEventType {
        self.inner.kind
    }

    /// The raw body.
    pub fn body(&self) -> &Value {
        &self.inner.body
    }

    /// The shaped payload (the inner event, the view, the first action, or the body).
    pub fn payload(&self) -> &Value {
        &self.inner.payload
    }

    /// The inner event of an Events API callback.
    pub fn event(&self) -> Option<&Value> {
        self.payload_if(IncomingEventType::Event)
    }

    /// The inner event, when it is a `message` event.
    pub fn message(&self) -> Option<&Value> {
        self.event()
            .filter(|event| event.get("type").and_then(Value::as_str) == Some("message"))
    }

    /// The action payload.
    pub fn action(&self) -> Option<&Value> {
        self.payload_if(IncomingEventType::Action)
    }

    /// The slash command payload.
    pub fn command(&self) -> Option<&Value> {
        self.payload_if(IncomingEventType::Command)
    }

    /// The options request payload.
    pub fn options(&self) -> Option<&Value> {
        self.payload_if(IncomingEventType::Options)
    }

    /// The view of a view action.
    pub fn view(&self) -> Option<&Value> {
        self.payload_if(IncomingEventType::ViewAction)
    }

    /// The shortcut payload.
    pub fn shortcut(&self) -> Option<&Value> {
        self.payload_if(IncomingEventType::Shortcut)
    }

    /// The event context.
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// The API client selected for the event's tenant and token.
    pub fn client(&self) -> &SharedClient {
        &self.inner.client
    }

    /// The tracing span of the event.
    pub fn span(&self) -> &tracing::Span {
        &self.inner.span
    }

    /// Whether `say` is available for this event.
    pub fn can_say(&self) -> bool {
        self.inner.say.is_some()
    }

    /// Whether `respond` is available for this event.
    pub fn can_respond(&self) -> bool {
        self.inner.respond.is_some()
    }

    /// Posts a message into the event's conversation.
    pub async fn say(&self, message: impl Into<OutgoingMessage>) -> Result<Value, BoxError> {
        match &self.inner.say {
            Some(say) => say.send(message).await,
            None => Err(Error::ArgumentUnavailable("say").into()),
        }
    }

    /// Replies through the event's `response_url`.
    pub async fn respond(&self, message: impl Into<OutgoingMessage>) -> Result<Value, BoxError> {
        match &self.inner.respond {
            Some(respond) => respond.send(message).await,
            None => Err(Error::ArgumentUnavailable("respond").into()),
        }
    }

    /// Acknowledges the event. Events API callbacks are acknowledged by the dispatcher.
    pub async fn ack(&self) -> Result<(), BoxError> {
        self.bound_ack()?.ack().await
    }

    /// Acknowledges the event with a response body.
    pub async fn ack_with(&self, body: impl Into<Value>) -> Result<(), BoxError> {
        self.bound_ack()?.ack_with(body).await
    }

    fn bound_ack(&self) -> Result<&Ack, BoxError> {
        self.inner
            .ack
            .as_ref()
            .ok_or_else(|| Error::ArgumentUnavailable("ack").into())
    }

    fn payload_if(&self, kind: IncomingEventType) -> Option<&Value> {
        (self.inner.kind == kind).then_some(&self.inner.payload)
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("kind", &self.inner.kind)
            .field("payload", &self.inner.payload)
            .field("context", &self.inner.context)
            .field("say", &self.inner.say.is_some())
            .field("respond", &self.inner.respond.is_some())
            .field("ack", &self.inner.ack)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_outgoing_message_shapes() {
        let text = OutgoingMessage::from("hi").into_map();
        assert_eq!(Value::Object(text), json!({"text": "hi"}));

        let blocks = OutgoingMessage::from(json!({"blocks": []}))
            .or_insert("channel", "C1")
            .into_map();
        assert_eq!(Value::Object(blocks), json!({"blocks": [], "channel": "C1"}));
    }

    #[test]
    fn test_aliases_follow_kind() {
        let body = json!({"type": "event_callback", "event": {"type": "message", "text": "hi"}});
        let args = Args::builder(IncomingEventType::Event, body, Context::default()).build();
        assert_eq!(args.event(), Some(&json!({"type": "message", "text": "hi"})));
        assert!(args.message().is_some());
        assert!(args.action().is_none());
        assert!(args.command().is_none());
    }

    #[tokio::test]
    async fn test_missing_utilities_are_unavailable() {
        let args = Args::builder(IncomingEventType::Event, json!({"event": {}}), Context::default()).build();

        let err = Error::from_boxed(args.say("hi").await.unwrap_err());
        assert_eq!(err.code(), ErrorCode::ArgumentUnavailable);
        assert!(args.ack().await.is_err());
    }

    #[tokio::test]
    async fn test_say_forwards_messages() {
        let say = Say::new(|message: OutgoingMessage| async move {
            Ok::<_, BoxError>(Value::Object(message.into_map()))
        });
        let args = Args::builder(IncomingEventType::Command, json!({"command": "/a"}), Context::default())
            .say(say)
            .build();
        assert_eq!(args.say("pong").await.unwrap(), json!({"text": "pong"}));
    }
}
