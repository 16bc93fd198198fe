//! Message helpers: self-filtering, subtypes and direct mentions.

use regex::Regex;
use serde_json::Value;
use slackline_core::{Args, BoxError, Error, Middleware, Next, lookup_str};
use std::sync::LazyLock;

static USER_MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<@([^>|\s]+)(?:\|[^>]*)?>").expect("valid user mention regex")
});

/// Events that stay visible even when triggered by the app's own bot user.
const KEPT_SELF_EVENTS: &[&str] = &["member_joined_channel", "member_left_channel"];

/// Drops events the app caused itself.
///
/// A `bot_message` whose `bot_id` is the app's bot id is dropped, and so is
/// any event whose `user` is the app's bot user, except channel membership
/// changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreSelf;

impl IgnoreSelf {
    fn is_self(args: &Args) -> bool {
        let Some(event) = args.event() else {
            return false;
        };
        let context = args.context();

        if let (Some(message), Some(bot_id)) = (args.message(), context.bot_id()) {
            if lookup_str(message, &["subtype"]) == Some("bot_message")
                && lookup_str(message, &["bot_id"]) == Some(bot_id)
            {
                return true;
            }
        }

        let from_bot_user = context
            .bot_user_id()
            .is_some_and(|bot_user_id| lookup_str(event, &["user"]) == Some(bot_user_id));
        let kind = lookup_str(event, &["type"]).unwrap_or_default();
        from_bot_user && !KEPT_SELF_EVENTS.contains(&kind)
    }
}

impl Middleware for IgnoreSelf {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        if Self::is_self(&args) {
            tracing::debug!(parent: args.span(), "ignoring event caused by this app");
            return Ok(());
        }
        next.run().await
    }
}

/// Drops events the app caused itself.
pub fn ignore_self() -> IgnoreSelf {
    IgnoreSelf
}

/// Continues only for messages of one subtype.
#[derive(Debug, Clone)]
pub struct Subtype(pub String);

impl Middleware for Subtype {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        let matched = args
            .message()
            .and_then(|message| lookup_str(message, &["subtype"]))
            == Some(self.0.as_str());
        if matched { next.run().await } else { Ok(()) }
    }
}

/// Continues only for messages of subtype `name`.
pub fn subtype(name: impl Into<String>) -> Subtype {
    Subtype(name.into())
}

/// Continues only for messages that start by mentioning the app's bot user.
///
/// Fails with [`Error::ContextMissingProperty`] when the context carries no
/// bot user id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectMention;

impl Middleware for DirectMention {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        let Some(bot_user_id) = args.context().bot_user_id() else {
            return Err(Error::ContextMissingProperty {
                property: "bot_user_id",
                message: "cannot match direct mentions of the app without a bot user id".into(),
            }
            .into());
        };
        let Some(text) = args.message().and_then(|message| message.get("text")).and_then(Value::as_str)
        else {
            return Ok(());
        };
        let mentioned = USER_MENTION_REGEX
            .captures(text.trim())
            .and_then(|caps| caps.get(1))
            .is_some_and(|id| id.as_str() == bot_user_id);
        if mentioned { next.run().await } else { Ok(()) }
    }
}

/// Continues only for messages that start with a mention of the app.
pub fn direct_mention() -> DirectMention {
    DirectMention
}
