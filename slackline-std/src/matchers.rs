//! Routing matchers.
//!
//! Each matcher inspects one field of the payload or body and continues only
//! when it matches. Regex matchers that capture groups publish them in the
//! context:
//!
//! | matcher | context key |
//! |---|---|
//! | [`match_message`] | `matches` |
//! | [`match_constraints`] `block_id` | `block_id_matches` |
//! | [`match_constraints`] `action_id` | `action_id_matches` |
//! | [`match_constraints`] `callback_id` | `callback_id_matches` |

use serde_json::Value;
use slackline_core::{
    Args, BoxError, Constraints, MatchResult, Matcher, Middleware, Next, lookup_str,
};

fn captures_value(groups: &[Option<String>]) -> Value {
    Value::Array(
        groups
            .iter()
            .map(|group| group.clone().map_or(Value::Null, Value::String))
            .collect(),
    )
}

/// Stores the captures of `result` under `key` and reports whether it matched.
fn record(args: &Args, key: &str, result: &MatchResult) -> Result<bool, BoxError> {
    if let Some(groups) = result.captures() {
        args.context().insert(key, captures_value(groups))?;
    }
    Ok(result.is_match())
}

// ============================================================================
// Event type
// ============================================================================

/// Continues when the inner event's `type` matches.
#[derive(Debug, Clone)]
pub struct MatchEventType(pub Matcher);

impl Middleware for MatchEventType {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        let matched = args
            .event()
            .and_then(|event| lookup_str(event, &["type"]))
            .is_some_and(|kind| self.0.is_match(kind));
        if matched { next.run().await } else { Ok(()) }
    }
}

/// Matches the inner event type exactly or by pattern.
pub fn match_event_type(matcher: impl Into<Matcher>) -> MatchEventType {
    MatchEventType(matcher.into())
}

// ============================================================================
// Message text
// ============================================================================

/// Continues when the message text matches.
///
/// Exact matchers test for a substring, patterns search the text and publish
/// their captures as `matches`. Messages without `text` never match.
#[derive(Debug, Clone)]
pub struct MatchMessage(pub Matcher);

impl Middleware for MatchMessage {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        let Some(text) = args.event().and_then(|event| lookup_str(event, &["text"])) else {
            return Ok(());
        };
        let result = match &self.0 {
            Matcher::Exact(needle) if text.contains(needle.as_str()) => MatchResult::Matched,
            Matcher::Exact(_) => MatchResult::NoMatch,
            other => other.matches(text),
        };
        if record(&args, "matches", &result)? {
            next.run().await
        } else {
            Ok(())
        }
    }
}

/// Matches message text by substring or pattern.
pub fn match_message(matcher: impl Into<Matcher>) -> MatchMessage {
    MatchMessage(matcher.into())
}

// ============================================================================
// Command name
// ============================================================================

/// Continues when the slash command name matches.
#[derive(Debug, Clone)]
pub struct MatchCommandName(pub Matcher);

impl Middleware for MatchCommandName {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        let matched = args
            .command()
            .and_then(|command| lookup_str(command, &["command"]))
            .is_some_and(|name| self.0.is_match(name));
        if matched { next.run().await } else { Ok(()) }
    }
}

/// Matches the command name exactly or by pattern.
pub fn match_command_name(matcher: impl Into<Matcher>) -> MatchCommandName {
    MatchCommandName(matcher.into())
}

// ============================================================================
// Constraints
// ============================================================================

/// Continues when every present constraint holds.
///
/// - `block_id` / `action_id` are read from the payload and only hold for
///   payloads carrying an `action_id` (block actions and block suggestions).
/// - `callback_id` is read from `view.callback_id` for view bodies, else from
///   the body's `callback_id`.
/// - `type` is compared with the body's `type`.
#[derive(Debug, Clone)]
pub struct MatchConstraints(pub Constraints);

impl MatchConstraints {
    fn check(&self, args: &Args) -> Result<bool, BoxError> {
        let constraints = &self.0;
        let payload = args.payload();
        let body = args.body();

        if constraints.block_id.is_some() || constraints.action_id.is_some() {
            if payload.get("action_id").is_none() {
                return Ok(false);
            }
            let fields = [
                (&constraints.block_id, "block_id"),
                (&constraints.action_id, "action_id"),
            ];
            for (matcher, field) in fields {
                let Some(matcher) = matcher else { continue };
                let Some(value) = lookup_str(payload, &[field]) else {
                    return Ok(false);
                };
                if !record(args, &format!("{field}_matches"), &matcher.matches(value))? {
                    return Ok(false);
                }
            }
        }

        if let Some(matcher) = &constraints.callback_id {
            let callback_id = if body.get("view").is_some() {
                lookup_str(body, &["view", "callback_id"])
            } else {
                lookup_str(body, &["callback_id"])
            };
            let Some(callback_id) = callback_id else {
                return Ok(false);
            };
            if !record(args, "callback_id_matches", &matcher.matches(callback_id))? {
                return Ok(false);
            }
        }

        if let Some(kind) = &constraints.kind {
            if lookup_str(body, &["type"]) != Some(kind.as_str()) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

impl Middleware for MatchConstraints {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        if self.check(&args)? {
            next.run().await
        } else {
            Ok(())
        }
    }
}

/// Matches interactive payload identifiers.
pub fn match_constraints(constraints: Constraints) -> MatchConstraints {
    MatchConstraints(constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingHandler, args_for};
    use regex::Regex;
    use serde_json::json;
    use slackline_core::{Listener, ListenerChain};

    fn chain_with<M: Middleware>(middleware: M, handler: &CountingHandler) -> ListenerChain {
        Listener::new(handler.clone()).with(middleware).seal()
    }

    fn block_action(block_id: &str, action_id: &str) -> Value {
        json!({
            "type": "block_actions",
            "actions": [{"block_id": block_id, "action_id": action_id}]
        })
    }

    #[tokio::test]
    async fn test_block_id_routing() {
        let handler = CountingHandler::new();
        let chain = chain_with(match_constraints(Constraints::new().block_id("X")), &handler);

        chain.run(args_for(block_action("X", "a"))).await.unwrap();
        chain.run(args_for(block_action("Y", "a"))).await.unwrap();

        assert_eq!(handler.count(), 1);
    }

    #[tokio::test]
    async fn test_action_id_captures_are_published() {
        let handler = CountingHandler::new();
        let constraints = Constraints::new().action_id(Regex::new(r"^approve_(\d+)$").unwrap());
        let chain = chain_with(match_constraints(constraints), &handler);

        let args = args_for(block_action("b", "approve_17"));
        chain.run(args.clone()).await.unwrap();

        assert_eq!(handler.count(), 1);
        assert_eq!(
            args.context().get("action_id_matches"),
            Some(json!(["approve_17", "17"]))
        );
    }

    #[tokio::test]
    async fn test_block_constraints_need_block_payloads() {
        let handler = CountingHandler::new();
        let chain = chain_with(match_constraints(Constraints::new().action_id("a")), &handler);

        chain
            .run(args_for(json!({"type": "dialog_submission", "callback_id": "a"})))
            .await
            .unwrap();
        assert_eq!(handler.count(), 0);
    }

    #[tokio::test]
    async fn test_callback_id_prefers_view() {
        let handler = CountingHandler::new();
        let chain = chain_with(
            match_constraints(Constraints::new().callback_id("modal").with_type("view_submission")),
            &handler,
        );

        chain
            .run(args_for(json!({
                "type": "view_submission",
                "callback_id": "ignored",
                "view": {"callback_id": "modal"}
            })))
            .await
            .unwrap();
        chain
            .run(args_for(json!({
                "type": "view_closed",
                "view": {"callback_id": "modal"}
            })))
            .await
            .unwrap();

        assert_eq!(handler.count(), 1);
    }

    #[tokio::test]
    async fn test_message_substring_and_pattern() {
        let hello = CountingHandler::new();
        let substring = chain_with(match_message("hello"), &hello);
        let body = json!({"event": {"type": "message", "text": "well hello friends!"}});
        substring.run(args_for(body.clone())).await.unwrap();
        substring
            .run(args_for(json!({"event": {"type": "message"}})))
            .await
            .unwrap();
        assert_eq!(hello.count(), 1);

        let greeting = CountingHandler::new();
        let pattern = chain_with(match_message(Regex::new(r"hello (\w+)").unwrap()), &greeting);
        let args = args_for(body);
        pattern.run(args.clone()).await.unwrap();
        assert_eq!(greeting.count(), 1);
        assert_eq!(
            args.context().get("matches"),
            Some(json!(["hello friends", "friends"]))
        );
    }

    #[tokio::test]
    async fn test_event_type_and_command_name() {
        let mentions = CountingHandler::new();
        let chain = chain_with(match_event_type(Regex::new("^app_").unwrap()), &mentions);
        chain
            .run(args_for(json!({"event": {"type": "app_mention"}})))
            .await
            .unwrap();
        chain
            .run(args_for(json!({"event": {"type": "reaction_added"}})))
            .await
            .unwrap();
        assert_eq!(mentions.count(), 1);

        let deploys = CountingHandler::new();
        let chain = chain_with(match_command_name("/deploy"), &deploys);
        chain.run(args_for(json!({"command": "/deploy"}))).await.unwrap();
        chain.run(args_for(json!({"command": "/rollback"}))).await.unwrap();
        assert_eq!(deploys.count(), 1);
    }
}
