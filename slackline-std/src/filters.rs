//! Kind filters.
//!
//! Each filter continues only for events of one [`IncomingEventType`] and
//! silently drops everything else.

use slackline_core::{Args, BoxError, IncomingEventType, Middleware, Next};

/// Continues only for events of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlyKind(pub IncomingEventType);

impl Middleware for OnlyKind {
    async fn handle(&self, args: Args, next: Next) -> Result<(), BoxError> {
        if args.kind() == self.0 {
            next.run().await
        } else {
            Ok(())
        }
    }
}

/// Events API callbacks only.
pub fn only_events() -> OnlyKind {
    OnlyKind(IncomingEventType::Event)
}

/// Slash commands only.
pub fn only_commands() -> OnlyKind {
    OnlyKind(IncomingEventType::Command)
}

/// Interactive actions only.
pub fn only_actions() -> OnlyKind {
    OnlyKind(IncomingEventType::Action)
}

/// Shortcuts only.
pub fn only_shortcuts() -> OnlyKind {
    OnlyKind(IncomingEventType::Shortcut)
}

/// Options requests only.
pub fn only_options() -> OnlyKind {
    OnlyKind(IncomingEventType::Options)
}

/// View submissions and closures only.
pub fn only_view_actions() -> OnlyKind {
    OnlyKind(IncomingEventType::ViewAction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingHandler, args_for};
    use serde_json::json;
    use slackline_core::Listener;

    #[tokio::test]
    async fn test_filters_by_kind() {
        let handler = CountingHandler::new();
        let chain = Listener::new(handler.clone()).with(only_commands()).seal();

        chain.run(args_for(json!({"command": "/deploy"}))).await.unwrap();
        chain
            .run(args_for(json!({"event": {"type": "app_mention"}})))
            .await
            .unwrap();

        assert_eq!(handler.count(), 1);
    }
}
