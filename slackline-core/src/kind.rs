//! # Event Classification
//!
//! Inspects a raw, loosely-typed event body and decides which
//! [`IncomingEventType`] it belongs to, plus the conversation the event
//! happened in (used to address contextual replies).
//!
//! Classification never fails: a body with no recognizable shape is
//! [`Classification::Unknown`].
//!
//! # Precedence
//!
//! The first matching rule wins:
//!
//! 1. an `event` field → [`IncomingEventType::Event`]
//! 2. a `command` field → [`IncomingEventType::Command`]
//! 3. an action-family `type` literal → Action, Options or Shortcut
//! 4. `view_submission` / `view_closed` → [`IncomingEventType::ViewAction`]
//! 5. `shortcut` → [`IncomingEventType::Shortcut`]
//! 6. any other body carrying an `actions` array → [`IncomingEventType::Action`]

use serde_json::{Map, Value};

/// The category of an incoming platform event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomingEventType {
    /// Events API callback.
    Event,
    /// Slash command.
    Command,
    /// Interactive action (block actions, legacy interactive messages, dialogs).
    Action,
    /// Global or message shortcut.
    Shortcut,
    /// View submission or closure.
    ViewAction,
    /// Dynamic options request for a select menu.
    Options,
}

impl IncomingEventType {
    /// Lower-case name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            IncomingEventType::Event => "event",
            IncomingEventType::Command => "command",
            IncomingEventType::Action => "action",
            IncomingEventType::Shortcut => "shortcut",
            IncomingEventType::ViewAction => "view_action",
            IncomingEventType::Options => "options",
        }
    }
}

impl std::fmt::Display for IncomingEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The body has a recognizable shape.
    Known {
        /// Category of the event.
        kind: IncomingEventType,
        /// Conversation the event belongs to, when one could be found.
        conversation_id: Option<String>,
    },
    /// Nothing in the body identifies the event.
    Unknown,
}

impl Classification {
    /// The category, if the body was recognized.
    pub fn kind(&self) -> Option<IncomingEventType> {
        match self {
            Classification::Known { kind, .. } => Some(*kind),
            Classification::Unknown => None,
        }
    }

    /// The conversation id, if the body was recognized and carried one.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Classification::Known {
                conversation_id, ..
            } => conversation_id.as_deref(),
            Classification::Unknown => None,
        }
    }
}

type Rule = fn(&Map<String, Value>) -> Option<IncomingEventType>;

const RULES: &[Rule] = &[
    event_rule,
    command_rule,
    action_family_rule,
    view_rule,
    shortcut_rule,
    actions_array_rule,
];

/// JSON paths probed in order for the conversation id; the first string found wins.
const CONVERSATION_PATHS: &[&[&str]] = &[
    &["event", "channel"],
    &["event", "item", "channel"],
    &["event", "channel", "id"],
    &["event", "channel_id"],
    &["channel_id"],
    &["channel", "id"],
];

/// Classifies a raw event body.
pub fn classify(body: &Value) -> Classification {
    let Some(fields) = body.as_object() else {
        return Classification::Unknown;
    };
    match RULES.iter().find_map(|rule| rule(fields)) {
        Some(kind) => Classification::Known {
            kind,
            conversation_id: conversation_id(body),
        },
        None => Classification::Unknown,
    }
}

/// Extracts the conversation id of a body.
pub fn conversation_id(body: &Value) -> Option<String> {
    CONVERSATION_PATHS
        .iter()
        .find_map(|path| lookup_str(body, path))
        .map(str::to_owned)
}

/// Follows `path` through nested objects and returns the string found there.
pub fn lookup_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
        .and_then(Value::as_str)
}

/// The value listeners see as `payload` for a classified body.
///
/// Events expose the inner `event`, view actions the `view`, actions with an
/// `actions` array their first action; every other kind is the body itself.
pub fn payload_of(kind: IncomingEventType, body: &Value) -> Value {
    let nested = match kind {
        IncomingEventType::Event => body.get("event"),
        IncomingEventType::ViewAction => body.get("view"),
        IncomingEventType::Action => body
            .get("actions")
            .and_then(Value::as_array)
            .and_then(|actions| actions.first()),
        _ => None,
    };
    nested.unwrap_or(body).clone()
}

fn body_type(fields: &Map<String, Value>) -> Option<&str> {
    fields.get("type").and_then(Value::as_str)
}

fn event_rule(fields: &Map<String, Value>) -> Option<IncomingEventType> {
    fields.get("event").map(|_| IncomingEventType::Event)
}

fn command_rule(fields: &Map<String, Value>) -> Option<IncomingEventType> {
    fields.get("command").map(|_| IncomingEventType::Command)
}

fn action_family_rule(fields: &Map<String, Value>) -> Option<IncomingEventType> {
    match body_type(fields)? {
        "interactive_message" if fields.contains_key("name") && !fields.contains_key("actions") => {
            Some(IncomingEventType::Options)
        }
        "block_actions" | "interactive_message" | "dialog_submission" => {
            Some(IncomingEventType::Action)
        }
        "block_suggestion" | "dialog_suggestion" => Some(IncomingEventType::Options),
        "message_action" => Some(IncomingEventType::Shortcut),
        _ => None,
    }
}

fn view_rule(fields: &Map<String, Value>) -> Option<IncomingEventType> {
    match body_type(fields)? {
        "view_submission" | "view_closed" => Some(IncomingEventType::ViewAction),
        _ => None,
    }
}

fn shortcut_rule(fields: &Map<String, Value>) -> Option<IncomingEventType> {
    (body_type(fields)? == "shortcut").then_some(IncomingEventType::Shortcut)
}

fn actions_array_rule(fields: &Map<String, Value>) -> Option<IncomingEventType> {
    fields
        .get("actions")
        .filter(|actions| actions.is_array())
        .map(|_| IncomingEventType::Action)
}
