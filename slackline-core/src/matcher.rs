//! # Matchers
//!
//! Registration methods accept strings, regular expressions, predicates and
//! constraint sets. All of them normalize into [`Matcher`] and [`Selector`]
//! when a listener is registered, so routing middleware only deal with one
//! representation.

use regex::Regex;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Matches one string field of an event.
#[derive(Clone)]
pub enum Matcher {
    /// Exact string equality.
    Exact(String),
    /// Regular expression search. Capture groups are exposed on match.
    Pattern(Regex),
    /// Arbitrary predicate.
    Predicate(Predicate),
}

/// The outcome of [`Matcher::matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The value did not match.
    NoMatch,
    /// The value matched and there is nothing to capture.
    Matched,
    /// A pattern matched; group 0 is the whole match.
    Captured(Vec<Option<String>>),
}

impl MatchResult {
    /// Whether the value matched.
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchResult::NoMatch)
    }

    /// The captured groups, if a pattern matched.
    pub fn captures(&self) -> Option<&[Option<String>]> {
        match self {
            MatchResult::Captured(groups) => Some(groups),
            _ => None,
        }
    }
}

impl Matcher {
    /// A matcher backed by a predicate.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(f))
    }

    /// Tests `value`.
    pub fn matches(&self, value: &str) -> MatchResult {
        match self {
            Matcher::Exact(expected) => bool_result(expected == value),
            Matcher::Pattern(regex) => match regex.captures(value) {
                Some(caps) => MatchResult::Captured(
                    caps.iter()
                        .map(|group| group.map(|m| m.as_str().to_owned()))
                        .collect(),
                ),
                None => MatchResult::NoMatch,
            },
            Matcher::Predicate(predicate) => bool_result(predicate(value)),
        }
    }

    /// Tests `value`, discarding captures.
    pub fn is_match(&self, value: &str) -> bool {
        self.matches(value).is_match()
    }

    /// The pattern source, for regex matchers.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Matcher::Pattern(regex) => Some(regex.as_str()),
            _ => None,
        }
    }

    /// The literal, for exact matchers.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Matcher::Exact(literal) => Some(literal),
            _ => None,
        }
    }
}

fn bool_result(matched: bool) -> MatchResult {
    if matched {
        MatchResult::Matched
    } else {
        MatchResult::NoMatch
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Exact(literal) => f.debug_tuple("Exact").field(literal).finish(),
            Matcher::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Matcher {
    fn from(literal: &str) -> Self {
        Matcher::Exact(literal.to_owned())
    }
}

impl From<String> for Matcher {
    fn from(literal: String) -> Self {
        Matcher::Exact(literal)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Pattern(regex)
    }
}

/// A set of conditions over interactive payload identifiers. All present
/// conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    /// Exact `type` of the body.
    pub kind: Option<String>,
    /// `block_id` of the action.
    pub block_id: Option<Matcher>,
    /// `action_id` of the action.
    pub action_id: Option<Matcher>,
    /// `callback_id` of the body or of its view.
    pub callback_id: Option<Matcher>,
}

/// Names of the constraint keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKey {
    /// `type`
    Type,
    /// `block_id`
    BlockId,
    /// `action_id`
    ActionId,
    /// `callback_id`
    CallbackId,
}

impl ConstraintKey {
    /// The key as it appears in payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            ConstraintKey::Type => "type",
            ConstraintKey::BlockId => "block_id",
            ConstraintKey::ActionId => "action_id",
            ConstraintKey::CallbackId => "callback_id",
        }
    }
}

impl Constraints {
    /// An empty constraint set, matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the body `type`.
    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Requires the action's `block_id`.
    pub fn block_id(mut self, matcher: impl Into<Matcher>) -> Self {
        self.block_id = Some(matcher.into());
        self
    }

    /// Requires the action's `action_id`.
    pub fn action_id(mut self, matcher: impl Into<Matcher>) -> Self {
        self.action_id = Some(matcher.into());
        self
    }

    /// Requires the `callback_id`.
    pub fn callback_id(mut self, matcher: impl Into<Matcher>) -> Self {
        self.callback_id = Some(matcher.into());
        self
    }

    /// The keys this set constrains.
    pub fn keys(&self) -> Vec<ConstraintKey> {
        [
            (self.kind.is_some(), ConstraintKey::Type),
            (self.block_id.is_some(), ConstraintKey::BlockId),
            (self.action_id.is_some(), ConstraintKey::ActionId),
            (self.callback_id.is_some(), ConstraintKey::CallbackId),
        ]
        .into_iter()
        .filter_map(|(present, key)| present.then_some(key))
        .collect()
    }
}

/// What a registration call selects on: a bare identifier or a constraint set.
#[derive(Debug, Clone)]
pub enum Selector {
    /// An identifier, normalized per listener kind (`action_id` or `callback_id`).
    Id(Matcher),
    /// Explicit constraints.
    Constraints(Constraints),
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Selector::Id(id.into())
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Selector::Id(id.into())
    }
}

impl From<Regex> for Selector {
    fn from(regex: Regex) -> Self {
        Selector::Id(regex.into())
    }
}

impl From<Matcher> for Selector {
    fn from(matcher: Matcher) -> Self {
        Selector::Id(matcher)
    }
}

impl From<Constraints> for Selector {
    fn from(constraints: Constraints) -> Self {
        Selector::Constraints(constraints)
    }
}
