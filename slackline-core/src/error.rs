//! Error types for slackline.
//!
//! Every error that reaches an application error handler is an [`Error`], which
//! carries a stable [`ErrorCode`]. Errors produced by middleware, listeners and
//! collaborators travel as [`BoxError`] until the dispatcher codes them with
//! [`Error::from_boxed`].
//!
//! - [`Error`] - Coded error delivered to error handlers
//! - [`ErrorCode`] - Stable identifier for each error family
//! - [`PipelineError`] - Faults raised by the middleware executor itself

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable identifiers for every [`Error`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Configuration-time failure.
    AppInitialization,
    /// The `authorize` collaborator rejected the event.
    Authorization,
    /// A middleware needed a context property that was absent.
    ContextMissingProperty,
    /// Custom properties tried to shadow a built-in context key.
    InvalidCustomProperty,
    /// More than one listener chain failed for the same event.
    MultipleListeners,
    /// A listener asked for an argument the event kind does not carry.
    ArgumentUnavailable,
    /// Any error that was not raised with a code.
    Unknown,
}

impl ErrorCode {
    /// The string form of this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AppInitialization => "slackline_app_initialization_error",
            ErrorCode::Authorization => "slackline_authorization_error",
            ErrorCode::ContextMissingProperty => "slackline_context_missing_property_error",
            ErrorCode::InvalidCustomProperty => "slackline_context_invalid_custom_property_error",
            ErrorCode::MultipleListeners => "slackline_multiple_listener_error",
            ErrorCode::ArgumentUnavailable => "slackline_argument_unavailable_error",
            ErrorCode::Unknown => "slackline_unknown_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level coded error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The app or one of its listeners was configured incorrectly.
    #[error("app initialization error: {0}")]
    AppInitialization(String),

    /// Authorization of an incoming event did not succeed.
    #[error("authorization of incoming event did not succeed: {0}")]
    Authorization(#[source] BoxError),

    /// A context property required by a middleware is missing.
    #[error("context is missing `{property}`: {message}")]
    ContextMissingProperty {
        /// The missing property.
        property: &'static str,
        /// What the middleware needed it for.
        message: String,
    },

    /// Custom properties collided with a built-in context key.
    #[error("invalid custom property: {0}")]
    InvalidCustomProperty(String),

    /// Several listener chains failed while processing one event.
    #[error("{} listeners failed while processing the event", .0.len())]
    MultipleListeners(Vec<BoxError>),

    /// The argument does not exist for this kind of event (e.g. `say` without a conversation).
    #[error("`{0}` is not available for this event")]
    ArgumentUnavailable(&'static str),

    /// An error that was not raised with a code.
    #[error(transparent)]
    Unknown(BoxError),
}

impl Error {
    /// The stable code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::AppInitialization(_) => ErrorCode::AppInitialization,
            Error::Authorization(_) => ErrorCode::Authorization,
            Error::ContextMissingProperty { .. } => ErrorCode::ContextMissingProperty,
            Error::InvalidCustomProperty(_) => ErrorCode::InvalidCustomProperty,
            Error::MultipleListeners(_) => ErrorCode::MultipleListeners,
            Error::ArgumentUnavailable(_) => ErrorCode::ArgumentUnavailable,
            Error::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Codes an arbitrary boxed error.
    ///
    /// A boxed [`Error`] is unwrapped as is; anything else becomes [`Error::Unknown`].
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(coded) => *coded,
            Err(other) => Error::Unknown(other),
        }
    }

    /// The aggregated originals of a [`Error::MultipleListeners`], empty otherwise.
    pub fn originals(&self) -> &[BoxError] {
        match self {
            Error::MultipleListeners(originals) => originals,
            _ => &[],
        }
    }
}

/// Faults raised by the middleware executor.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A middleware invoked its continuation more than once.
    #[error("next() was called multiple times by the same middleware")]
    NextCalledMultipleTimes,

    /// A middleware or listener panicked.
    #[error("listener panicked: {0}")]
    Panicked(String),
}
