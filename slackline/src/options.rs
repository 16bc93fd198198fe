//! # Configuration
//!
//! [`AppOptions`] is the builder [`App::new`](crate::App::new) consumes.
//! [`AppSettings`] is its serializable subset, loadable from any serde format
//! or from the environment.

use crate::{client::ClientFactory, receiver::Receiver};
use serde::Deserialize;
use slackline_core::{Authorize, ConversationStore, Error};
use std::{sync::Arc, time::Duration};

/// Default Web API base URL.
pub const DEFAULT_API_URL: &str = "https://slack.com/api/";

/// Options for the reqwest-backed Web API client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL API method names are appended to.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Options for [`HttpResponseAck`](crate::HttpResponseAck).
#[derive(Debug, Clone, Copy)]
pub struct HttpAckOptions {
    /// Hold the acknowledgement response until processing finished.
    pub process_before_response: bool,
    /// How long to wait for an acknowledgement before the fallback responds.
    pub unhandled_request_timeout: Duration,
}

impl Default for HttpAckOptions {
    fn default() -> Self {
        Self {
            process_before_response: false,
            unhandled_request_timeout: Duration::from_millis(3001),
        }
    }
}

/// Serializable application settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Bot token for a single-workspace app.
    pub token: Option<String>,
    /// Bot id, used when token verification is disabled.
    pub bot_id: Option<String>,
    /// Bot user id, used when token verification is disabled.
    pub bot_user_id: Option<String>,
    /// Web API base URL.
    pub api_url: Option<String>,
    /// Verify the token with `auth.test` before the first event.
    pub token_verification: bool,
    /// Install the `ignore_self` global middleware.
    pub ignore_self: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            token: None,
            bot_id: None,
            bot_user_id: None,
            api_url: None,
            token_verification: true,
            ignore_self: true,
        }
    }
}

impl AppSettings {
    /// Reads `SLACK_BOT_TOKEN`, `SLACK_BOT_ID`, `SLACK_BOT_USER_ID`, `SLACK_API_URL`,
    /// `SLACK_TOKEN_VERIFICATION` and `SLACK_IGNORE_SELF`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| -> Result<bool, Error> {
            match lookup(key).as_deref().map(str::trim) {
                None | Some("") => Ok(default),
                Some("true") | Some("1") => Ok(true),
                Some("false") | Some("0") => Ok(false),
                Some(other) => Err(Error::AppInitialization(format!(
                    "{key} must be `true` or `false`, got `{other}`"
                ))),
            }
        };
        Ok(Self {
            token: lookup("SLACK_BOT_TOKEN"),
            bot_id: lookup("SLACK_BOT_ID"),
            bot_user_id: lookup("SLACK_BOT_USER_ID"),
            api_url: lookup("SLACK_API_URL"),
            token_verification: flag("SLACK_TOKEN_VERIFICATION", defaults.token_verification)?,
            ignore_self: flag("SLACK_IGNORE_SELF", defaults.ignore_self)?,
        })
    }
}

/// Which conversation store the default global middleware uses.
#[derive(Clone, Default)]
pub(crate) enum StoreChoice {
    #[default]
    Memory,
    Custom(Arc<dyn ConversationStore>),
    Disabled,
}

/// Builder for [`App`](crate::App).
#[derive(Clone)]
pub struct AppOptions {
    pub(crate) token: Option<String>,
    pub(crate) authorize: Option<Arc<dyn Authorize>>,
    pub(crate) bot_id: Option<String>,
    pub(crate) bot_user_id: Option<String>,
    pub(crate) token_verification: bool,
    pub(crate) ignore_self: bool,
    pub(crate) conversation_store: StoreChoice,
    pub(crate) client_options: ClientOptions,
    pub(crate) client_factory: Option<Arc<dyn ClientFactory>>,
    pub(crate) receiver: Option<Arc<dyn Receiver>>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            token: None,
            authorize: None,
            bot_id: None,
            bot_user_id: None,
            token_verification: true,
            ignore_self: true,
            conversation_store: StoreChoice::default(),
            client_options: ClientOptions::default(),
            client_factory: None,
            receiver: None,
        }
    }
}

impl AppOptions {
    /// Empty options. Set either a token or an authorize function.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options derived from settings.
    pub fn from_settings(settings: AppSettings) -> Self {
        let mut options = Self {
            token: settings.token,
            bot_id: settings.bot_id,
            bot_user_id: settings.bot_user_id,
            token_verification: settings.token_verification,
            ignore_self: settings.ignore_self,
            ..Self::default()
        };
        if let Some(api_url) = settings.api_url {
            options.client_options.api_url = api_url;
        }
        options
    }

    /// Single-workspace mode: every event uses this bot token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Multi-workspace mode: credentials are resolved per event.
    pub fn with_authorize<A: Authorize>(mut self, authorize: A) -> Self {
        self.authorize = Some(Arc::new(authorize));
        self
    }

    /// Bot id used when token verification is disabled.
    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    /// Bot user id used when token verification is disabled.
    pub fn with_bot_user_id(mut self, bot_user_id: impl Into<String>) -> Self {
        self.bot_user_id = Some(bot_user_id.into());
        self
    }

    /// Whether the single-workspace token is verified with `auth.test`.
    pub fn with_token_verification(mut self, enabled: bool) -> Self {
        self.token_verification = enabled;
        self
    }

    /// Whether events caused by the app itself are dropped.
    pub fn with_ignore_self(mut self, enabled: bool) -> Self {
        self.ignore_self = enabled;
        self
    }

    /// Conversation store for the conversation context middleware.
    pub fn with_conversation_store<S: ConversationStore>(mut self, store: S) -> Self {
        self.conversation_store = StoreChoice::Custom(Arc::new(store));
        self
    }

    /// Disables the conversation context middleware.
    pub fn without_conversation_store(mut self) -> Self {
        self.conversation_store = StoreChoice::Disabled;
        self
    }

    /// Options for the default Web API client.
    pub fn with_client_options(mut self, client_options: ClientOptions) -> Self {
        self.client_options = client_options;
        self
    }

    /// Replaces the Web API client implementation.
    pub fn with_client_factory<F: ClientFactory>(mut self, factory: F) -> Self {
        self.client_factory = Some(Arc::new(factory));
        self
    }

    /// The transport that feeds the app.
    pub fn with_receiver<R: Receiver>(mut self, receiver: R) -> Self {
        self.receiver = Some(Arc::new(receiver));
        self
    }
}

impl std::fmt::Debug for AppOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppOptions")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("authorize", &self.authorize.is_some())
            .field("bot_id", &self.bot_id)
            .field("bot_user_id", &self.bot_user_id)
            .field("token_verification", &self.token_verification)
            .field("ignore_self", &self.ignore_self)
            .field("client_options", &self.client_options)
            .field("receiver", &self.receiver.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("SLACK_TOKEN_VERIFICATION", "false"),
            ("SLACK_API_URL", "http://localhost:9000/api"),
        ]
        .into();
        let settings = AppSettings::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.token.as_deref(), Some("xoxb-1"));
        assert!(!settings.token_verification);
        assert!(settings.ignore_self);

        let options = AppOptions::from_settings(settings);
        assert_eq!(options.client_options.api_url, "http://localhost:9000/api");
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let err = AppSettings::from_lookup(|key| {
            (key == "SLACK_IGNORE_SELF").then(|| "sometimes".to_owned())
        })
        .unwrap_err();
        assert!(err.to_string().contains("SLACK_IGNORE_SELF"));
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: AppSettings = serde_json::from_value(serde_json::json!({"token": "xoxb"})).unwrap();
        assert!(settings.token_verification);
        assert_eq!(ClientOptions::default().api_url, DEFAULT_API_URL);
        assert_eq!(
            HttpAckOptions::default().unhandled_request_timeout,
            Duration::from_millis(3001)
        );
    }
}
