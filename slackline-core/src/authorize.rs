//! Authorization contract.
//!
//! The dispatcher never stores credentials itself. For every event it derives
//! an [`AuthorizeSourceData`] from the body and asks an [`Authorize`]
//! implementation for the matching [`AuthorizeResult`].

use crate::error::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Tenant identifiers extracted from an incoming event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeSourceData {
    /// Workspace the event originated in. Absent for org-wide installs.
    pub team_id: Option<String>,
    /// Enterprise organization, when the workspace belongs to one.
    pub enterprise_id: Option<String>,
    /// User who triggered the event.
    pub user_id: Option<String>,
    /// Conversation the event happened in.
    pub conversation_id: Option<String>,
    /// Whether the app is installed org-wide.
    pub is_enterprise_install: bool,
}

/// Credentials resolved for one event.
///
/// At least one of `bot_token`/`user_token` is expected for listeners that use
/// the API client; without either the dispatcher falls back to a tokenless client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeResult {
    /// Bot token for the tenant.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// User token for the tenant.
    #[serde(default)]
    pub user_token: Option<String>,
    /// Bot id of this app in the tenant.
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Bot user id of this app in the tenant.
    #[serde(default)]
    pub bot_user_id: Option<String>,
    /// Id of the user owning `user_token`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Workspace id.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Enterprise organization id.
    #[serde(default)]
    pub enterprise_id: Option<String>,
    /// Additional values copied into the event context.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthorizeResult {
    /// A result carrying only a bot token.
    pub fn bot(token: impl Into<String>) -> Self {
        Self {
            bot_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Sets the workspace id.
    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Sets the enterprise id.
    pub fn with_enterprise_id(mut self, enterprise_id: impl Into<String>) -> Self {
        self.enterprise_id = Some(enterprise_id.into());
        self
    }

    /// Sets the bot id and bot user id.
    pub fn with_bot_identity(
        mut self,
        bot_id: impl Into<String>,
        bot_user_id: impl Into<String>,
    ) -> Self {
        self.bot_id = Some(bot_id.into());
        self.bot_user_id = Some(bot_user_id.into());
        self
    }

    /// The token API calls should use: the bot token, else the user token.
    pub fn token(&self) -> Option<&str> {
        self.bot_token.as_deref().or(self.user_token.as_deref())
    }
}

/// Resolves credentials for an event.
///
/// Closures `Fn(AuthorizeSourceData, Value) -> impl Future<Output = Result<AuthorizeResult, BoxError>>`
/// implement this trait.
#[async_trait]
pub trait Authorize: Send + Sync + 'static {
    /// Looks up the credentials for `source`. Errors become authorization failures.
    async fn authorize(
        &self,
        source: &AuthorizeSourceData,
        body: &Value,
    ) -> Result<AuthorizeResult, BoxError>;
}

#[async_trait]
impl<F, Fut> Authorize for F
where
    F: Fn(AuthorizeSourceData, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<AuthorizeResult, BoxError>> + Send,
{
    async fn authorize(
        &self,
        source: &AuthorizeSourceData,
        body: &Value,
    ) -> Result<AuthorizeResult, BoxError> {
        (self)(source.clone(), body.clone()).await
    }
}
