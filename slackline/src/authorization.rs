//! # Authorization Resolver
//!
//! Derives [`AuthorizeSourceData`] from an event body and resolves the
//! tenant's credentials, either through a user-supplied [`Authorize`] or
//! through the single-workspace [`SingleTeamAuthorizer`].
//!
//! Token revocation and app uninstall events are never sent to the
//! authorizer: by the time they arrive no valid token exists, so a minimal
//! result is synthesized from the source.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use slackline_core::{
    Authorize, AuthorizeResult, AuthorizeSourceData, BoxError, IncomingEventType, SharedClient,
    lookup_str,
};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Event types authorized without calling the authorizer.
pub const SELF_DESCRIBING_EVENTS: &[&str] = &["app_uninstalled", "tokens_revoked"];

/// Builds the source data for a classified body.
pub fn build_source(
    kind: IncomingEventType,
    body: &Value,
    conversation_id: Option<&str>,
) -> AuthorizeSourceData {
    let (team_id, enterprise_id, user_id) = match kind {
        IncomingEventType::Event => event_ids(body),
        IncomingEventType::Command => (
            lookup_str(body, &["team_id"]),
            lookup_str(body, &["enterprise_id"]),
            lookup_str(body, &["user_id"]),
        ),
        IncomingEventType::Action
        | IncomingEventType::Shortcut
        | IncomingEventType::ViewAction
        | IncomingEventType::Options => interactive_ids(body),
    };
    AuthorizeSourceData {
        team_id: team_id.map(str::to_owned),
        enterprise_id: enterprise_id.map(str::to_owned),
        user_id: user_id.map(str::to_owned),
        conversation_id: conversation_id.map(str::to_owned),
        is_enterprise_install: is_enterprise_install(body),
    }
}

/// Events API callbacks: the first authorization wins over top-level fields.
fn event_ids(body: &Value) -> (Option<&str>, Option<&str>, Option<&str>) {
    let first_authorization = body
        .get("authorizations")
        .and_then(Value::as_array)
        .and_then(|authorizations| authorizations.first());
    let from_authorization =
        |key: &str| first_authorization.and_then(|authorization| lookup_str(authorization, &[key]));

    let team_id = from_authorization("team_id").or_else(|| lookup_str(body, &["team_id"]));
    let enterprise_id =
        from_authorization("enterprise_id").or_else(|| lookup_str(body, &["enterprise_id"]));

    let user_id = lookup_str(body, &["event", "user"])
        .or_else(|| lookup_str(body, &["event", "user", "id"]))
        .or_else(|| lookup_str(body, &["event", "message", "user"]))
        .or_else(|| lookup_str(body, &["event", "previous_message", "user"]));

    (team_id, enterprise_id, user_id)
}

/// Interactive payloads: nested `team`/`enterprise`/`user` objects, with the
/// view's and the user's team as fallbacks for org-wide installs.
fn interactive_ids(body: &Value) -> (Option<&str>, Option<&str>, Option<&str>) {
    let team_id = lookup_str(body, &["team", "id"])
        .or_else(|| lookup_str(body, &["view", "team_id"]))
        .or_else(|| lookup_str(body, &["user", "team_id"]))
        .or_else(|| lookup_str(body, &["team_id"]));
    let enterprise_id = lookup_str(body, &["enterprise", "id"])
        .or_else(|| lookup_str(body, &["team", "enterprise_id"]))
        .or_else(|| lookup_str(body, &["enterprise_id"]));
    let user_id = lookup_str(body, &["user", "id"])
        .or_else(|| lookup_str(body, &["user"]))
        .or_else(|| lookup_str(body, &["user_id"]));
    (team_id, enterprise_id, user_id)
}

/// Whether the body comes from an org-wide installation.
///
/// Checks the first authorization's flag, then a `"true"`/`"false"` string
/// field (slash commands), then a boolean field. Defaults to `false`.
pub fn is_enterprise_install(body: &Value) -> bool {
    let from_authorizations = body
        .get("authorizations")
        .and_then(Value::as_array)
        .and_then(|authorizations| authorizations.first())
        .and_then(|authorization| authorization.get("is_enterprise_install"))
        .and_then(Value::as_bool);
    if let Some(flag) = from_authorizations {
        return flag;
    }
    match body.get("is_enterprise_install") {
        Some(Value::String(flag)) => flag == "true",
        Some(Value::Bool(flag)) => *flag,
        _ => false,
    }
}

/// Whether the body must be authorized through the authorizer.
pub fn needs_authorization(kind: IncomingEventType, body: &Value) -> bool {
    if kind != IncomingEventType::Event {
        return true;
    }
    let event_type = lookup_str(body, &["event", "type"]).unwrap_or_default();
    !SELF_DESCRIBING_EVENTS.contains(&event_type)
}

/// The result used for events that skip the authorizer.
pub fn synthesized_result(source: &AuthorizeSourceData) -> AuthorizeResult {
    AuthorizeResult {
        team_id: source.team_id.clone(),
        enterprise_id: source.enterprise_id.clone(),
        ..AuthorizeResult::default()
    }
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: Option<String>,
    bot_id: Option<String>,
    team_id: Option<String>,
    enterprise_id: Option<String>,
}

/// Authorization for an app installed in a single workspace.
///
/// With verification enabled the token is checked with `auth.test` once; the
/// result is cached, failures are not. With verification disabled no call is
/// made and the configured bot ids are used.
pub struct SingleTeamAuthorizer {
    token: String,
    bot_id: Option<String>,
    bot_user_id: Option<String>,
    verification: Option<SharedClient>,
    verified: OnceCell<AuthorizeResult>,
}

impl SingleTeamAuthorizer {
    /// An authorizer that verifies `token` through `client`.
    pub fn verified(token: impl Into<String>, client: SharedClient) -> Self {
        Self {
            token: token.into(),
            bot_id: None,
            bot_user_id: None,
            verification: Some(client),
            verified: OnceCell::new(),
        }
    }

    /// An authorizer that trusts the configured ids.
    pub fn unverified(
        token: impl Into<String>,
        bot_id: Option<String>,
        bot_user_id: Option<String>,
    ) -> Self {
        Self {
            token: token.into(),
            bot_id,
            bot_user_id,
            verification: None,
            verified: OnceCell::new(),
        }
    }

    async fn verify(&self, client: &SharedClient) -> Result<AuthorizeResult, BoxError> {
        tracing::debug!("verifying single-workspace token with auth.test");
        let response = client.call("auth.test", json!({})).await?;
        let identity: AuthTestResponse = serde_json::from_value(response)?;
        Ok(AuthorizeResult {
            bot_token: Some(self.token.clone()),
            bot_id: identity.bot_id,
            bot_user_id: identity.user_id,
            team_id: identity.team_id,
            enterprise_id: identity.enterprise_id,
            ..AuthorizeResult::default()
        })
    }
}

#[async_trait]
impl Authorize for SingleTeamAuthorizer {
    async fn authorize(
        &self,
        _source: &AuthorizeSourceData,
        _body: &Value,
    ) -> Result<AuthorizeResult, BoxError> {
        match &self.verification {
            Some(client) => self
                .verified
                .get_or_try_init(|| self.verify(client))
                .await
                .cloned(),
            None => Ok(AuthorizeResult {
                bot_token: Some(self.token.clone()),
                bot_id: self.bot_id.clone(),
                bot_user_id: self.bot_user_id.clone(),
                ..AuthorizeResult::default()
            }),
        }
    }
}

/// How the app resolves credentials.
#[derive(Clone)]
pub(crate) struct Authorizer {
    inner: Arc<dyn Authorize>,
}

impl Authorizer {
    pub(crate) fn new(inner: Arc<dyn Authorize>) -> Self {
        Self { inner }
    }

    /// Resolves credentials, bypassing the authorizer for self-describing events.
    pub(crate) async fn resolve(
        &self,
        kind: IncomingEventType,
        source: &AuthorizeSourceData,
        body: &Value,
    ) -> Result<AuthorizeResult, BoxError> {
        if !needs_authorization(kind, body) {
            return Ok(synthesized_result(source));
        }
        self.inner.authorize(source, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slackline_std::testing::RecordingClient;

    #[test]
    fn test_event_source_prefers_authorizations() {
        let body = json!({
            "team_id": "T_TOP",
            "enterprise_id": "E_TOP",
            "authorizations": [{"team_id": "T_AUTH", "enterprise_id": null, "is_enterprise_install": true}],
            "event": {"type": "message", "user": "U1", "channel": "C1"}
        });
        let source = build_source(IncomingEventType::Event, &body, Some("C1"));
        assert_eq!(source.team_id.as_deref(), Some("T_AUTH"));
        assert_eq!(source.enterprise_id.as_deref(), Some("E_TOP"));
        assert_eq!(source.user_id.as_deref(), Some("U1"));
        assert_eq!(source.conversation_id.as_deref(), Some("C1"));
        assert!(source.is_enterprise_install);
    }

    #[test]
    fn test_command_source_uses_flat_fields() {
        let body = json!({
            "command": "/deploy",
            "team_id": "T1",
            "enterprise_id": "E1",
            "user_id": "U1",
            "is_enterprise_install": "true"
        });
        let source = build_source(IncomingEventType::Command, &body, None);
        assert_eq!(source.team_id.as_deref(), Some("T1"));
        assert_eq!(source.enterprise_id.as_deref(), Some("E1"));
        assert_eq!(source.user_id.as_deref(), Some("U1"));
        assert!(source.is_enterprise_install);
    }

    #[test]
    fn test_interactive_source_for_org_wide_install() {
        let body = json!({
            "type": "view_submission",
            "team": null,
            "enterprise": {"id": "E1"},
            "user": {"id": "U1", "team_id": "T_USER"},
            "view": {"team_id": "T_VIEW"},
            "is_enterprise_install": true
        });
        let source = build_source(IncomingEventType::ViewAction, &body, None);
        assert_eq!(source.team_id.as_deref(), Some("T_VIEW"));
        assert_eq!(source.enterprise_id.as_deref(), Some("E1"));
        assert_eq!(source.user_id.as_deref(), Some("U1"));
        assert!(source.is_enterprise_install);
    }

    #[test]
    fn test_enterprise_install_defaults_to_false() {
        assert!(!is_enterprise_install(&json!({"is_enterprise_install": "false"})));
        assert!(!is_enterprise_install(&json!({"is_enterprise_install": 1})));
        assert!(!is_enterprise_install(&json!({})));
    }

    #[test]
    fn test_self_describing_events_skip_authorization() {
        let revoked = json!({"event": {"type": "tokens_revoked"}});
        assert!(!needs_authorization(IncomingEventType::Event, &revoked));
        let message = json!({"event": {"type": "message"}});
        assert!(needs_authorization(IncomingEventType::Event, &message));
        assert!(needs_authorization(IncomingEventType::Command, &revoked));
    }

    #[tokio::test]
    async fn test_single_team_verifies_once() {
        let client = RecordingClient::with_token("xoxb-1");
        client.set_response(json!({
            "ok": true, "user_id": "U_BOT", "bot_id": "B1", "team_id": "T1"
        }));
        let authorizer = SingleTeamAuthorizer::verified("xoxb-1", Arc::new(client.clone()));
        let source = AuthorizeSourceData::default();

        let first = authorizer.authorize(&source, &json!({})).await.unwrap();
        let second = authorizer.authorize(&source, &json!({})).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.bot_user_id.as_deref(), Some("U_BOT"));
        assert_eq!(first.bot_token.as_deref(), Some("xoxb-1"));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_single_team_without_verification() {
        let authorizer =
            SingleTeamAuthorizer::unverified("xoxb-1", Some("B1".into()), Some("U_BOT".into()));
        let result = authorizer
            .authorize(&AuthorizeSourceData::default(), &json!({}))
            .await
            .unwrap();
        assert_eq!(result.bot_id.as_deref(), Some("B1"));
        assert_eq!(result.team_id, None);
    }
}
