//! # Event Context
//!
//! The per-event bag shared by every middleware and listener that sees one
//! event. Built-in keys come from authorization and from the receiver; custom
//! keys come from the receiver's custom properties and from middleware.
//!
//! Built-in keys are read-only: custom properties that try to shadow them are
//! rejected when the context is built, and [`Context::insert`] refuses them
//! afterwards.
//!
//! Besides JSON values the context carries typed extensions (see
//! [`Context::insert_extension`]), which is how middleware hand non-serializable
//! helpers such as store handles to listeners.

use crate::{authorize::AuthorizeResult, error::Error};
use serde_json::{Map, Value};
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Keys owned by the dispatcher. Custom properties may not use them.
pub const RESERVED_KEYS: &[&str] = &[
    "bot_token",
    "user_token",
    "bot_id",
    "bot_user_id",
    "team_id",
    "enterprise_id",
    "user_id",
    "is_enterprise_install",
    "retry_num",
    "retry_reason",
];

/// Whether `key` is one of [`RESERVED_KEYS`].
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

type Extensions = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

struct ContextInner {
    auth: AuthorizeResult,
    is_enterprise_install: bool,
    retry_num: Option<u32>,
    retry_reason: Option<String>,
    values: RwLock<Map<String, Value>>,
    extensions: RwLock<Extensions>,
}

/// Per-event context. Clones share the same underlying state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

/// Builder for [`Context`].
#[derive(Debug, Default)]
pub struct ContextBuilder {
    auth: AuthorizeResult,
    is_enterprise_install: bool,
    retry_num: Option<u32>,
    retry_reason: Option<String>,
    custom: Map<String, Value>,
}

impl ContextBuilder {
    /// Marks the event as coming from an org-wide installation.
    pub fn enterprise_install(mut self, is_enterprise_install: bool) -> Self {
        self.is_enterprise_install = is_enterprise_install;
        self
    }

    /// Sets the delivery retry attempt number.
    pub fn retry_num(mut self, retry_num: Option<u32>) -> Self {
        self.retry_num = retry_num;
        self
    }

    /// Sets the reason the platform gave for the retry.
    pub fn retry_reason(mut self, retry_reason: Option<String>) -> Self {
        self.retry_reason = retry_reason;
        self
    }

    /// Adds the receiver's custom properties.
    pub fn custom_properties(mut self, custom: Map<String, Value>) -> Self {
        self.custom.extend(custom);
        self
    }

    /// Builds the context.
    ///
    /// Fails with [`Error::InvalidCustomProperty`] naming every custom key
    /// that collides with a built-in key.
    pub fn build(self) -> Result<Context, Error> {
        let mut collisions: Vec<&str> = self
            .custom
            .keys()
            .map(String::as_str)
            .filter(|key| is_reserved(key))
            .collect();
        if !collisions.is_empty() {
            collisions.sort_unstable();
            return Err(Error::InvalidCustomProperty(format!(
                "custom properties cannot override built-in keys: {}",
                collisions.join(", ")
            )));
        }

        let mut values: Map<String, Value> = self
            .auth
            .extra
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        values.extend(self.custom);

        Ok(Context {
            inner: Arc::new(ContextInner {
                auth: self.auth,
                is_enterprise_install: self.is_enterprise_install,
                retry_num: self.retry_num,
                retry_reason: self.retry_reason,
                values: RwLock::new(values),
                extensions: RwLock::new(HashMap::new()),
            }),
        })
    }
}

impl Context {
    /// Starts a context from an authorization result.
    pub fn builder(auth: AuthorizeResult) -> ContextBuilder {
        ContextBuilder {
            auth,
            ..ContextBuilder::default()
        }
    }

    /// Bot token for the event's tenant.
    pub fn bot_token(&self) -> Option<&str> {
        self.inner.auth.bot_token.as_deref()
    }

    /// User token for the event's tenant.
    pub fn user_token(&self) -> Option<&str> {
        self.inner.auth.user_token.as_deref()
    }

    /// The token API calls use: the bot token, else the user token.
    pub fn token(&self) -> Option<&str> {
        self.inner.auth.token()
    }

    /// Bot id of this app.
    pub fn bot_id(&self) -> Option<&str> {
        self.inner.auth.bot_id.as_deref()
    }

    /// Bot user id of this app.
    pub fn bot_user_id(&self) -> Option<&str> {
        self.inner.auth.bot_user_id.as_deref()
    }

    /// Workspace id.
    pub fn team_id(&self) -> Option<&str> {
        self.inner.auth.team_id.as_deref()
    }

    /// Enterprise organization id.
    pub fn enterprise_id(&self) -> Option<&str> {
        self.inner.auth.enterprise_id.as_deref()
    }

    /// Id of the user owning the user token.
    pub fn user_id(&self) -> Option<&str> {
        self.inner.auth.user_id.as_deref()
    }

    /// Whether the app is installed org-wide.
    pub fn is_enterprise_install(&self) -> bool {
        self.inner.is_enterprise_install
    }

    /// Delivery retry attempt number.
    pub fn retry_num(&self) -> Option<u32> {
        self.inner.retry_num
    }

    /// Reason for the delivery retry.
    pub fn retry_reason(&self) -> Option<&str> {
        self.inner.retry_reason.as_deref()
    }

    /// Reads a key. Built-in keys are served from their typed fields.
    pub fn get(&self, key: &str) -> Option<Value> {
        if is_reserved(key) {
            return self.builtin(key);
        }
        self.inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Whether a custom key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Stores a custom key, returning the previous value.
    ///
    /// Built-in keys are rejected with [`Error::InvalidCustomProperty`].
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>, Error> {
        let key = key.into();
        if is_reserved(&key) {
            return Err(Error::InvalidCustomProperty(format!(
                "`{key}` is a built-in context key"
            )));
        }
        Ok(self
            .inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.into()))
    }

    /// Removes a custom key.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// A snapshot of the custom keys.
    pub fn custom_values(&self) -> Map<String, Value> {
        self.inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs a typed extension, replacing any previous one of the same type.
    pub fn insert_extension<T: Send + Sync + 'static>(&self, value: T) {
        self.inner
            .extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Fetches a typed extension.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let ext = self
            .inner
            .extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned()?;
        ext.downcast::<T>().ok()
    }

    fn builtin(&self, key: &str) -> Option<Value> {
        let auth = &self.inner.auth;
        let text = |field: &Option<String>| field.clone().map(Value::String);
        match key {
            "bot_token" => text(&auth.bot_token),
            "user_token" => text(&auth.user_token),
            "bot_id" => text(&auth.bot_id),
            "bot_user_id" => text(&auth.bot_user_id),
            "team_id" => text(&auth.team_id),
            "enterprise_id" => text(&auth.enterprise_id),
            "user_id" => text(&auth.user_id),
            "is_enterprise_install" => Some(Value::Bool(self.inner.is_enterprise_install)),
            "retry_num" => self.inner.retry_num.map(Value::from),
            "retry_reason" => text(&self.inner.retry_reason),
            _ => None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context {
            inner: Arc::new(ContextInner {
                auth: AuthorizeResult::default(),
                is_enterprise_install: false,
                retry_num: None,
                retry_reason: None,
                values: RwLock::new(Map::new()),
                extensions: RwLock::new(HashMap::new()),
            }),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("team_id", &self.team_id())
            .field("enterprise_id", &self.enterprise_id())
            .field("bot_id", &self.bot_id())
            .field("is_enterprise_install", &self.is_enterprise_install())
            .field("retry_num", &self.retry_num())
            .field("values", &self.custom_values())
            .finish_non_exhaustive()
    }
}
