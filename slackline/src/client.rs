//! # Web API Clients
//!
//! [`WebClient`] is the reqwest-backed [`ApiClient`]. [`ClientPools`] hands
//! every event the client for its tenant and token:
//!
//! - one [`WebClientPool`] per tenant key (team id, else enterprise id);
//! - one client per distinct token inside a pool, created on first use and
//!   kept for the life of the pool;
//! - events with no token, or no tenant, share one tokenless default client.

use crate::options::ClientOptions;
use async_trait::async_trait;
use serde_json::Value;
use slackline_core::{ApiClient, BoxError, Context, Error, SharedClient};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

/// Failures of the reqwest-backed client.
#[derive(Error, Debug)]
pub enum WebApiError {
    /// The request could not be sent or its body could not be read.
    #[error("request to `{method}` failed: {source}")]
    Transport {
        /// API method.
        method: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The platform answered with a non-success HTTP status.
    #[error("`{method}` returned HTTP {status}")]
    Status {
        /// API method.
        method: String,
        /// HTTP status code.
        status: u16,
    },

    /// The platform answered `ok: false`.
    #[error("`{method}` failed: {error}")]
    Platform {
        /// API method.
        method: String,
        /// The platform's error code.
        error: String,
    },
}

/// A Web API client bound to at most one token.
#[derive(Debug, Clone)]
pub struct WebClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
    team_id: Option<String>,
}

impl WebClient {
    /// Creates a client sharing the connection pool of `http`.
    pub fn new(
        http: reqwest::Client,
        options: &ClientOptions,
        token: Option<String>,
        team_id: Option<String>,
    ) -> Self {
        Self {
            http,
            api_url: options.api_url.trim_end_matches('/').to_owned(),
            token,
            team_id,
        }
    }

    /// The workspace this client adds to every call.
    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }
}

#[async_trait]
impl ApiClient for WebClient {
    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    async fn call(&self, method: &str, mut params: Value) -> Result<Value, BoxError> {
        if let (Some(team_id), Some(fields)) = (&self.team_id, params.as_object_mut()) {
            fields
                .entry("team_id")
                .or_insert_with(|| Value::String(team_id.clone()));
        }

        let mut request = self
            .http
            .post(format!("{}/{method}", self.api_url))
            .json(&params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let transport = |source| WebApiError::Transport {
            method: method.to_owned(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebApiError::Status {
                method: method.to_owned(),
                status: status.as_u16(),
            }
            .into());
        }

        let body: Value = response.json().await.map_err(transport)?;
        if body.get("ok").and_then(Value::as_bool) == Some(false) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(WebApiError::Platform {
                method: method.to_owned(),
                error: error.to_owned(),
            }
            .into());
        }
        Ok(body)
    }
}

/// Creates clients for the pool.
pub trait ClientFactory: Send + Sync + 'static {
    /// A client for `token` in workspace `team_id`.
    fn create(&self, token: Option<&str>, team_id: Option<&str>) -> SharedClient;
}

/// The default [`ClientFactory`], producing [`WebClient`]s.
#[derive(Debug, Clone)]
pub struct WebClientFactory {
    http: reqwest::Client,
    options: ClientOptions,
}

impl WebClientFactory {
    /// Builds the shared HTTP client.
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("slackline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::AppInitialization(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http, options })
    }

    /// The shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

impl ClientFactory for WebClientFactory {
    fn create(&self, token: Option<&str>, team_id: Option<&str>) -> SharedClient {
        Arc::new(WebClient::new(
            self.http.clone(),
            &self.options,
            token.map(str::to_owned),
            team_id.map(str::to_owned),
        ))
    }
}

/// The clients of one tenant, keyed by token.
pub struct WebClientPool {
    tenant: String,
    clients: Mutex<HashMap<String, SharedClient>>,
}

impl WebClientPool {
    fn new(tenant: String) -> Self {
        Self {
            tenant,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The client for `token`, created with `factory` on first use.
    pub fn get_or_create(&self, token: &str, factory: &dyn ClientFactory) -> SharedClient {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let client = clients
            .entry(token.to_owned())
            .or_insert_with(|| factory.create(Some(token), Some(&self.tenant)));
        Arc::clone(client)
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no client was created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-tenant client pools plus the shared tokenless client.
pub struct ClientPools {
    factory: Arc<dyn ClientFactory>,
    default_client: SharedClient,
    tenants: Mutex<HashMap<String, Arc<WebClientPool>>>,
}

impl ClientPools {
    /// Creates the pools and the tokenless default client.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        let default_client = factory.create(None, None);
        Self {
            factory,
            default_client,
            tenants: Mutex::new(HashMap::new()),
        }
    }

    /// The shared tokenless client.
    pub fn default_client(&self) -> SharedClient {
        Arc::clone(&self.default_client)
    }

    /// The client for `token` within `tenant`.
    pub fn get_or_create(&self, tenant: &str, token: &str) -> SharedClient {
        let pool = {
            let mut tenants = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                tenants
                    .entry(tenant.to_owned())
                    .or_insert_with(|| Arc::new(WebClientPool::new(tenant.to_owned()))),
            )
        };
        pool.get_or_create(token, self.factory.as_ref())
    }

    /// The client for an event's merged context.
    pub fn select(&self, context: &Context) -> SharedClient {
        let tenant = context.team_id().or(context.enterprise_id());
        match (tenant, context.token()) {
            (Some(tenant), Some(token)) => self.get_or_create(tenant, token),
            _ => self.default_client(),
        }
    }

    /// Number of tenants with a pool.
    pub fn tenant_count(&self) -> usize {
        self.tenants.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
