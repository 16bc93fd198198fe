//! # Event Dispatcher
//!
//! [`App`] owns the registration tables (global middleware, listener chains,
//! error handler) and processes every [`ReceiverEvent`]:
//!
//! 1. classify the body; unrecognizable bodies are logged and dropped;
//! 2. derive the authorization source and resolve credentials;
//! 3. build the [`Context`] and the listener [`Args`];
//! 4. acknowledge Events API callbacks;
//! 5. run the global middleware, then every listener chain concurrently;
//! 6. hand any failure to the error handler.
//!
//! Registration is append-only: there is no way to remove a listener.

use crate::{
    authorization::{Authorizer, SingleTeamAuthorizer, build_source},
    client::{ClientFactory, ClientPools, WebClientFactory},
    error_handler::{ErrorHandler, ErrorHandlerArgs},
    options::{AppOptions, StoreChoice},
    receiver::Receiver,
    reply::{respond_for, response_url, say_for},
};
use futures::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use slackline_core::{
    Args, AuthorizeResult, AuthorizeSourceData, BoxError, BoxMiddleware, Chain, ConstraintKey,
    Constraints, Context, Error, IncomingEventType, IntoListener, ListenerChain, Matcher,
    Middleware, PipelineError, ReceiverEvent, Selector, Terminal, boxed, classify, process,
};
use slackline_std::{
    conversation::{MemoryStore, conversation_context, shared_conversation_context},
    filters::{
        only_actions, only_commands, only_events, only_options, only_shortcuts, only_view_actions,
    },
    matchers::{match_command_name, match_constraints, match_event_type, match_message},
    message::ignore_self,
};
use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};
use tracing::Instrument;

const ACTION_KEYS: &[ConstraintKey] = &[
    ConstraintKey::Type,
    ConstraintKey::BlockId,
    ConstraintKey::ActionId,
    ConstraintKey::CallbackId,
];
const OPTIONS_KEYS: &[ConstraintKey] = &[
    ConstraintKey::Type,
    ConstraintKey::ActionId,
    ConstraintKey::CallbackId,
];
const CALLBACK_KEYS: &[ConstraintKey] = &[ConstraintKey::Type, ConstraintKey::CallbackId];
const VIEW_TYPES: &[&str] = &["view_submission", "view_closed"];

/// The event dispatcher.
pub struct App {
    middleware: Chain,
    listeners: Arc<Vec<ListenerChain>>,
    error_handler: ErrorHandler,
    authorizer: Authorizer,
    clients: ClientPools,
    http: reqwest::Client,
    receiver: Option<Arc<dyn Receiver>>,
}

impl App {
    /// Builds an app.
    ///
    /// Fails with [`Error::AppInitialization`] unless exactly one of a token
    /// and an authorize function is configured.
    pub fn new(options: AppOptions) -> Result<Self, Error> {
        let web = WebClientFactory::new(options.client_options.clone())?;
        let http = web.http().clone();
        let factory: Arc<dyn ClientFactory> = match options.client_factory {
            Some(factory) => factory,
            None => Arc::new(web),
        };

        let authorizer = match (options.token, options.authorize) {
            (Some(_), Some(_)) => {
                return Err(Error::AppInitialization(
                    "both a token and an authorize function were provided; use only one".into(),
                ));
            }
            (None, None) => {
                return Err(Error::AppInitialization(
                    "either a token or an authorize function is required".into(),
                ));
            }
            (None, Some(authorize)) => Authorizer::new(authorize),
            (Some(token), None) if options.token_verification => {
                let client = factory.create(Some(token.as_str()), None);
                Authorizer::new(Arc::new(SingleTeamAuthorizer::verified(token, client)))
            }
            (Some(token), None) => Authorizer::new(Arc::new(SingleTeamAuthorizer::unverified(
                token,
                options.bot_id,
                options.bot_user_id,
            ))),
        };

        let mut middleware: Vec<BoxMiddleware> = Vec::new();
        if options.ignore_self {
            middleware.push(boxed(ignore_self()));
        }
        match options.conversation_store {
            StoreChoice::Memory => middleware.push(boxed(conversation_context(MemoryStore::new()))),
            StoreChoice::Custom(store) => middleware.push(boxed(shared_conversation_context(store))),
            StoreChoice::Disabled => {}
        }

        Ok(Self {
            middleware: middleware.into(),
            listeners: Arc::new(Vec::new()),
            error_handler: ErrorHandler::default(),
            authorizer,
            clients: ClientPools::new(factory),
            http,
            receiver: options.receiver,
        })
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Adds a global middleware, run for every event before the listeners.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        let mut chain = self.middleware.to_vec();
        chain.push(boxed(middleware));
        self.middleware = chain.into();
        self
    }

    /// Listens for Events API callbacks of a type.
    ///
    /// `message.*` subtypes are not event types; filter messages with
    /// [`message`](Self::message) or [`subtype`](slackline_std::message::subtype).
    pub fn event(
        &mut self,
        event_type: impl Into<Matcher>,
        listener: impl IntoListener,
    ) -> Result<&mut Self, Error> {
        let event_type = event_type.into();
        let invalid = match &event_type {
            Matcher::Exact(name) => name.starts_with("message."),
            Matcher::Pattern(regex) => regex.as_str().starts_with(r"message\."),
            Matcher::Predicate(_) => false,
        };
        if invalid {
            return Err(Error::AppInitialization(
                "`message.*` is not a valid event type; use `message` with the `subtype` middleware"
                    .into(),
            ));
        }
        Ok(self.attach(
            listener,
            vec![boxed(only_events()), boxed(match_event_type(event_type))],
        ))
    }

    /// Listens for `message` events whose text matches `pattern`.
    ///
    /// Strings match as substrings; regex captures are stored as `matches`.
    pub fn message(&mut self, pattern: impl Into<Matcher>, listener: impl IntoListener) -> &mut Self {
        self.attach(
            listener,
            vec![
                boxed(only_events()),
                boxed(match_event_type("message")),
                boxed(match_message(pattern)),
            ],
        )
    }

    /// Listens for every `message` event.
    pub fn any_message(&mut self, listener: impl IntoListener) -> &mut Self {
        self.attach(
            listener,
            vec![boxed(only_events()), boxed(match_event_type("message"))],
        )
    }

    /// Listens for a slash command.
    pub fn command(&mut self, name: impl Into<Matcher>, listener: impl IntoListener) -> &mut Self {
        self.attach(
            listener,
            vec![boxed(only_commands()), boxed(match_command_name(name))],
        )
    }

    /// Listens for interactive actions. A bare id selects on `action_id`.
    pub fn action(&mut self, selector: impl Into<Selector>, listener: impl IntoListener) -> &mut Self {
        let constraints = match selector.into() {
            Selector::Id(id) => Constraints::new().action_id(id),
            Selector::Constraints(constraints) => constraints,
        };
        if !valid_keys("action", &constraints, ACTION_KEYS) {
            return self;
        }
        self.attach(
            listener,
            vec![boxed(only_actions()), boxed(match_constraints(constraints))],
        )
    }

    /// Listens for shortcuts. A bare id selects on `callback_id`.
    pub fn shortcut(&mut self, selector: impl Into<Selector>, listener: impl IntoListener) -> &mut Self {
        let constraints = match selector.into() {
            Selector::Id(id) => Constraints::new().callback_id(id),
            Selector::Constraints(constraints) => constraints,
        };
        if !valid_keys("shortcut", &constraints, CALLBACK_KEYS) {
            return self;
        }
        self.attach(
            listener,
            vec![boxed(only_shortcuts()), boxed(match_constraints(constraints))],
        )
    }

    /// Listens for view submissions and closures.
    ///
    /// A bare id selects `view_submission`s by `callback_id`.
    pub fn view(&mut self, selector: impl Into<Selector>, listener: impl IntoListener) -> &mut Self {
        let constraints = match selector.into() {
            Selector::Id(id) => Constraints::new()
                .callback_id(id)
                .with_type("view_submission"),
            Selector::Constraints(constraints) => constraints,
        };
        if !valid_keys("view", &constraints, CALLBACK_KEYS) {
            return self;
        }
        if let Some(kind) = constraints.kind.as_deref() {
            if !VIEW_TYPES.contains(&kind) {
                tracing::error!(
                    kind,
                    "view listener not attached: type must be view_submission or view_closed"
                );
                return self;
            }
        }
        self.attach(
            listener,
            vec![boxed(only_view_actions()), boxed(match_constraints(constraints))],
        )
    }

    /// Listens for options requests. A bare id selects on `action_id`.
    pub fn options(&mut self, selector: impl Into<Selector>, listener: impl IntoListener) -> &mut Self {
        let constraints = match selector.into() {
            Selector::Id(id) => Constraints::new().action_id(id),
            Selector::Constraints(constraints) => constraints,
        };
        if !valid_keys("options", &constraints, OPTIONS_KEYS) {
            return self;
        }
        self.attach(
            listener,
            vec![boxed(only_options()), boxed(match_constraints(constraints))],
        )
    }

    /// Registers a listener with no routing middleware: it sees every event.
    pub fn listen(&mut self, listener: impl IntoListener) -> &mut Self {
        self.attach(listener, Vec::new())
    }

    /// Installs an error handler receiving the coded error.
    ///
    /// Returning `Ok(())` swallows the error; returning it hands it back to
    /// the receiver.
    pub fn error<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Error) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.error_handler = ErrorHandler::basic(handler);
        self
    }

    /// Installs an error handler receiving the error with the event body and context.
    pub fn extended_error<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(ErrorHandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.error_handler = ErrorHandler::extended(handler);
        self
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// The per-tenant client pools.
    pub fn clients(&self) -> &ClientPools {
        &self.clients
    }

    fn attach(&mut self, listener: impl IntoListener, routing: Vec<BoxMiddleware>) -> &mut Self {
        let chain = listener.into_listener().guarded_by(routing).seal();
        Arc::make_mut(&mut self.listeners).push(chain);
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initializes and starts the receiver.
    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        let receiver = self.receiver()?;
        receiver.init(Arc::clone(self));
        receiver.start().await.map_err(Error::from_boxed)
    }

    /// Stops the receiver.
    pub async fn stop(&self) -> Result<(), Error> {
        self.receiver()?.stop().await.map_err(Error::from_boxed)
    }

    fn receiver(&self) -> Result<&Arc<dyn Receiver>, Error> {
        self.receiver
            .as_ref()
            .ok_or_else(|| Error::AppInitialization("no receiver is configured".into()))
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Processes one event end to end.
    ///
    /// Returns `Ok(())` for unrecognizable bodies. Fails with
    /// [`Error::InvalidCustomProperty`] when the receiver's custom properties
    /// shadow built-in context keys, and with whatever the error handler
    /// returns for every other failure.
    pub async fn process_event(&self, event: ReceiverEvent) -> Result<(), Error> {
        let classification = classify(&event.body);
        let Some(kind) = classification.kind() else {
            tracing::warn!("could not determine the type of an incoming event; no listeners will be called");
            return Ok(());
        };
        let span = tracing::debug_span!("process_event", kind = %kind, retry_num = ?event.retry_num);
        let conversation_id = classification.conversation_id().map(str::to_owned);
        self.dispatch(kind, conversation_id, event)
            .instrument(span)
            .await
    }

    async fn dispatch(
        &self,
        kind: IncomingEventType,
        conversation_id: Option<String>,
        event: ReceiverEvent,
    ) -> Result<(), Error> {
        let ReceiverEvent {
            body,
            ack,
            retry_num,
            retry_reason,
            custom_properties,
        } = event;

        let source = build_source(kind, &body, conversation_id.as_deref());
        let mut auth = match self.authorizer.resolve(kind, &source, &body).await {
            Ok(auth) => auth,
            Err(err) => {
                tracing::warn!(error = %err, "authorization of incoming event did not succeed; no listeners will be called");
                let error = Error::Authorization(err);
                let context = unauthorized_context(&source, retry_num, retry_reason);
                return self
                    .error_handler
                    .handle(ErrorHandlerArgs {
                        error,
                        body,
                        context,
                    })
                    .await;
            }
        };
        if auth.team_id.is_none() {
            auth.team_id = source.team_id.clone();
        }
        if auth.enterprise_id.is_none() {
            auth.enterprise_id = source.enterprise_id.clone();
        }

        let context = Context::builder(auth)
            .enterprise_install(source.is_enterprise_install)
            .retry_num(retry_num)
            .retry_reason(retry_reason)
            .custom_properties(custom_properties)
            .build()?;

        let client = self.clients.select(&context);
        let mut builder = Args::builder(kind, body.clone(), context.clone())
            .client(Arc::clone(&client))
            .span(tracing::Span::current());
        if let Some(conversation_id) = conversation_id {
            if kind != IncomingEventType::Options {
                builder = builder.say(say_for(client, conversation_id));
            }
        }
        if let Some(url) = response_url(&body) {
            builder = builder.respond(respond_for(self.http.clone(), url.to_owned()));
        }
        if kind == IncomingEventType::Event {
            ack.ack().await.map_err(Error::from_boxed)?;
        } else {
            builder = builder.ack(ack);
        }
        let args = builder.build();

        let terminal = fan_out(Arc::clone(&self.listeners));
        let outcome = AssertUnwindSafe(process(Arc::clone(&self.middleware), args, Some(terminal)))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked(panic)));

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error_handler
                    .handle(ErrorHandlerArgs {
                        error: Error::from_boxed(err),
                        body,
                        context: Some(context),
                    })
                    .await
            }
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("middleware", &self.middleware.len())
            .field("listeners", &self.listeners.len())
            .field("receiver", &self.receiver.is_some())
            .finish_non_exhaustive()
    }
}

/// A context carrying only what the payload itself says about the tenant.
fn unauthorized_context(
    source: &AuthorizeSourceData,
    retry_num: Option<u32>,
    retry_reason: Option<String>,
) -> Option<Context> {
    let auth = AuthorizeResult {
        team_id: source.team_id.clone(),
        enterprise_id: source.enterprise_id.clone(),
        user_id: source.user_id.clone(),
        ..AuthorizeResult::default()
    };
    Context::builder(auth)
        .enterprise_install(source.is_enterprise_install)
        .retry_num(retry_num)
        .retry_reason(retry_reason)
        .build()
        .ok()
}

fn valid_keys(listener: &str, constraints: &Constraints, allowed: &[ConstraintKey]) -> bool {
    let rejected: Vec<&str> = constraints
        .keys()
        .into_iter()
        .filter(|key| !allowed.contains(key))
        .map(ConstraintKey::as_str)
        .collect();
    if rejected.is_empty() {
        return true;
    }
    tracing::error!(
        listener,
        keys = %rejected.join(", "),
        "listener not attached: constraints contain keys it does not support"
    );
    false
}

/// The terminal step of the global chain: every listener chain, concurrently.
///
/// One failure is returned as is, several are aggregated.
fn fan_out(listeners: Arc<Vec<ListenerChain>>) -> Terminal {
    Arc::new(move |args: Args| -> BoxFuture<'static, Result<(), BoxError>> {
        let listeners = Arc::clone(&listeners);
        async move {
            let runs = listeners.iter().map(|listener| {
                AssertUnwindSafe(listener.run(args.clone()))
                    .catch_unwind()
                    .map(settle)
            });
            let mut failures: Vec<BoxError> = join_all(runs)
                .await
                .into_iter()
                .filter_map(Result::err)
                .collect();
            match failures.len() {
                0 => Ok(()),
                1 => Err(failures.remove(0)),
                _ => Err(Error::MultipleListeners(failures).into()),
            }
        }
        .boxed()
    })
}

fn settle(outcome: Result<Result<(), BoxError>, Box<dyn Any + Send>>) -> Result<(), BoxError> {
    outcome.unwrap_or_else(|panic| Err(panicked(panic)))
}

fn panicked(panic: Box<dyn Any + Send>) -> BoxError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    tracing::error!(%message, "listener panicked");
    PipelineError::Panicked(message).into()
}
