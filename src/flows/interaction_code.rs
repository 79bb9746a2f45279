//! Interaction Code Flow
//!
//! `interact → introspect → [proceed]* → token exchange`, driven by the
//! remediations the server returns at every step.
//!
//! One caller operation runs at a time; a second one fails with
//! [`FlowError::OperationInProgress`]. `cancel` and `reset` are exempt and
//! supersede whatever is in flight: its result is dropped and it returns
//! [`FlowError::Superseded`].

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use crate::core::{
    generate_state, state_matches, DefaultPkceGenerator, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, IdxEndpoints, PkceGenerator, PkceMethod, PkceParams, ReqwestHttpTransport,
};
use crate::error::{create_error_from_response, FlowError, IdxError, IdxResult, ProtocolError};
use crate::flows::token_exchange;
use crate::flows::{FlowEvent, FlowListener, FlowState};
use crate::model::{Remediation, RemediationHandler, Response};
use crate::parser::{is_idx_document, ParseContext, ResponseParser};
use crate::types::{CallbackParams, Context, IdxConfig, RedirectResult, Token};

/// Interaction Code Flow interface.
#[async_trait]
pub trait InteractionCodeFlow: Send + Sync {
    /// Current state.
    fn state(&self) -> FlowState;

    /// Context of the interaction in progress.
    fn context(&self) -> Option<Context>;

    /// The response the flow is waiting on.
    fn current_response(&self) -> Option<Response>;

    /// Whether an interaction exists and has not reached a terminal state.
    fn is_authenticating(&self) -> bool;

    /// Register an event listener.
    fn add_listener(&self, listener: Arc<dyn FlowListener>);

    /// Begin a new interaction. `state` overrides the generated nonce.
    async fn start(&self, state: Option<String>) -> IdxResult<Response>;

    /// Re-read the current step of the interaction in progress.
    async fn resume(&self) -> IdxResult<Response>;

    /// Submit a remediation of the current response.
    async fn proceed(&self, remediation: &Remediation) -> IdxResult<Response>;

    /// Cancel the current step through the response's `cancel` remediation.
    ///
    /// The server answers with the first step of the interaction again; that
    /// response becomes current and can be proceeded. Use [`reset`] to
    /// abandon the interaction entirely.
    ///
    /// [`reset`]: InteractionCodeFlow::reset
    async fn cancel(&self) -> IdxResult<Response>;

    /// Exchange a successful response for tokens.
    async fn exchange_code(&self, response: &Response) -> IdxResult<Token>;

    /// Exchange the interaction code of a redirect callback for tokens.
    async fn exchange_redirect(&self, url: &str) -> IdxResult<Token>;

    /// Classify a redirect callback against the interaction in progress.
    fn redirect_result(&self, url: &str) -> RedirectResult;

    /// Abandon the interaction locally without contacting the server.
    fn reset(&self);
}

/// Interaction Code Flow implementation.
pub struct InteractionCodeFlowImpl<T: HttpTransport + 'static, P: PkceGenerator + 'static> {
    shared: Arc<FlowShared<T, P>>,
}

impl<T: HttpTransport + 'static, P: PkceGenerator + 'static> InteractionCodeFlowImpl<T, P> {
    /// Create a flow with no interaction in progress.
    pub fn new(config: IdxConfig, transport: Arc<T>, pkce: Arc<P>) -> Self {
        Self::build(config, None, transport, pkce)
    }

    /// Create a flow around a persisted context; call `resume` to continue.
    pub fn with_context(
        config: IdxConfig,
        context: Context,
        transport: Arc<T>,
        pkce: Arc<P>,
    ) -> Self {
        Self::build(config, Some(context), transport, pkce)
    }

    /// Use a custom response parser (extra decoders or capability factories).
    pub fn with_parser(self, parser: ResponseParser) -> Self {
        let shared = &self.shared;
        let config = shared.config.clone();
        let context = shared.lock().context.clone();
        let listeners = shared.listeners_snapshot();

        let flow = Self {
            shared: FlowShared::create(
                config,
                context,
                shared.transport.clone(),
                shared.pkce.clone(),
                parser,
            ),
        };
        for listener in listeners {
            flow.add_listener(listener);
        }
        flow
    }

    pub fn config(&self) -> &IdxConfig {
        &self.shared.config
    }

    fn build(config: IdxConfig, context: Option<Context>, transport: Arc<T>, pkce: Arc<P>) -> Self {
        Self {
            shared: FlowShared::create(config, context, transport, pkce, ResponseParser::new()),
        }
    }
}

impl<T: HttpTransport + 'static, P: PkceGenerator + 'static> Drop
    for InteractionCodeFlowImpl<T, P>
{
    fn drop(&mut self) {
        self.shared.stop_timers();
    }
}

#[async_trait]
impl<T: HttpTransport + 'static, P: PkceGenerator + 'static> InteractionCodeFlow
    for InteractionCodeFlowImpl<T, P>
{
    fn state(&self) -> FlowState {
        self.shared.lock().state
    }

    fn context(&self) -> Option<Context> {
        self.shared.lock().context.clone()
    }

    fn current_response(&self) -> Option<Response> {
        self.shared.lock().response.clone()
    }

    fn is_authenticating(&self) -> bool {
        self.shared.is_authenticating()
    }

    fn add_listener(&self, listener: Arc<dyn FlowListener>) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    async fn start(&self, state: Option<String>) -> IdxResult<Response> {
        self.shared.start(state, false).await
    }

    async fn resume(&self) -> IdxResult<Response> {
        self.shared.resume().await
    }

    async fn proceed(&self, remediation: &Remediation) -> IdxResult<Response> {
        self.shared.proceed(remediation).await
    }

    async fn cancel(&self) -> IdxResult<Response> {
        self.shared.cancel().await
    }

    async fn exchange_code(&self, response: &Response) -> IdxResult<Token> {
        self.shared.exchange_code(response).await
    }

    async fn exchange_redirect(&self, url: &str) -> IdxResult<Token> {
        self.shared.exchange_redirect(url).await
    }

    fn redirect_result(&self, url: &str) -> RedirectResult {
        self.shared.redirect_result(url)
    }

    fn reset(&self) {
        self.shared.reset();
    }
}

/// Flow over the reqwest transport and the system PKCE generator.
pub fn create_interaction_code_flow(
    config: IdxConfig,
) -> IdxResult<InteractionCodeFlowImpl<ReqwestHttpTransport, DefaultPkceGenerator>> {
    let transport = ReqwestHttpTransport::from_config(&config)?;
    Ok(InteractionCodeFlowImpl::new(
        config,
        Arc::new(transport),
        Arc::new(DefaultPkceGenerator::new()),
    ))
}

#[derive(Deserialize)]
struct InteractResponse {
    interaction_handle: Option<String>,
}

#[derive(Default)]
struct FlowInner {
    state: FlowState,
    context: Option<Context>,
    response: Option<Response>,
    /// Nonce the caller passed to `start`, reused by expiry restarts.
    requested_state: Option<String>,
    expiry_task: Option<JoinHandle<()>>,
}

struct FlowShared<T: HttpTransport + 'static, P: PkceGenerator + 'static> {
    config: IdxConfig,
    transport: Arc<T>,
    pkce: Arc<P>,
    parser: ResponseParser,
    inner: Mutex<FlowInner>,
    listeners: RwLock<Vec<Arc<dyn FlowListener>>>,
    busy: AtomicBool,
    epoch: AtomicU64,
    generation: AtomicU64,
    self_ref: Weak<Self>,
}

struct Busy<'a>(&'a AtomicBool);

impl<'a> Busy<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn is_superseded(error: &IdxError) -> bool {
    matches!(error, IdxError::Flow(FlowError::Superseded))
}

impl<T: HttpTransport + 'static, P: PkceGenerator + 'static> FlowShared<T, P> {
    fn create(
        config: IdxConfig,
        context: Option<Context>,
        transport: Arc<T>,
        pkce: Arc<P>,
        parser: ResponseParser,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            transport,
            pkce,
            parser,
            inner: Mutex::new(FlowInner {
                context,
                ..FlowInner::default()
            }),
            listeners: RwLock::new(Vec::new()),
            busy: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, FlowInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn FlowListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn emit(&self, event: FlowEvent) {
        trace!(event = event.kind(), "Flow event");
        for listener in self.listeners_snapshot() {
            listener.on_event(&event);
        }
    }

    fn fail<R>(&self, error: impl Into<IdxError>) -> IdxResult<R> {
        let error = error.into();
        warn!(code = error.error_code(), error = %error, "Flow operation failed");
        self.emit(FlowEvent::Error {
            code: error.error_code(),
            message: error.to_string(),
        });
        Err(error)
    }

    fn transition(&self, to: FlowState) {
        let from = std::mem::replace(&mut self.lock().state, to);
        self.notify_transition(from, to);
    }

    fn notify_transition(&self, from: FlowState, to: FlowState) {
        if from != to {
            debug!(from = %from, to = %to, "Flow state changed");
            self.emit(FlowEvent::StateChanged { from, to });
        }
    }

    fn is_authenticating(&self) -> bool {
        let inner = self.lock();
        inner.context.is_some() && !inner.state.is_terminal()
    }

    /// State to fall back to when an operation fails on the wire.
    fn stable_state(&self) -> FlowState {
        if self.lock().response.is_some() {
            FlowState::AwaitingRemediation
        } else {
            FlowState::Idle
        }
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Invalidate every operation in flight.
    fn supersede(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn check_epoch(&self, epoch: u64) -> IdxResult<()> {
        if self.epoch() != epoch {
            debug!("Dropping result of superseded operation");
            return Err(FlowError::Superseded.into());
        }
        Ok(())
    }

    fn handler(&self) -> Weak<dyn RemediationHandler> {
        let handler: Weak<dyn RemediationHandler> = self.self_ref.clone();
        handler
    }

    fn stop_timers(&self) {
        let mut inner = self.lock();
        if let Some(task) = inner.expiry_task.take() {
            task.abort();
        }
        if let Some(response) = &inner.response {
            response.stop_polling();
        }
    }

    fn start_polling(&self, response: &Response) {
        if !self.config.auto_poll {
            return;
        }
        for pollable in response.pollables() {
            if let Err(e) = pollable.start_polling() {
                warn!(remediation = %pollable.remediation().name, error = %e, "Cannot start polling");
            }
        }
    }

    /// Make `response` current and move to `state`.
    ///
    /// Fails with `Superseded` if the epoch moved since `epoch` was taken.
    fn adopt(
        &self,
        response: &Response,
        state: FlowState,
        arm_expiry: bool,
        epoch: u64,
    ) -> IdxResult<()> {
        let from = {
            let mut inner = self.lock();
            self.check_epoch(epoch)?;

            if let Some(old) = inner.response.take() {
                old.stop_polling();
            }
            if let Some(task) = inner.expiry_task.take() {
                task.abort();
            }
            inner.response = Some(response.clone());
            if state.is_terminal() {
                inner.context = None;
            }
            if arm_expiry && !state.is_terminal() {
                inner.expiry_task = self.schedule_expiry(response);
            }
            std::mem::replace(&mut inner.state, state)
        };

        if state == FlowState::AwaitingRemediation {
            self.start_polling(response);
        }
        self.notify_transition(from, state);
        self.emit(FlowEvent::Response(response.clone()));
        Ok(())
    }

    fn schedule_expiry(&self, response: &Response) -> Option<JoinHandle<()>> {
        if !self.config.auto_restart_on_expiry {
            return None;
        }
        let delay = response.time_until_expiry()?;
        let runtime = tokio::runtime::Handle::try_current().ok()?;

        let generation = response.generation();
        let flow = self.self_ref.clone();
        debug!(
            delay_ms = delay.as_millis() as u64,
            "Scheduling expiry restart"
        );

        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(flow) = flow.upgrade() {
                flow.restart_after_expiry(generation).await;
            }
        }))
    }

    fn restart_after_expiry(
        self: Arc<Self>,
        generation: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let (has_cancel, state_nonce) = {
                let mut inner = self.lock();
                let current = inner.response.as_ref().map(Response::generation);
                if current != Some(generation) || inner.state != FlowState::AwaitingRemediation {
                    return;
                }
                // detach so restarting does not abort this task
                inner.expiry_task.take();
                (
                    inner
                        .response
                        .as_ref()
                        .is_some_and(|r| r.cancel_remediation().is_some()),
                    inner.requested_state.clone(),
                )
            };
            if self.busy.load(Ordering::Acquire) {
                debug!("Response expired during an operation, not restarting");
                return;
            }

            info!("Response expired, restarting interaction");
            if has_cancel {
                if let Err(e) = self.cancel().await {
                    warn!(error = %e, "Cancel of expired interaction failed");
                }
            }
            if !self.lock().state.can_start() {
                self.reset();
            }
            if let Err(e) = self.start(state_nonce, true).await {
                warn!(error = %e, "Restart after expiry failed");
            }
        })
    }

    fn parse(&self, body: &str) -> IdxResult<Response> {
        let context = ParseContext {
            generation: self.generation.fetch_add(1, Ordering::AcqRel) + 1,
            handler: Some(self.handler()),
            default_poll_interval: self.config.default_poll_interval,
        };
        self.parser.parse(body, &self.config.version, &context)
    }

    fn ion_content_type(&self) -> String {
        format!("application/ion+json; okta-version={}", self.config.version)
    }

    async fn send(
        &self,
        method: HttpMethod,
        url: &Url,
        body: Option<String>,
        content_type: &str,
        accept: &str,
    ) -> IdxResult<HttpResponse> {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert("accept".to_string(), accept.to_string());

        trace!(method = method.as_str(), url = %url, "Sending IDX request");

        self.transport
            .send(HttpRequest {
                method,
                url: url.to_string(),
                headers,
                body,
                timeout: Some(self.config.timeout),
            })
            .await
    }

    /// Send an IDX request and parse the response document.
    ///
    /// Error statuses that still carry an IDX document are parsed like
    /// successes; their messages describe the failure.
    async fn send_idx(
        &self,
        method: HttpMethod,
        url: &Url,
        body: Option<String>,
        content_type: &str,
    ) -> IdxResult<Response> {
        let accept = self.ion_content_type();
        let response = self.send(method, url, body, content_type, &accept).await?;

        if response.is_success() || is_idx_document(&response.body) {
            return self.parse(&response.body);
        }
        Err(create_error_from_response(response.status, &response.body))
    }

    async fn interact(
        &self,
        endpoints: &IdxEndpoints,
        pkce: &PkceParams,
        state: &str,
    ) -> IdxResult<String> {
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("client_id", &self.config.client_id);
            if let Some(secret) = &self.config.client_secret {
                use secrecy::ExposeSecret;
                form.append_pair("client_secret", secret.expose_secret());
            }
            form.append_pair("scope", &self.config.scope_string());
            form.append_pair("code_challenge", &pkce.code_challenge);
            form.append_pair("code_challenge_method", pkce.code_challenge_method.as_str());
            form.append_pair("redirect_uri", self.config.redirect_uri.as_str());
            form.append_pair("state", state);
            for (key, value) in &self.config.additional_parameters {
                form.append_pair(key, value);
            }
            form.finish()
        };

        let response = self
            .send(
                HttpMethod::Post,
                &endpoints.interact,
                Some(body),
                "application/x-www-form-urlencoded",
                "application/json",
            )
            .await?;

        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let interact: InteractResponse = serde_json::from_str(&response.body).map_err(|e| {
            ProtocolError::InvalidResponseData {
                message: format!("interact response: {}", e),
            }
        })?;

        interact
            .interaction_handle
            .filter(|handle| !handle.is_empty())
            .ok_or_else(|| {
                ProtocolError::InvalidResponseData {
                    message: "interact response carries no interaction_handle".to_string(),
                }
                .into()
            })
    }

    async fn introspect(&self, context: &Context) -> IdxResult<Response> {
        let endpoints = self.config.endpoints()?;
        let body = serde_json::json!({ "interactionHandle": context.interaction_handle() });
        let content_type = self.ion_content_type();
        self.send_idx(
            HttpMethod::Post,
            &endpoints.introspect,
            Some(body.to_string()),
            &content_type,
        )
        .await
    }

    async fn begin(&self, state: Option<String>, epoch: u64) -> IdxResult<Response> {
        let pkce = self.pkce.generate(PkceMethod::S256)?;
        let state = state.unwrap_or_else(generate_state);
        let endpoints = self.config.endpoints()?;

        let handle = self.interact(&endpoints, &pkce, &state).await?;
        self.check_epoch(epoch)?;

        let context = Context::new(&self.config, state, pkce.code_verifier, handle);
        {
            let mut inner = self.lock();
            self.check_epoch(epoch)?;
            inner.context = Some(context.clone());
        }

        let response = self.introspect(&context).await?;
        self.check_epoch(epoch)?;
        Ok(response)
    }

    #[instrument(skip(self, state), fields(issuer = %self.config.issuer))]
    async fn start(&self, state: Option<String>, expiry_restart: bool) -> IdxResult<Response> {
        let Some(_busy) = Busy::acquire(&self.busy) else {
            return self.fail(FlowError::OperationInProgress);
        };
        let current = self.lock().state;
        if !current.can_start() {
            return self.fail(FlowError::InvalidState {
                operation: "start",
                state: current.as_str(),
            });
        }

        let epoch = self.supersede();
        self.stop_timers();
        {
            let mut inner = self.lock();
            inner.response = None;
            inner.context = None;
            if !expiry_restart {
                inner.requested_state = state.clone();
            }
        }
        self.transition(FlowState::Interacting);
        info!("Starting interaction");

        let result = self.begin(state, epoch).await;
        match result {
            Ok(response) => {
                let arm_expiry = !(expiry_restart && response.is_expired());
                self.adopt(&response, FlowState::AwaitingRemediation, arm_expiry, epoch)?;
                Ok(response)
            }
            Err(error) if is_superseded(&error) => Err(error),
            Err(error) => {
                self.transition(FlowState::Failed);
                self.fail(error)
            }
        }
    }

    #[instrument(skip(self))]
    async fn resume(&self) -> IdxResult<Response> {
        let Some(_busy) = Busy::acquire(&self.busy) else {
            return self.fail(FlowError::OperationInProgress);
        };
        let (current, context) = {
            let inner = self.lock();
            (inner.state, inner.context.clone())
        };
        let Some(context) = context.filter(|_| !current.is_terminal()) else {
            return self.fail(FlowError::NotAuthenticating);
        };
        if current.is_busy() {
            return self.fail(FlowError::InvalidState {
                operation: "resume",
                state: current.as_str(),
            });
        }

        let epoch = self.epoch();
        self.stop_timers();
        self.transition(FlowState::Interacting);

        let result = async {
            let response = self.introspect(&context).await?;
            self.check_epoch(epoch)?;
            Ok::<_, IdxError>(response)
        }
        .await;
        self.settle(result, epoch)
    }

    #[instrument(skip(self, remediation), fields(remediation = %remediation.name))]
    async fn proceed(&self, remediation: &Remediation) -> IdxResult<Response> {
        let Some(_busy) = Busy::acquire(&self.busy) else {
            return self.fail(FlowError::OperationInProgress);
        };
        let (current, generation) = {
            let inner = self.lock();
            (
                inner.state,
                inner.response.as_ref().map(Response::generation),
            )
        };
        if current != FlowState::AwaitingRemediation {
            return self.fail(FlowError::InvalidState {
                operation: "proceed",
                state: current.as_str(),
            });
        }
        if generation != Some(remediation.generation()) {
            return self.fail(FlowError::StaleRemediation {
                name: remediation.name.clone(),
            });
        }

        let body = match remediation.request_body() {
            Ok(body) => body,
            Err(error) => return self.fail(error),
        };

        let epoch = self.epoch();
        self.stop_timers();
        self.transition(FlowState::Interacting);
        debug!(url = %remediation.href, "Proceeding");

        let result = async {
            let response = self
                .send_idx(
                    remediation.method,
                    &remediation.href,
                    (remediation.method != HttpMethod::Get).then_some(body),
                    remediation.content_type(),
                )
                .await?;
            self.check_epoch(epoch)?;
            Ok::<_, IdxError>(response)
        }
        .await;
        self.settle(result, epoch)
    }

    /// Adopt a step result, or fall back to the stable state on failure.
    fn settle(&self, result: IdxResult<Response>, epoch: u64) -> IdxResult<Response> {
        match result {
            Ok(response) => {
                self.adopt(&response, FlowState::AwaitingRemediation, true, epoch)?;
                if response.is_login_successful() {
                    info!("Interaction complete, code ready for exchange");
                }
                Ok(response)
            }
            Err(error) if is_superseded(&error) => Err(error),
            Err(error) => {
                self.transition(self.stable_state());
                let current = self.lock().response.clone();
                if let Some(response) = current {
                    self.start_polling(&response);
                }
                self.fail(error)
            }
        }
    }

    #[instrument(skip(self))]
    async fn cancel(&self) -> IdxResult<Response> {
        let (current, authenticating, cancel) = {
            let inner = self.lock();
            (
                inner.state,
                inner.context.is_some() && !inner.state.is_terminal(),
                inner
                    .response
                    .as_ref()
                    .and_then(|r| r.cancel_remediation().cloned()),
            )
        };
        if !authenticating {
            return self.fail(FlowError::NotAuthenticating);
        }
        let Some(cancel) = cancel else {
            return self.fail(ProtocolError::UnknownRemediationOption {
                name: "cancel".to_string(),
            });
        };
        let body = match cancel.request_body() {
            Ok(body) => body,
            Err(error) => return self.fail(error),
        };

        let epoch = self.supersede();
        self.stop_timers();
        self.transition(FlowState::Interacting);
        info!(from = %current, "Cancelling interaction");

        let result = async {
            let response = self
                .send_idx(
                    cancel.method,
                    &cancel.href,
                    Some(body),
                    cancel.content_type(),
                )
                .await?;
            self.check_epoch(epoch)?;
            Ok::<_, IdxError>(response)
        }
        .await;

        match result {
            Ok(response) => {
                self.adopt(&response, FlowState::AwaitingRemediation, true, epoch)?;
                Ok(response)
            }
            Err(error) if is_superseded(&error) => Err(error),
            Err(error) => {
                self.transition(self.stable_state());
                self.fail(error)
            }
        }
    }

    #[instrument(skip(self, response))]
    async fn exchange_code(&self, response: &Response) -> IdxResult<Token> {
        let Some(_busy) = Busy::acquire(&self.busy) else {
            return self.fail(FlowError::OperationInProgress);
        };
        let context = match self.exchangeable_context("exchange_code") {
            Ok(context) => context,
            Err(error) => return self.fail(error),
        };
        let Some(success) = response.success_remediation() else {
            return self.fail(ProtocolError::SuccessResponseMissing);
        };
        let remediation =
            match token_exchange::prepare_success_remediation(success, &self.config, &context) {
                Ok(remediation) => remediation,
                Err(error) => return self.fail(error),
            };

        self.exchange(remediation).await
    }

    #[instrument(skip(self, url))]
    async fn exchange_redirect(&self, url: &str) -> IdxResult<Token> {
        let Some(_busy) = Busy::acquire(&self.busy) else {
            return self.fail(FlowError::OperationInProgress);
        };
        let result = self.redirect_result(url);
        if result != RedirectResult::Authenticated {
            return self.fail(FlowError::InvalidRedirect {
                reason: result.as_str().to_string(),
            });
        }
        let context = match self.exchangeable_context("exchange_redirect") {
            Ok(context) => context,
            Err(error) => return self.fail(error),
        };

        let code = Url::parse(url)
            .ok()
            .and_then(|url| CallbackParams::from_url(&url).interaction_code)
            .unwrap_or_default();
        let remediation = match token_exchange::redirect_remediation(&code, &self.config, &context)
        {
            Ok(remediation) => remediation,
            Err(error) => return self.fail(error),
        };

        self.exchange(remediation).await
    }

    fn exchangeable_context(&self, operation: &'static str) -> IdxResult<Context> {
        let inner = self.lock();
        let context = inner
            .context
            .clone()
            .filter(|_| !inner.state.is_terminal())
            .ok_or(FlowError::NotAuthenticating)?;
        if inner.state.is_busy() {
            return Err(FlowError::InvalidState {
                operation,
                state: inner.state.as_str(),
            }
            .into());
        }
        Ok(context)
    }

    async fn exchange(&self, remediation: Remediation) -> IdxResult<Token> {
        let epoch = self.epoch();
        let previous = self.lock().state;
        self.transition(FlowState::Exchanging);

        let result = token_exchange::exchange(self.transport.as_ref(), &self.config, &remediation)
            .await
            .and_then(|token| self.check_epoch(epoch).map(|_| token));

        match result {
            Ok(token) => {
                let from = {
                    let mut inner = self.lock();
                    self.check_epoch(epoch)?;
                    if let Some(task) = inner.expiry_task.take() {
                        task.abort();
                    }
                    if let Some(response) = &inner.response {
                        response.stop_polling();
                    }
                    inner.context = None;
                    std::mem::replace(&mut inner.state, FlowState::Succeeded)
                };
                info!("Interaction code exchanged for tokens");
                self.notify_transition(from, FlowState::Succeeded);
                self.emit(FlowEvent::Token(token.clone()));
                Ok(token)
            }
            Err(error) if is_superseded(&error) => Err(error),
            Err(error) => {
                self.transition(previous);
                self.fail(error)
            }
        }
    }

    fn redirect_result(&self, url: &str) -> RedirectResult {
        let Some(context) = self.lock().context.clone() else {
            return RedirectResult::InvalidContext;
        };
        let Ok(url) = Url::parse(url) else {
            return RedirectResult::InvalidContext;
        };

        let expected = &self.config.redirect_uri;
        if url.scheme() != expected.scheme() || url.path() != expected.path() {
            return RedirectResult::InvalidRedirectUrl;
        }

        let params = CallbackParams::from_url(&url);
        let state_ok = params
            .state
            .as_deref()
            .is_some_and(|state| state_matches(context.state(), state));
        if !state_ok {
            return RedirectResult::InvalidContext;
        }

        if params.interaction_code.is_some() {
            RedirectResult::Authenticated
        } else if params.is_interaction_required() {
            RedirectResult::RemediationRequired
        } else {
            RedirectResult::InvalidContext
        }
    }

    fn reset(&self) {
        self.supersede();
        self.stop_timers();
        let from = {
            let mut inner = self.lock();
            inner.context = None;
            std::mem::replace(&mut inner.state, FlowState::Cancelled)
        };
        info!("Interaction reset");
        self.notify_transition(from, FlowState::Cancelled);
    }
}

#[async_trait]
impl<T: HttpTransport + 'static, P: PkceGenerator + 'static> RemediationHandler
    for FlowShared<T, P>
{
    async fn proceed(&self, remediation: &Remediation) -> IdxResult<Response> {
        FlowShared::proceed(self, remediation).await
    }

    async fn poll(&self, remediation: &Remediation) -> IdxResult<Response> {
        if !self.is_authenticating() {
            return Err(FlowError::NotAuthenticating.into());
        }
        let body = remediation.request_body()?;
        self.send_idx(
            remediation.method,
            &remediation.href,
            (remediation.method != HttpMethod::Get).then_some(body),
            remediation.content_type(),
        )
        .await
    }

    fn poll_completed(&self, generation: u64, result: IdxResult<Response>) {
        let current = {
            let inner = self.lock();
            inner.response.as_ref().map(Response::generation) == Some(generation)
                && inner.state == FlowState::AwaitingRemediation
        };
        if !current || self.busy.load(Ordering::Acquire) {
            debug!(generation, "Dropping result of a superseded poll");
            return;
        }

        match result {
            Ok(response) => {
                let epoch = self.epoch();
                if let Err(e) = self.adopt(&response, FlowState::AwaitingRemediation, true, epoch) {
                    debug!(error = %e, "Poll result superseded");
                }
            }
            Err(error) => {
                let _ = self.fail::<()>(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::idx_config;
    use crate::core::{MockHttpTransport, MockPkceGenerator};
    use crate::fixtures;

    type TestFlow = InteractionCodeFlowImpl<MockHttpTransport, MockPkceGenerator>;

    fn flow(transport: &Arc<MockHttpTransport>) -> TestFlow {
        let config = idx_config()
            .issuer("https://example.okta.com/oauth2/default")
            .client_id("clientId")
            .redirect_uri("com.example:/callback")
            .add_scope("openid")
            .build()
            .unwrap();
        InteractionCodeFlowImpl::new(
            config,
            transport.clone(),
            Arc::new(MockPkceGenerator::with_verifier("bar")),
        )
    }

    #[tokio::test]
    async fn test_start_sends_interact_then_introspect() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, fixtures::INTERACT);
        transport.queue_body(200, fixtures::IDENTIFY);

        let flow = flow(&transport);
        let response = flow.start(Some("state".to_string())).await.unwrap();

        assert_eq!(flow.state(), FlowState::AwaitingRemediation);
        assert!(response.remediations.contains("identify"));
        assert_eq!(
            flow.context()
                .map(|c| c.interaction_handle().to_string())
                .as_deref(),
            Some("foo")
        );

        let requests = transport.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].url,
            "https://example.okta.com/oauth2/default/v1/interact"
        );
        let interact = requests[0].body.clone().unwrap();
        assert!(interact.contains("state=state"));
        assert!(interact.contains("code_challenge_method=S256"));
        assert_eq!(
            requests[1].url,
            "https://example.okta.com/idp/idx/introspect"
        );
        assert_eq!(
            requests[1].header("accept"),
            Some("application/ion+json; okta-version=1.0.0")
        );
        assert_eq!(
            requests[1].body.as_deref(),
            Some(r#"{"interactionHandle":"foo"}"#)
        );
    }

    #[tokio::test]
    async fn test_start_failure_marks_failed() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, "{}");

        let flow = flow(&transport);
        let result = flow.start(None).await;

        assert!(matches!(
            result,
            Err(IdxError::Protocol(
                ProtocolError::InvalidResponseData { .. }
            ))
        ));
        assert_eq!(flow.state(), FlowState::Failed);
        assert!(!flow.is_authenticating());
    }

    #[tokio::test]
    async fn test_pkce_failure_is_cannot_create_request() {
        let transport = Arc::new(MockHttpTransport::new());
        let flow = flow(&transport);
        flow.shared.pkce.set_failing(true);

        let result = flow.start(None).await;
        assert!(matches!(
            result,
            Err(IdxError::Protocol(
                ProtocolError::CannotCreateRequest { .. }
            ))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_proceed_requires_awaiting_state() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, fixtures::INTERACT);
        transport.queue_body(200, fixtures::IDENTIFY);

        let flow = flow(&transport);
        let response = flow.start(None).await.unwrap();
        flow.reset();

        let identify = response.remediations.get("identify").unwrap();
        assert!(matches!(
            flow.proceed(identify).await,
            Err(IdxError::Flow(FlowError::InvalidState {
                operation: "proceed",
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_stale_remediation_is_rejected() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, fixtures::INTERACT);
        transport.queue_body(200, fixtures::IDENTIFY);
        transport.queue_body(200, fixtures::CHALLENGE_AUTHENTICATOR);

        let flow = flow(&transport);
        let first = flow.start(None).await.unwrap();
        let mut identify = first.remediations.get("identify").cloned().unwrap();
        identify
            .set_value("identifier", "mary@example.com")
            .unwrap();
        flow.proceed(&identify).await.unwrap();

        let result = flow.proceed(&identify).await;
        assert!(matches!(
            result,
            Err(IdxError::Flow(FlowError::StaleRemediation { .. }))
        ));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_network_error_reverts_to_awaiting() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, fixtures::INTERACT);
        transport.queue_body(200, fixtures::IDENTIFY);

        let flow = flow(&transport);
        let response = flow.start(None).await.unwrap();
        let mut identify = response.remediations.get("identify").cloned().unwrap();
        identify
            .set_value("identifier", "mary@example.com")
            .unwrap();

        assert!(matches!(
            identify.proceed().await,
            Err(IdxError::Network(_))
        ));
        assert_eq!(flow.state(), FlowState::AwaitingRemediation);
        // the same response stays usable
        transport.queue_body(200, fixtures::CHALLENGE_AUTHENTICATOR);
        assert!(identify.proceed().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_without_cancel_remediation() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, fixtures::INTERACT);
        transport.queue_body(200, fixtures::SUCCESS);

        let flow = flow(&transport);
        flow.start(None).await.unwrap();
        assert!(matches!(
            flow.cancel().await,
            Err(IdxError::Protocol(
                ProtocolError::UnknownRemediationOption { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_redirect_result_requires_context() {
        let transport = Arc::new(MockHttpTransport::new());
        let flow = flow(&transport);
        assert_eq!(
            flow.redirect_result("com.example:/callback?state=state&interaction_code=abc"),
            RedirectResult::InvalidContext
        );
    }

    #[tokio::test]
    async fn test_redirect_interaction_required() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_body(200, fixtures::INTERACT);
        transport.queue_body(200, fixtures::IDENTIFY);

        let flow = flow(&transport);
        flow.start(Some("state".to_string())).await.unwrap();

        assert_eq!(
            flow.redirect_result("com.example:/callback?state=state&error=interaction_required"),
            RedirectResult::RemediationRequired
        );
        assert_eq!(
            flow.redirect_result("com.other:/callback?state=state&interaction_code=abc"),
            RedirectResult::InvalidRedirectUrl
        );
        assert_eq!(
            flow.redirect_result("com.example:/callback?state=state&interaction_code=abc"),
            RedirectResult::Authenticated
        );
    }
}
