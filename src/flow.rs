//! Authorization-code + PKCE acquisition flows.
//!
//! [`AuthClient`] owns one exclusion slot per [`FlowKind`]. A flow moves
//! Idle → InProgress → AwaitingCallback → Completed | Failed → Idle; while a
//! slot is not Idle, starting another flow of the same kind is rejected.
//! Flows of different kinds run independently.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Notify, broadcast};
use tracing::{debug, info, warn};
use url::Url;

use crate::authority::{AuthorityMetadata, AuthorityResolver};
use crate::cache::{CacheLookup, CachedToken, InMemoryTokenCache, TokenCache, TokenCriteria};
use crate::client::OAuth2Client;
use crate::config::ClientConfig;
use crate::error::{Error, ErrorCode};
use crate::http::HttpClient;
use crate::oidc::IdTokenClaims;
use crate::pkce::PkceCodes;
use crate::state::{RequestCorrelation, validate_nonce, validate_state};

const LOGIN_SCOPES: [&str; 2] = ["openid", "profile"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Login,
    AcquireToken,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::AcquireToken => "acquire_token",
        }
    }

    fn in_progress_error(self) -> Error {
        match self {
            Self::Login => Error::LoginInProgress,
            Self::AcquireToken => Error::AcquireTokenInProgress,
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "acquire_token" | "acquireToken" => Ok(Self::AcquireToken),
            other => Err(Error::InvalidInteractionType {
                interaction: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    InProgress,
    AwaitingCallback,
    Completed,
    Failed,
}

/// Broadcast on every state change of a flow slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTransition {
    pub kind: FlowKind,
    pub state: FlowState,
}

/// What the external dispatcher needs to send the user to the identity
/// provider, plus the correlation values the callback must echo.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub kind: FlowKind,
    pub url: Url,
    pub state: String,
    pub nonce: String,
    /// Canonical authority the flow is scoped to.
    pub authority: String,
    pub scopes: Vec<String>,
    signal: Arc<FlowSignal>,
}

/// Parameters the identity provider sent back to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackResponse {
    pub code: Option<String>,
    pub state: String,
    pub nonce: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackResponse {
    pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: state.into(),
            ..Self::default()
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Read the response from the query string, or from the fragment when
    /// the query is empty.
    pub fn from_url(url: &Url) -> Result<Self, Error> {
        let params = match (url.query(), url.fragment()) {
            (Some(query), _) if !query.is_empty() => query,
            (_, Some(fragment)) if !fragment.is_empty() => fragment,
            _ => {
                return Err(Error::UrlSegment {
                    uri: url.to_string(),
                });
            }
        };

        let mut response = Self::default();
        for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "code" => response.code = Some(value),
                "state" => response.state = value,
                "nonce" => response.nonce = Some(value),
                "error" => response.error = Some(value),
                "error_description" => response.error_description = Some(value),
                _ => {}
            }
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub home_account_id: String,
    pub tenant_id: Option<String>,
    pub username: Option<String>,
    pub authority: String,
}

#[derive(Debug, Clone)]
pub struct IdentityResult {
    pub account: Account,
    pub claims: IdTokenClaims,
    pub access_token: String,
    pub id_token: String,
    pub scopes: Vec<String>,
    pub expires_at: SystemTime,
}

pub enum DispatchOutcome {
    Callback(CallbackResponse),
    Cancelled,
}

/// Sends the user to the authorization URL and reports what came back.
/// Browser popups, redirects or a loopback listener all fit behind this.
pub trait Dispatcher: Send + Sync {
    fn navigate(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send;

    fn wait_for_callback(&self) -> impl Future<Output = DispatchOutcome> + Send;
}

/// How a parked flow ended, as reported to a task waiting on it.
#[derive(Debug, Clone)]
enum FlowEnd {
    Cancelled,
    Completed(Box<IdentityResult>),
    Failed { code: ErrorCode, detail: String },
}

impl FlowEnd {
    fn into_result(self) -> Result<IdentityResult, Error> {
        match self {
            Self::Cancelled => Err(Error::UserCancelled),
            Self::Completed(result) => Ok(*result),
            Self::Failed { code, detail } => Err(Error::Callback {
                code: code.as_str().to_string(),
                description: Some(detail),
            }),
        }
    }
}

/// Shared by a parked flow and its waiter. Pointer identity tells one flow
/// of a kind from the next.
#[derive(Debug, Default)]
struct FlowSignal {
    ended: Notify,
    outcome: Mutex<Option<FlowEnd>>,
}

impl FlowSignal {
    /// Record how the flow ended. The first outcome wins.
    fn end(&self, outcome: FlowEnd) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(outcome);
            self.ended.notify_one();
        }
    }

    async fn wait(&self) -> FlowEnd {
        loop {
            let outcome = self
                .outcome
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(outcome) = outcome {
                return outcome;
            }
            self.ended.notified().await;
        }
    }
}

struct PendingFlow {
    correlation: RequestCorrelation,
    pkce: PkceCodes,
    metadata: AuthorityMetadata,
    scopes: Vec<String>,
    signal: Arc<FlowSignal>,
}

enum Slot {
    Idle,
    Starting,
    Awaiting(Box<PendingFlow>),
    Processing,
}

impl Slot {
    fn state(&self) -> FlowState {
        match self {
            Self::Idle => FlowState::Idle,
            Self::Starting => FlowState::InProgress,
            Self::Awaiting(_) | Self::Processing => FlowState::AwaitingCallback,
        }
    }
}

struct Slots {
    login: Slot,
    acquire_token: Slot,
}

impl Slots {
    fn get_mut(&mut self, kind: FlowKind) -> &mut Slot {
        match kind {
            FlowKind::Login => &mut self.login,
            FlowKind::AcquireToken => &mut self.acquire_token,
        }
    }
}

struct FlowTable {
    slots: Mutex<Slots>,
    events: broadcast::Sender<FlowTransition>,
}

impl FlowTable {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            slots: Mutex::new(Slots {
                login: Slot::Idle,
                acquire_token: Slot::Idle,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, kind: FlowKind, state: FlowState) {
        debug!(flow = %kind, ?state, "flow transition");
        // No subscribers is fine.
        let _ = self.events.send(FlowTransition { kind, state });
    }

    fn state(&self, kind: FlowKind) -> FlowState {
        self.lock().get_mut(kind).state()
    }

    fn begin(&self, kind: FlowKind) -> Result<FlowLock<'_>, Error> {
        let mut slots = self.lock();
        let slot = slots.get_mut(kind);
        if !matches!(slot, Slot::Idle) {
            return Err(kind.in_progress_error());
        }
        *slot = Slot::Starting;
        self.emit(kind, FlowState::InProgress);
        Ok(FlowLock {
            table: self,
            kind,
            signal: None,
            armed: true,
        })
    }

    fn take_pending(&self, kind: FlowKind) -> Result<(Box<PendingFlow>, FlowLock<'_>), Error> {
        let mut slots = self.lock();
        let slot = slots.get_mut(kind);
        match std::mem::replace(slot, Slot::Processing) {
            Slot::Awaiting(pending) => {
                let lock = FlowLock {
                    table: self,
                    kind,
                    signal: Some(Arc::clone(&pending.signal)),
                    armed: true,
                };
                Ok((pending, lock))
            }
            other => {
                *slot = other;
                Err(Error::InvalidInteractionType {
                    interaction: kind.to_string(),
                })
            }
        }
    }

    fn finish(&self, kind: FlowKind, outcome: FlowState) {
        let mut slots = self.lock();
        *slots.get_mut(kind) = Slot::Idle;
        self.emit(kind, outcome);
        self.emit(kind, FlowState::Idle);
    }

    /// Fail whichever flow of `kind` is waiting for its callback.
    fn abandon(&self, kind: FlowKind) -> bool {
        self.abandon_matching(kind, |_| true)
    }

    /// Fail the flow of `kind` only if it is still the one `signal` belongs
    /// to. A later flow of the same kind is left alone.
    fn abandon_if(&self, kind: FlowKind, signal: &Arc<FlowSignal>) -> bool {
        self.abandon_matching(kind, |pending| Arc::ptr_eq(&pending.signal, signal))
    }

    fn abandon_matching(&self, kind: FlowKind, matches: impl Fn(&PendingFlow) -> bool) -> bool {
        let pending = {
            let mut slots = self.lock();
            let slot = slots.get_mut(kind);
            match std::mem::replace(slot, Slot::Idle) {
                Slot::Awaiting(pending) if matches(pending.as_ref()) => {
                    self.emit(kind, FlowState::Failed);
                    self.emit(kind, FlowState::Idle);
                    pending
                }
                other => {
                    *slot = other;
                    return false;
                }
            }
        };
        pending.signal.end(FlowEnd::Cancelled);
        true
    }
}

/// Exclusive hold on one flow slot. Dropping it while armed fails the flow
/// and frees the slot.
struct FlowLock<'a> {
    table: &'a FlowTable,
    kind: FlowKind,
    /// Set once the flow has been parked; its waiter hears how it ended.
    signal: Option<Arc<FlowSignal>>,
    armed: bool,
}

impl FlowLock<'_> {
    fn park(mut self, pending: Box<PendingFlow>) {
        self.armed = false;
        let mut slots = self.table.lock();
        *slots.get_mut(self.kind) = Slot::Awaiting(pending);
        self.table.emit(self.kind, FlowState::AwaitingCallback);
    }

    fn complete(mut self, result: &IdentityResult) {
        self.settle(FlowState::Completed, FlowEnd::Completed(Box::new(result.clone())));
    }

    fn fail(mut self, err: &Error) {
        self.settle(
            FlowState::Failed,
            FlowEnd::Failed {
                code: err.code(),
                detail: err.to_string(),
            },
        );
    }

    fn settle(&mut self, state: FlowState, outcome: FlowEnd) {
        self.armed = false;
        self.table.finish(self.kind, state);
        if let Some(signal) = self.signal.take() {
            signal.end(outcome);
        }
    }
}

impl Drop for FlowLock<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.settle(FlowState::Failed, FlowEnd::Cancelled);
        }
    }
}

fn request_scopes(kind: FlowKind, scopes: &[&str]) -> Vec<String> {
    let mut requested: Vec<String> = Vec::new();
    if kind == FlowKind::Login {
        requested.extend(LOGIN_SCOPES.iter().map(|s| s.to_string()));
    }
    for scope in scopes {
        if !requested.iter().any(|s| s.eq_ignore_ascii_case(scope)) {
            requested.push(scope.to_string());
        }
    }
    requested
}

/// Client instance driving login and acquire-token flows against one
/// application registration.
pub struct AuthClient<H> {
    http: H,
    config: ClientConfig,
    oauth: OAuth2Client,
    resolver: AuthorityResolver,
    cache: Arc<dyn TokenCache>,
    flows: FlowTable,
    account: Mutex<Option<Account>>,
}

impl<H: HttpClient> AuthClient<H> {
    pub fn new(config: ClientConfig, http: H) -> Result<Self, Error> {
        Self::with_cache(config, http, Arc::new(InMemoryTokenCache::new()))
    }

    pub fn with_cache(
        config: ClientConfig,
        http: H,
        cache: Arc<dyn TokenCache>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let oauth = OAuth2Client::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
        );
        Ok(Self {
            http,
            resolver: AuthorityResolver::new(config.validate_authority),
            oauth,
            config,
            cache,
            flows: FlowTable::new(),
            account: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn resolver(&self) -> &AuthorityResolver {
        &self.resolver
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowTransition> {
        self.flows.events.subscribe()
    }

    pub fn flow_state(&self, kind: FlowKind) -> FlowState {
        self.flows.state(kind)
    }

    /// The signed-in account from the last completed login.
    pub fn account(&self) -> Result<Account, Error> {
        self.account
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::UserNonExistent)
    }

    fn log_failure(&self, kind: FlowKind, err: &Error) {
        if self.config.verbose_diagnostics {
            warn!(flow = %kind, code = %err.code(), "{}", err.verbose());
        } else {
            warn!(flow = %kind, code = %err.code(), "{err}");
        }
    }

    fn default_authority(&self) -> Result<String, Error> {
        let mut known = self.cache.authorities(&self.config.client_id);
        match known.len() {
            0 => Ok(self.config.authority.clone()),
            1 => Ok(known.remove(0)),
            _ => Err(Error::MultipleAuthorities),
        }
    }

    /// Begin a flow and return the request to dispatch.
    pub async fn start(
        &self,
        kind: FlowKind,
        scopes: &[&str],
        authority: Option<&str>,
    ) -> Result<PendingRequest, Error> {
        let lock = self.flows.begin(kind)?;

        match self.prepare(kind, scopes, authority).await {
            Ok((pending, request)) => {
                lock.park(pending);
                info!(flow = %kind, authority = %request.authority, "awaiting callback");
                Ok(request)
            }
            Err(err) => {
                self.log_failure(kind, &err);
                Err(err)
            }
        }
    }

    async fn prepare(
        &self,
        kind: FlowKind,
        scopes: &[&str],
        authority: Option<&str>,
    ) -> Result<(Box<PendingFlow>, PendingRequest), Error> {
        let authority = match authority {
            Some(authority) => authority.to_string(),
            None => self.default_authority()?,
        };
        let metadata = self.resolver.resolve(&self.http, &authority).await?;

        let pkce = PkceCodes::generate()?;
        let correlation = RequestCorrelation::issue();
        let scopes = request_scopes(kind, scopes);

        let url = self.oauth.create_authorization_url(
            metadata.authorization_endpoint()?,
            &correlation,
            &pkce,
            &scopes,
        )?;

        let signal = Arc::new(FlowSignal::default());
        let request = PendingRequest {
            kind,
            url,
            state: correlation.state.clone(),
            nonce: correlation.nonce.clone(),
            authority: metadata.authority().canonical().to_string(),
            scopes: scopes.clone(),
            signal: Arc::clone(&signal),
        };
        let pending = Box::new(PendingFlow {
            correlation,
            pkce,
            metadata,
            scopes,
            signal,
        });
        Ok((pending, request))
    }

    /// Consume the identity provider's response for a flow of `kind`.
    pub async fn handle_callback(
        &self,
        kind: FlowKind,
        response: CallbackResponse,
    ) -> Result<IdentityResult, Error> {
        let (pending, lock) = self.flows.take_pending(kind)?;

        match self.redeem(*pending, response).await {
            Ok(result) => {
                *self.account.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(result.account.clone());
                lock.complete(&result);
                info!(flow = %kind, account = %result.account.home_account_id, "flow completed");
                Ok(result)
            }
            Err(err) => {
                lock.fail(&err);
                self.log_failure(kind, &err);
                Err(err)
            }
        }
    }

    async fn redeem(
        &self,
        pending: PendingFlow,
        response: CallbackResponse,
    ) -> Result<IdentityResult, Error> {
        let expected_nonce = &pending.correlation.nonce;

        validate_state(&pending.correlation.state, &response.state)?;

        if let Some(code) = response.error {
            return Err(Error::Callback {
                code,
                description: response.error_description,
            });
        }

        if let Some(ref nonce) = response.nonce {
            validate_nonce(expected_nonce, nonce)?;
        }

        let code = response
            .code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::Callback {
                code: "invalid_request".to_string(),
                description: Some("the authorization response carried no code".to_string()),
            })?;

        let tokens = self
            .oauth
            .validate_authorization_code(
                &self.http,
                pending.metadata.token_endpoint()?,
                &code,
                &pending.pkce.verifier,
                &pending.scopes,
            )
            .await?;
        // The verifier is single use.
        drop(pending.pkce);

        let id_token = tokens.id_token().unwrap_or_default().to_string();
        let claims = IdTokenClaims::parse(&id_token)?;
        validate_nonce(expected_nonce, claims.nonce.as_deref().unwrap_or_default())?;

        let home_account_id = match tokens.client_info() {
            Ok(info) => info.home_account_id(),
            Err(Error::ClientInfoNotPopulated) => claims.subject.clone(),
            Err(err) => return Err(err),
        };

        let authority = pending.metadata.authority().canonical().to_string();
        let account = Account {
            home_account_id,
            tenant_id: claims.tenant_id.clone(),
            username: claims.preferred_username.clone(),
            authority: authority.clone(),
        };

        let access_token = tokens.access_token()?.to_string();
        let expires_at = match tokens.access_token_expires_at() {
            Ok(at) => at,
            Err(_) => UNIX_EPOCH
                .checked_add(Duration::from_secs(claims.expires_at))
                .ok_or_else(|| Error::InvalidIdToken {
                    detail: format!("exp {} is out of range", claims.expires_at),
                })?,
        };
        let scopes = tokens.scopes().unwrap_or(pending.scopes);

        let criteria = TokenCriteria {
            client_id: self.config.client_id.clone(),
            home_account_id: Some(account.home_account_id.clone()),
            authority: Some(authority.clone()),
            scopes: scopes.clone(),
        };
        if let CacheLookup::Many(count) = self.cache.lookup(&criteria) {
            warn!(count, "ambiguous cache entries for the redeemed account");
            return Err(Error::MultipleMatchingTokens);
        }

        self.cache.store(CachedToken {
            client_id: self.config.client_id.clone(),
            home_account_id: account.home_account_id.clone(),
            authority,
            scopes: scopes.clone(),
            access_token: access_token.clone(),
            refresh_token: tokens.refresh_token().map(String::from),
            id_token: id_token.clone(),
            expires_at,
        });

        Ok(IdentityResult {
            account,
            claims,
            access_token,
            id_token,
            scopes,
            expires_at,
        })
    }

    /// Abort a flow that is waiting for its callback. Returns whether one
    /// was waiting; otherwise this is a no-op.
    pub fn cancel(&self, kind: FlowKind) -> bool {
        let cancelled = self.flows.abandon(kind);
        if cancelled {
            info!(flow = %kind, code = %Error::UserCancelled.code(), "flow cancelled");
        }
        cancelled
    }

    /// Run a whole flow through `dispatcher`: start, navigate, wait for the
    /// callback (bounded by the configured timeout) and redeem it.
    ///
    /// If the flow is redeemed or cancelled elsewhere while this waits, the
    /// waiter returns that outcome. A redeem failure seen this way comes back
    /// as [`Error::Callback`] carrying the original code. Timeouts and
    /// dispatcher failures only ever abort the flow this call started.
    pub async fn acquire_interactive(
        &self,
        kind: FlowKind,
        scopes: &[&str],
        authority: Option<&str>,
        dispatcher: &impl Dispatcher,
    ) -> Result<IdentityResult, Error> {
        let pending = self.start(kind, scopes, authority).await?;

        if let Err(e) = dispatcher.navigate(&pending.url).await {
            self.flows.abandon_if(kind, &pending.signal);
            let err = Error::PopupWindow {
                detail: e.to_string(),
            };
            self.log_failure(kind, &err);
            return Err(err);
        }

        let timeout = self.config.callback_timeout();
        tokio::select! {
            outcome = dispatcher.wait_for_callback() => match outcome {
                DispatchOutcome::Callback(response) => self.handle_callback(kind, response).await,
                DispatchOutcome::Cancelled => {
                    if self.flows.abandon_if(kind, &pending.signal) {
                        info!(flow = %kind, code = %Error::UserCancelled.code(), "flow cancelled");
                    }
                    Err(Error::UserCancelled)
                }
            },
            outcome = pending.signal.wait() => outcome.into_result(),
            _ = tokio::time::sleep(timeout) => {
                self.flows.abandon_if(kind, &pending.signal);
                let err = Error::TokenRenewalTimeout;
                self.log_failure(kind, &err);
                Err(err)
            }
        }
    }

    /// Return a cached token for the signed-in account, refreshing it when
    /// expired and a refresh token is available.
    pub async fn acquire_token_silent(&self, scopes: &[&str]) -> Result<CachedToken, Error> {
        let account = self.account().map_err(|_| Error::UserLoginRequired)?;
        let criteria = TokenCriteria {
            client_id: self.config.client_id.clone(),
            home_account_id: Some(account.home_account_id.clone()),
            authority: Some(account.authority.clone()),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        };

        let cached = match self.cache.lookup(&criteria) {
            CacheLookup::None => return Err(Error::UserLoginRequired),
            CacheLookup::Many(_) => return Err(Error::MultipleMatchingTokens),
            CacheLookup::One(token) => token,
        };

        if !cached.is_expired(SystemTime::now()) {
            return Ok(cached);
        }

        let Some(refresh_token) = cached.refresh_token.clone() else {
            return Err(Error::UserLoginRequired);
        };

        debug!(authority = %cached.authority, "refreshing expired access token");
        let metadata = self.resolver.resolve(&self.http, &cached.authority).await?;
        let tokens = self
            .oauth
            .refresh_access_token(
                &self.http,
                metadata.token_endpoint()?,
                &refresh_token,
                &cached.scopes,
            )
            .await?;

        let refreshed = CachedToken {
            access_token: tokens.access_token()?.to_string(),
            refresh_token: tokens
                .refresh_token()
                .map(String::from)
                .or(Some(refresh_token)),
            expires_at: tokens.access_token_expires_at()?,
            ..cached
        };
        self.cache.store(refreshed.clone());
        Ok(refreshed)
    }

    /// Forget the signed-in account and return the identity provider's
    /// end-session URL.
    pub async fn logout(&self) -> Result<Url, Error> {
        let post_logout_redirect_uri = self.config.post_logout_redirect_uri()?;
        let account = self.account().ok();
        let authority = account
            .as_ref()
            .map(|a| a.authority.clone())
            .unwrap_or_else(|| self.config.authority.clone());

        let metadata = self.resolver.resolve(&self.http, &authority).await?;
        let end_session_endpoint =
            metadata
                .end_session_endpoint()?
                .ok_or_else(|| Error::EndpointResolution {
                    detail: "the authority does not advertise an end_session_endpoint".to_string(),
                })?;
        let url = self
            .oauth
            .create_logout_url(end_session_endpoint, post_logout_redirect_uri, None)?;

        if let Some(account) = account {
            let removed = self
                .cache
                .remove_account(&self.config.client_id, &account.home_account_id);
            debug!(removed, "cleared cached tokens for signed-out account");
            *self.account.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }

        Ok(url)
    }
}
